use crate::cmd_hubr::args;
use clap::*;
use hubr::libs::color::ColorAssigner;
use hubr::libs::convert::{convert_design, Converter, ToolFinder};
use hubr::libs::design::TrackDesign;
use hubr::libs::hierarchy::GroupingEngine;
use hubr::libs::sidecar::Sidecar;
use hubr::libs::trackdb::{write_hub, AssemblyConfig, HubConfig};
use std::path::{Path, PathBuf};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("create")
        .about("Groups, colors and writes a track hub")
        .after_help(
            r###"
Reads the tracks, extracts metadata, groups them into supertracks, composites
and overlays, assigns colors and writes a hub directory:

    <outdir>/<hub>.hub.txt
    <outdir>/<hub>.genomes.txt
    <outdir>/<genome>/trackDb.txt
    <outdir>/<genome>/<track files>
    <outdir>/hub_config.json

`hub_config.json` is what `hubr merge` reads.

Notes:
* bed and gtf/gff tracks need --chrom-sizes and the UCSC tools
  (bedToBigBed, gtfToGenePred, genePredToBigGenePred) in PATH or ~/bin
* Tracks that can't be converted are left out with a warning, unless
  --require-convert is given
* URLs are referenced as they are, local files are linked into the hub

Examples:
1. A hub from seqnado output:
   hubr create --seqnado seqnado_output/*/bigwigs/*/*/*.bigWig \
       --hub-name chip -g hg38 -S assay -G samplename,antibody -o hub/

2. From a metadata table, with peaks converted:
   hubr create -d design.csv --hub-name peaks -g mm39 \
       --chrom-sizes mm39.chrom.sizes -c samplename -o hub/

3. Preview the hierarchy only:
   hubr create -d design.csv --hub-name test -g hg38 -S assay --dry-run

4. An assembly hub:
   hubr create *.bb --hub-name asm -g myGenome --custom-genome \
       --twobit myGenome.2bit --organism Mouse -o hub/

"###,
        );
    let cmd = args::input_args(cmd);
    let cmd = args::extractor_args(cmd);
    let cmd = args::grouping_args(cmd);
    cmd.arg(
        Arg::new("hub_name")
            .long("hub-name")
            .short('n')
            .num_args(1)
            .required(true)
            .help("Name of the hub"),
    )
    .arg(
        Arg::new("genome")
            .long("genome")
            .short('g')
            .num_args(1)
            .required(true)
            .help("Genome assembly, e.g. hg38"),
    )
    .arg(
        Arg::new("outdir")
            .long("outdir")
            .short('o')
            .num_args(1)
            .required_unless_present("dry_run")
            .help("Output directory"),
    )
    .arg(
        Arg::new("email")
            .long("email")
            .num_args(1)
            .help("Contact email in hub.txt"),
    )
    .arg(
        Arg::new("description")
            .long("description")
            .num_args(1)
            .help("HTML page describing the hub"),
    )
    .arg(
        Arg::new("custom_genome")
            .long("custom-genome")
            .action(ArgAction::SetTrue)
            .requires("twobit")
            .help("Write an assembly hub for a genome the browser doesn't know"),
    )
    .arg(
        Arg::new("twobit")
            .long("twobit")
            .num_args(1)
            .help("2bit sequence of the custom genome"),
    )
    .arg(
        Arg::new("organism")
            .long("organism")
            .num_args(1)
            .default_value("Unknown")
            .help("Organism of the custom genome"),
    )
    .arg(
        Arg::new("default_pos")
            .long("default-pos")
            .num_args(1)
            .default_value("chr1:10000-20000")
            .help("Initial position shown for the custom genome"),
    )
    .arg(
        Arg::new("chrom_sizes")
            .long("chrom-sizes")
            .num_args(1)
            .help("chrom.sizes of the genome, needed to convert bed and gtf/gff"),
    )
    .arg(
        Arg::new("no_convert")
            .long("no-convert")
            .action(ArgAction::SetTrue)
            .help("Don't convert; tracks that need it are left out"),
    )
    .arg(
        Arg::new("require_convert")
            .long("require-convert")
            .action(ArgAction::SetTrue)
            .help("Fail instead of leaving out tracks that can't be converted"),
    )
    .arg(
        Arg::new("no_container")
            .long("no-container")
            .action(ArgAction::SetTrue)
            .help("Don't fall back to apptainer/singularity/docker for missing tools"),
    )
    .arg(
        Arg::new("parallel")
            .long("parallel")
            .short('p')
            .value_parser(value_parser!(usize))
            .num_args(1)
            .default_value("4")
            .help("Number of conversions run at once"),
    )
    .arg(
        Arg::new("dry_run")
            .long("dry-run")
            .action(ArgAction::SetTrue)
            .help("Print the hierarchy to stdout and write nothing"),
    )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let hub_name = args.get_one::<String>("hub_name").unwrap();
    let genome = args.get_one::<String>("genome").unwrap();
    let is_dry_run = args.get_flag("dry_run");
    let parallel = *args.get_one::<usize>("parallel").unwrap();

    let spec = args::grouping_spec(args)?;
    let default_color = args::default_color(args)?;

    //----------------------------
    // Tracks
    //----------------------------
    let mut design = args::load_design(args)?;
    absolute_file_refs(&mut design)?;

    if is_dry_run {
        let hier = GroupingEngine::new(&design, &spec).build()?;
        let colors = ColorAssigner::new(spec.color_key.as_deref(), spec.palette)
            .with_default(default_color)
            .assign(&hier);
        let mut writer = hubr::writer("stdout")?;
        writer.write_all(hier.outline(Some(&colors)).as_bytes())?;
        return Ok(());
    }

    let outdir = PathBuf::from(args.get_one::<String>("outdir").unwrap());
    std::fs::create_dir_all(&outdir)?;
    let outdir = outdir.canonicalize()?;

    //----------------------------
    // Conversion
    //----------------------------
    let converter = match args.get_one::<String>("chrom_sizes") {
        Some(sizes) if !args.get_flag("no_convert") => {
            let finder = ToolFinder {
                no_container: args.get_flag("no_container"),
            };
            Some(Converter::new(
                Path::new(sizes),
                &outdir.join("converted"),
                finder,
            )?)
        }
        _ => None,
    };
    let report = convert_design(
        &mut design,
        converter.as_ref(),
        parallel,
        args.get_flag("require_convert"),
    )?;
    if !report.converted.is_empty() {
        log::info!("Converted {} tracks", report.converted.len());
    }
    if design.is_empty() {
        anyhow::bail!("No tracks left to write");
    }

    //----------------------------
    // Hierarchy and colors
    //----------------------------
    let hier = GroupingEngine::new(&design, &spec).build()?;
    let colors = ColorAssigner::new(spec.color_key.as_deref(), spec.palette)
        .with_default(default_color)
        .assign(&hier);
    log::debug!("Hierarchy:\n{}", hier.outline(Some(&colors)));

    //----------------------------
    // Output
    //----------------------------
    let mut config = HubConfig::new(hub_name, genome);
    if let Some(email) = args.get_one::<String>("email") {
        config = config.with_email(email);
    }
    if let Some(desc) = args.get_one::<String>("description") {
        config = config.with_description(Path::new(desc));
    }
    if args.get_flag("custom_genome") {
        config = config.with_assembly(AssemblyConfig {
            twobit: PathBuf::from(args.get_one::<String>("twobit").unwrap()),
            organism: args.get_one::<String>("organism").unwrap().to_string(),
            default_pos: args.get_one::<String>("default_pos").unwrap().to_string(),
        });
    }

    let files = write_hub(&hier, &colors, &config, &outdir)?;
    let sidecar = Sidecar::new(hub_name, genome, design, spec)
        .with_default_color(default_color)
        .save(&outdir)?;

    log::info!("Load {} in the browser", files.hub_txt.display());
    log::debug!("Sidecar saved to {}", sidecar.display());

    Ok(())
}

/// Local track files as absolute paths, so the saved design still finds
/// them from another working directory.
fn absolute_file_refs(design: &mut TrackDesign) -> anyhow::Result<()> {
    for record in design.records_mut() {
        if hubr::is_url(&record.file_ref) {
            continue;
        }
        let path = Path::new(&record.file_ref);
        if path.exists() {
            let abs = path.canonicalize()?;
            let format = record.format.clone();
            record.set_file(&abs.to_string_lossy(), &format);
        }
    }
    Ok(())
}
