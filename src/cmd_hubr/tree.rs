use crate::cmd_hubr::args;
use clap::*;
use hubr::libs::color::ColorAssigner;
use hubr::libs::hierarchy::GroupingEngine;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("tree")
        .about("Prints the track hierarchy as an outline")
        .after_help(
            r###"
Groups the tracks exactly as `create` would and prints one line per node:
supertracks, composites with their dimensions, overlays and leaf tracks with
their colors. Nothing is written to disk.

Grouping order:
* --supergroup-by: one supertrack per value
* --subgroup-by: composites with these columns as dimensions, one per format
* --overlay-by: signal tracks differing only in this column share an overlay

Examples:
1. Supertracks per assay, composites over sample and antibody:
   hubr tree -d design.csv -S assay -G samplename,antibody -c samplename

2. Overlay the strands of each sample:
   hubr tree --seqnado seqnado_output/rna/bigwigs/*/*/*.bigWig --overlay-by strand

"###,
        );
    let cmd = args::input_args(cmd);
    let cmd = args::extractor_args(cmd);
    let cmd = args::grouping_args(cmd);
    cmd.arg(
        Arg::new("outfile")
            .long("outfile")
            .short('o')
            .num_args(1)
            .default_value("stdout")
            .help("Output filename. [stdout] for screen"),
    )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let design = args::load_design(args)?;
    let spec = args::grouping_spec(args)?;

    let hier = GroupingEngine::new(&design, &spec).build()?;
    let colors = ColorAssigner::new(spec.color_key.as_deref(), spec.palette)
        .with_default(args::default_color(args)?)
        .assign(&hier);

    let mut writer = hubr::writer(args.get_one::<String>("outfile").unwrap())?;
    writer.write_all(hier.outline(Some(&colors)).as_bytes())?;

    Ok(())
}
