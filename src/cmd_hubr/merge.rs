use clap::*;
use hubr::libs::merge::{HubMerger, HubSource};
use hubr::libs::sidecar::Sidecar;
use hubr::libs::trackdb::{write_hub, HubConfig};
use std::path::{Path, PathBuf};

/// Conflicts of a merge, written next to the merged hub.
const CONFLICTS_FILE: &str = "merge_conflicts.tsv";

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("merge")
        .about("Merges hubs built by `create` into one")
        .after_help(
            r###"
Each input is a hub directory written by `hubr create`, or the
`hub_config.json` inside one. The hierarchies are rebuilt and merged:

* Supertracks and composites with the same name and grouping are combined
* Same-named containers grouped differently are kept apart, prefixed with
  the label of their hub
* Tracks whose id or name is already taken are renamed the same way
* Within a color scope the first hub's color of a value wins

Every conflict is logged and written to `merge_conflicts.tsv` in the output
directory. All inputs must be for the same genome.

Examples:
1. Merge two hubs:
   hubr merge chip_hub/ atac_hub/ -o merged/

2. Name the result and insist on the genome:
   hubr merge a/hub_config.json b/hub_config.json --hub-name all -g hg38 -o merged/

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Hub directories or their hub_config.json"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .required(true)
                .help("Output directory"),
        )
        .arg(
            Arg::new("hub_name")
                .long("hub-name")
                .short('n')
                .num_args(1)
                .default_value("MERGED_HUB")
                .help("Name of the merged hub"),
        )
        .arg(
            Arg::new("genome")
                .long("genome")
                .short('g')
                .num_args(1)
                .help("Genome every input must be built for"),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .num_args(1)
                .help("Contact email in hub.txt"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let hub_name = args.get_one::<String>("hub_name").unwrap();
    let outdir = PathBuf::from(args.get_one::<String>("outdir").unwrap());

    let mut sources = vec![];
    for infile in args.get_many::<String>("infiles").unwrap() {
        let sidecar = Sidecar::load(Path::new(infile))
            .map_err(|e| anyhow::anyhow!("Can't load hub {}: {}", infile, e))?;
        log::info!(
            "Hub {} ({}, {} tracks)",
            sidecar.label,
            sidecar.genome,
            sidecar.design.len()
        );
        sources.push(HubSource::from_sidecar(sidecar)?);
    }

    let mut merger = HubMerger::new();
    if let Some(genome) = args.get_one::<String>("genome") {
        merger = merger.with_genome(genome);
    }
    let result = merger.merge(&sources)?;

    std::fs::create_dir_all(&outdir)?;
    let mut config = HubConfig::new(hub_name, &result.genome);
    if let Some(email) = args.get_one::<String>("email") {
        config = config.with_email(email);
    }
    let files = write_hub(&result.hierarchy, &result.colors, &config, &outdir)?;

    let default_color = sources[0].colors.default;
    let conflicts = result.conflicts_tsv();
    let n_conflicts = result.conflicts.len();
    Sidecar::new(hub_name, &result.genome, result.design, result.spec)
        .with_default_color(default_color)
        .save(&outdir)?;

    let mut writer = hubr::writer(&outdir.join(CONFLICTS_FILE).to_string_lossy())?;
    writer.write_all(conflicts.as_bytes())?;

    log::info!(
        "Merged {} hubs into {} ({} conflicts)",
        sources.len(),
        files.hub_txt.display(),
        n_conflicts
    );

    Ok(())
}
