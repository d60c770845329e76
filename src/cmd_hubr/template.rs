use clap::*;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("template")
        .about("Writes the header of an empty metadata table")
        .after_help(
            r###"
The table lists one track per row. `fn` holds the file path or URL; every
other column is optional and any extra column becomes track metadata.

* name: the track label, the file stem if empty
* track_type: the format, when the extension doesn't tell
* color: `#rrggbb` or `r,g,b`, beats the palette for that track
* supertrack, composite, overlay: plain columns to pass to
  --supergroup-by, --subgroup-by and --overlay-by

Examples:
1. A CSV template:
   hubr template --csv -o design.csv

2. A TSV template on screen:
   hubr template

"###,
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .action(ArgAction::SetTrue)
                .help("Comma-separated instead of tab-separated"),
        )
        .arg(
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
    let mut writer = hubr::writer(args.get_one::<String>("outfile").unwrap())?;
    let sep = if args.get_flag("csv") { "," } else { "\t" };

    let header = hubr::libs::design::template_header();
    writer.write_fmt(format_args!("{}\n", header.join(sep)))?;

    Ok(())
}
