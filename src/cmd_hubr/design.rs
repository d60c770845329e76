use crate::cmd_hubr::args;
use clap::*;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("design")
        .about("Prints tracks and their metadata after extraction")
        .after_help(
            r###"
Output columns are `id`, `fn`, `kind`, `format`, then every metadata column
in the order it was first seen. Use it to check what `create` will group on.

Examples:
1. Metadata from seqnado output paths:
   hubr design --seqnado seqnado_output/*/bigwigs/*/*/*.bigWig

2. File name fields plus a constant column:
   hubr design *.bw --pattern '(?P<sample>[^_]+)_(?P<antibody>[^.]+)' --static batch=b1

3. From a metadata table:
   hubr design -d design.csv -o design.tsv

"###,
        );
    let cmd = args::input_args(cmd);
    let cmd = args::extractor_args(cmd);
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

    let mut writer = hubr::writer(args.get_one::<String>("outfile").unwrap())?;
    writer.write_all(design.to_tsv().as_bytes())?;

    Ok(())
}
