extern crate clap;
use clap::*;

mod cmd_hubr;

fn main() -> anyhow::Result<()> {
    let app = Command::new("hubr")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`hubr` - Genome browser track hubs from track metadata")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Show debug messages"),
        )
        .subcommand(cmd_hubr::create::make_subcommand())
        .subcommand(cmd_hubr::merge::make_subcommand())
        .subcommand(cmd_hubr::validate::make_subcommand())
        .subcommand(cmd_hubr::design::make_subcommand())
        .subcommand(cmd_hubr::tree::make_subcommand())
        .subcommand(cmd_hubr::template::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Hubs:
    * create   - Group, color and write a hub from track files
    * merge    - Combine hubs built with `create`
    * validate - Check a written hub

* Inspection:
    * design   - Tracks and metadata after extraction, as TSV
    * tree     - The hierarchy a `create` would write
    * template - Header of an empty metadata table

"###,
        );

    let matches = app.get_matches();

    let level = if matches.get_flag("verbose") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.parse_env("RUST_LOG");
    clog.init();

    // Check which subcomamnd the user ran...
    match matches.subcommand() {
        Some(("create", sub_matches)) => cmd_hubr::create::execute(sub_matches),
        Some(("merge", sub_matches)) => cmd_hubr::merge::execute(sub_matches),
        Some(("validate", sub_matches)) => cmd_hubr::validate::execute(sub_matches),
        Some(("design", sub_matches)) => cmd_hubr::design::execute(sub_matches),
        Some(("tree", sub_matches)) => cmd_hubr::tree::execute(sub_matches),
        Some(("template", sub_matches)) => cmd_hubr::template::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
