use clap::*;
use hubr::libs::error::HubError;
use hubr::libs::validate::{find_hub_txt, hub_check, HubValidator};
use std::path::{Path, PathBuf};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("validate")
        .about("Checks a written hub")
        .after_help(
            r###"
Runs UCSC `hubCheck` when it is in PATH or ~/bin. Without it, falls back to
a structural check: hub.txt, the genomes file and every trackDb must exist,
and local track files named by `bigDataUrl` should be present.

Examples:
1. Check a hub directory:
   hubr validate hub/

2. Stricter hubCheck rules:
   hubr validate hub/chip.hub.txt --strict

3. Only the structural check:
   hubr validate hub/ --no-hubcheck

"###,
        )
        .arg(
            Arg::new("hub")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Hub directory or its hub.txt"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Pass -strict to hubCheck"),
        )
        .arg(
            Arg::new("no_hubcheck")
                .long("no-hubcheck")
                .action(ArgAction::SetTrue)
                .help("Skip hubCheck, run the structural check only"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let hub = PathBuf::from(args.get_one::<String>("hub").unwrap());
    let (dir, hub_txt) = if hub.is_dir() {
        (hub.clone(), find_hub_txt(&hub)?)
    } else if hub.is_file() {
        let dir = hub.parent().unwrap_or(Path::new(".")).to_path_buf();
        (dir, Some(hub.clone()))
    } else {
        anyhow::bail!("{} not found", hub.display());
    };

    if !args.get_flag("no_hubcheck") {
        if let Some(hub_txt) = &hub_txt {
            match hub_check(hub_txt, args.get_flag("strict")) {
                Ok(result) => {
                    if result.valid {
                        log::info!("{}", result.message);
                        return Ok(());
                    }
                    anyhow::bail!("hubCheck failed:\n{}", result.message);
                }
                Err(e @ HubError::CapabilityMissing { .. }) => {
                    log::warn!("{}; falling back to the structural check", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let mut validator = HubValidator::new(&dir);
    let is_valid = validator.validate_all()?;
    for w in &validator.warnings {
        log::warn!("{}", w);
    }
    for e in &validator.errors {
        log::error!("{}", e);
    }
    if !is_valid {
        anyhow::bail!("{} errors in {}", validator.errors.len(), dir.display());
    }
    log::info!(
        "{} is structurally valid ({} warnings)",
        dir.display(),
        validator.warnings.len()
    );

    Ok(())
}
