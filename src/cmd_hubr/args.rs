//! Arguments shared by the subcommands that read tracks.

use clap::*;
use hubr::libs::color::{Palette, Rgb};
use hubr::libs::design::TrackDesign;
use hubr::libs::extract::{
    FilenamePattern, MergePolicy, MetadataExtractor, ParentDirs, Pipeline, SeqnadoPath,
    StaticMetadata,
};
use hubr::libs::grouping::GroupingSpec;
use hubr::libs::track::{Metadata, FILE_FIELD};
use itertools::Itertools;

/// Track files, or a metadata table listing them.
pub fn input_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("infiles")
            .num_args(0..)
            .index(1)
            .help("Track files; ignored when --details is given"),
    )
    .arg(
        Arg::new("details")
            .long("details")
            .short('d')
            .num_args(1)
            .help("CSV/TSV metadata table, one row per track; [stdin] for screen input"),
    )
    .arg(
        Arg::new("fn_column")
            .long("fn-column")
            .num_args(1)
            .default_value(FILE_FIELD)
            .help("Column of the metadata table holding the file paths"),
    )
}

/// Metadata taken from the file paths.
pub fn extractor_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("seqnado")
            .long("seqnado")
            .action(ArgAction::SetTrue)
            .help("Read assay, method, norm and sample from seqnado output paths"),
    )
    .arg(
        Arg::new("pattern")
            .long("pattern")
            .num_args(1)
            .action(ArgAction::Append)
            .help("Regex with named groups matched against the file name; can be repeated"),
    )
    .arg(
        Arg::new("parent_dirs")
            .long("parent-dirs")
            .num_args(1)
            .value_parser(value_parser!(usize))
            .help("Take this many parent directory names as fields"),
    )
    .arg(
        Arg::new("dir_names")
            .long("dir-names")
            .num_args(1..)
            .value_delimiter(',')
            .help("Field names for --parent-dirs, nearest directory first"),
    )
    .arg(
        Arg::new("static")
            .long("static")
            .num_args(1)
            .action(ArgAction::Append)
            .help("key=value given to every track; can be repeated"),
    )
    .arg(
        Arg::new("keep_first")
            .long("keep-first")
            .action(ArgAction::SetTrue)
            .help("Earlier extractors win on shared fields; by default later ones do"),
    )
}

/// Supertracks, composites, overlays and colors.
pub fn grouping_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("supergroup_by")
            .long("supergroup-by")
            .short('S')
            .num_args(1..)
            .value_delimiter(',')
            .help("Column(s) whose values become supertracks"),
    )
    .arg(
        Arg::new("subgroup_by")
            .long("subgroup-by")
            .short('G')
            .num_args(1..)
            .value_delimiter(',')
            .help("Column(s) that become composite dimensions"),
    )
    .arg(
        Arg::new("overlay_by")
            .long("overlay-by")
            .num_args(1)
            .help("Signal tracks differing only in this column are overlaid"),
    )
    .arg(
        Arg::new("color_by")
            .long("color-by")
            .short('c')
            .num_args(1)
            .help("Column whose values pick the track colors"),
    )
    .arg(
        Arg::new("palette")
            .long("palette")
            .num_args(1)
            .default_value("tab20")
            .value_parser(Palette::NAMES)
            .help("Color scheme for --color-by"),
    )
    .arg(
        Arg::new("default_color")
            .long("default-color")
            .num_args(1)
            .default_value("0,0,0")
            .help("Color of tracks without a --color-by value, `r,g,b` or `#rrggbb`"),
    )
}

pub fn pipeline(args: &ArgMatches) -> anyhow::Result<Option<Pipeline>> {
    let mut pipeline = Pipeline::new(MergePolicy::from_overwrite(!args.get_flag("keep_first")));

    if let Some(pairs) = args.get_many::<String>("static") {
        let pairs: Vec<&String> = pairs.collect();
        pipeline = pipeline.stage(StaticMetadata::from_pairs(&pairs)?);
    }
    if args.get_flag("seqnado") {
        pipeline = pipeline.stage(SeqnadoPath);
    }
    if let Some(depth) = args.get_one::<usize>("parent_dirs") {
        let names: Vec<String> = args
            .get_many::<String>("dir_names")
            .map(|v| v.cloned().collect())
            .unwrap_or_default();
        pipeline = pipeline.stage(ParentDirs::new(*depth, &names));
    }
    if let Some(patterns) = args.get_many::<String>("pattern") {
        for p in patterns {
            pipeline = pipeline.stage(FilenamePattern::new(p)?);
        }
    }

    Ok(if pipeline.is_empty() {
        None
    } else {
        Some(pipeline)
    })
}

/// The track design from `--details` or the positional files.
pub fn load_design(args: &ArgMatches) -> anyhow::Result<TrackDesign> {
    let pipeline = pipeline(args)?;
    let extractor = pipeline.as_ref().map(|p| p as &dyn MetadataExtractor);

    let design = if let Some(details) = args.get_one::<String>("details") {
        let reader = hubr::reader(details)?;
        let fn_column = args.get_one::<String>("fn_column").unwrap();
        TrackDesign::from_table(reader, fn_column, extractor)?
    } else {
        let infiles: Vec<String> = args
            .get_many::<String>("infiles")
            .map(|v| v.cloned().collect())
            .unwrap_or_default();
        if infiles.is_empty() {
            anyhow::bail!("No tracks: give track files or --details");
        }
        TrackDesign::from_paths(&infiles, &Metadata::new(), extractor)?
    };

    log::info!(
        "{} tracks, columns: {}",
        design.len(),
        design.schema().iter().join(", ")
    );
    Ok(design)
}

pub fn grouping_spec(args: &ArgMatches) -> anyhow::Result<GroupingSpec> {
    let values = |id: &str| -> Vec<String> {
        args.get_many::<String>(id)
            .map(|v| v.cloned().collect())
            .unwrap_or_default()
    };

    let palette: Palette = args
        .get_one::<String>("palette")
        .unwrap()
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut spec = GroupingSpec::new()
        .supergroup_by(&values("supergroup_by")[..])
        .subgroup_by(&values("subgroup_by")[..])
        .with_palette(palette);
    if let Some(key) = args.get_one::<String>("overlay_by") {
        spec = spec.overlay_by(key);
    }
    if let Some(key) = args.get_one::<String>("color_by") {
        spec = spec.color_by(key, palette);
    }
    Ok(spec)
}

pub fn default_color(args: &ArgMatches) -> anyhow::Result<Rgb> {
    args.get_one::<String>("default_color")
        .unwrap()
        .parse::<Rgb>()
        .map_err(|e| anyhow::anyhow!(e))
}
