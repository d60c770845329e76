use crate::libs::color::Rgb;
use crate::libs::design::TrackDesign;
use crate::libs::error::Result;
use crate::libs::grouping::GroupingSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the sidecar written next to every built hub.
pub const SIDECAR_FILE: &str = "hub_config.json";

/// What a built hub remembers about itself, enough to rebuild its hierarchy
/// for a later merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub version: String,
    /// Name of the hub, used to namespace renamed tracks when merging
    pub label: String,
    pub genome: String,
    pub design: TrackDesign,
    pub spec: GroupingSpec,
    #[serde(default)]
    pub default_color: Rgb,
}

impl Sidecar {
    pub fn new(label: &str, genome: &str, design: TrackDesign, spec: GroupingSpec) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            label: label.to_string(),
            genome: genome.to_string(),
            design,
            spec,
            default_color: Rgb::BLACK,
        }
    }

    pub fn with_default_color(mut self, color: Rgb) -> Self {
        self.default_color = color;
        self
    }

    /// `path` itself if it is a file, `path/hub_config.json` for a directory.
    pub fn locate(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(SIDECAR_FILE)
        } else {
            path.to_path_buf()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(Self::locate(path))?;
        let sidecar = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(sidecar)
    }

    /// Write into `dir` and return the file's path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(SIDECAR_FILE);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(path)
    }
}
