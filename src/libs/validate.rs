use crate::libs::error::{HubError, Result};
use crate::libs::io::{find_tool, is_url};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref RE_BIG_DATA_URL: Regex = Regex::new(r"(?m)^\s*bigDataUrl\s+(\S+)").unwrap();
}

/// Outcome of an external check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub valid: bool,
    pub message: String,
}

/// Run UCSC `hubCheck` on a hub.txt.
///
/// # Errors
/// [`HubError::CapabilityMissing`] if `hubCheck` is neither in `PATH` nor
/// in `~/bin`.
pub fn hub_check(hub_txt: &Path, strict: bool) -> Result<CheckResult> {
    let tool = find_tool("hubCheck").ok_or_else(|| HubError::CapabilityMissing {
        tool: "hubCheck".to_string(),
        operation: "check the hub against the UCSC rules".to_string(),
    })?;

    let mut cmd = std::process::Command::new(tool);
    if strict {
        cmd.arg("-strict");
    }
    cmd.arg(hub_txt);
    log::debug!("{:?}", cmd);

    let output = cmd.output()?;
    let valid = output.status.success();
    let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if message.is_empty() {
        message = String::from_utf8_lossy(&output.stdout).trim().to_string();
    }
    if message.is_empty() && valid {
        message = "Hub is valid".to_string();
    }
    Ok(CheckResult { valid, message })
}

/// The first `*.hub.txt` in `dir`, by name.
pub fn find_hub_txt(dir: &Path) -> Result<Option<PathBuf>> {
    let mut hubs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(".hub.txt"))
                    .unwrap_or(false)
        })
        .collect();
    hubs.sort();
    Ok(hubs.into_iter().next())
}

/// Values of every `key value` line with `key` in a hub text file.
fn directive(content: &str, key: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|l| l.trim().split_once(char::is_whitespace))
        .filter(|(k, _)| *k == key)
        .map(|(_, v)| v.trim().to_string())
        .collect()
}

/// Structural check of a staged hub without external tools.
///
/// Missing hub.txt, genomes file or trackDb are errors; track files that a
/// trackDb points at but that aren't there are warnings.
#[derive(Debug, Clone)]
pub struct HubValidator {
    dir: PathBuf,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl HubValidator {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn validate_all(&mut self) -> Result<bool> {
        for trackdb in self.validate_structure()? {
            self.validate_track_files(&trackdb)?;
        }
        Ok(self.errors.is_empty())
    }

    /// Follow hub.txt → genomes file → trackDb files; returns the trackDb
    /// files found.
    pub fn validate_structure(&mut self) -> Result<Vec<PathBuf>> {
        let hub_txt = match find_hub_txt(&self.dir)? {
            Some(p) => p,
            None => {
                self.errors
                    .push(format!("No *.hub.txt in {}", self.dir.display()));
                return Ok(vec![]);
            }
        };
        let hub = std::fs::read_to_string(&hub_txt)?;

        let genomes_file = match directive(&hub, "genomesFile").into_iter().next() {
            Some(g) => self.dir.join(g),
            None => {
                self.errors
                    .push(format!("{} has no genomesFile", hub_txt.display()));
                return Ok(vec![]);
            }
        };
        if !genomes_file.is_file() {
            self.errors
                .push(format!("Genomes file {} not found", genomes_file.display()));
            return Ok(vec![]);
        }

        let genomes = std::fs::read_to_string(&genomes_file)?;
        let mut trackdbs = vec![];
        let entries = directive(&genomes, "trackDb");
        if entries.is_empty() {
            self.errors
                .push(format!("{} lists no trackDb", genomes_file.display()));
        }
        for entry in entries {
            let path = self.dir.join(&entry);
            if path.is_file() {
                trackdbs.push(path);
            } else {
                self.errors.push(format!("trackDb {} not found", entry));
            }
        }
        Ok(trackdbs)
    }

    /// Local `bigDataUrl`s are relative to their trackDb.
    pub fn validate_track_files(&mut self, trackdb: &Path) -> Result<()> {
        let content = std::fs::read_to_string(trackdb)?;
        let base = trackdb.parent().unwrap_or(self.dir.as_path()).to_path_buf();
        for cap in RE_BIG_DATA_URL.captures_iter(&content) {
            let url = &cap[1];
            if is_url(url) {
                continue;
            }
            if !base.join(url).is_file() {
                self.warnings.push(format!(
                    "Track file {} not found (referenced in {})",
                    url,
                    trackdb.display()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_hub(dir: &Path) {
        std::fs::create_dir_all(dir.join("hg38")).unwrap();
        std::fs::write(
            dir.join("demo.hub.txt"),
            "hub demo\nshortLabel demo\nlongLabel demo\ngenomesFile demo.genomes.txt\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("demo.genomes.txt"),
            "genome hg38\ntrackDb hg38/trackDb.txt\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("hg38/trackDb.txt"),
            "track a\nbigDataUrl a.bw\ntype bigWig\n\ntrack b\nbigDataUrl b.bw\n\ntrack c\nbigDataUrl https://x.org/c.bw\n",
        )
        .unwrap();
        std::fs::write(dir.join("hg38/a.bw"), "").unwrap();
    }

    #[test]
    fn test_structure_ok_with_warning() {
        let tempdir = tempfile::TempDir::new().unwrap();
        staged_hub(tempdir.path());

        let mut validator = HubValidator::new(tempdir.path());
        assert!(validator.validate_all().unwrap());
        assert!(validator.errors.is_empty());
        assert_eq!(validator.warnings.len(), 1);
        assert!(validator.warnings[0].contains("b.bw"));
    }

    #[test]
    fn test_structure_missing_pieces() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let mut validator = HubValidator::new(tempdir.path());
        assert!(!validator.validate_all().unwrap());
        assert!(validator.errors[0].contains("hub.txt"));

        staged_hub(tempdir.path());
        std::fs::remove_file(tempdir.path().join("hg38/trackDb.txt")).unwrap();
        let mut validator = HubValidator::new(tempdir.path());
        assert!(!validator.validate_all().unwrap());
        assert!(validator.errors[0].contains("trackDb"));
    }

    #[test]
    fn test_directive() {
        let content = "genome hg38\ntrackDb hg38/trackDb.txt\n\ngenome mm10\ntrackDb mm10/trackDb.txt\n";
        assert_eq!(
            directive(content, "trackDb"),
            vec!["hg38/trackDb.txt", "mm10/trackDb.txt"]
        );
    }
}
