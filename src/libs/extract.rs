//! Metadata extractors: functions from a track path to a set of fields.
//!
//! Every extractor is total. A path that does not fit the extractor's
//! convention yields an empty mapping, so a pipeline never stops on one odd
//! file. Extractors are combined with [`Pipeline`], whose stages run in an
//! explicit priority order and whose outputs are folded field by field with
//! a single [`MergePolicy`].

use crate::libs::error::{HubError, Result};
use crate::libs::track::Metadata;
use regex::Regex;
use std::path::{Component, Path};

pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Metadata;
}

/// Path components as strings, the file name included.
fn parts_of(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

/// File name with the last extension removed.
fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

//----------------------------
// Fixed positions
//----------------------------
/// Directory convention: fixed positional segments become fields.
///
/// Positions index the path components with the file stem as the last one;
/// negative positions count from the end (`-1` is the stem, `-2` the parent
/// directory).
///
/// ```
/// use hubr::libs::extract::{MetadataExtractor, Segments};
/// use std::path::Path;
/// let ex = Segments::new(&[(-3, "assay"), (-2, "norm"), (-1, "sample")]);
/// let md = ex.extract(Path::new("out/atac/cpm/s1.bigWig"));
/// assert_eq!(md["assay"], "atac");
/// assert_eq!(md["norm"], "cpm");
/// assert_eq!(md["sample"], "s1");
/// ```
#[derive(Debug, Clone)]
pub struct Segments {
    fields: Vec<(isize, String)>,
}

impl Segments {
    pub fn new(fields: &[(isize, &str)]) -> Self {
        Self {
            fields: fields.iter().map(|(i, f)| (*i, f.to_string())).collect(),
        }
    }
}

impl MetadataExtractor for Segments {
    fn extract(&self, path: &Path) -> Metadata {
        let mut parts = parts_of(path);
        if let Some(last) = parts.last_mut() {
            *last = stem_of(path);
        }
        let len = parts.len() as isize;

        let mut metadata = Metadata::new();
        for (pos, field) in &self.fields {
            let idx = if *pos < 0 { len + pos } else { *pos };
            if idx < 0 || idx >= len {
                continue;
            }
            metadata.insert(field.clone(), parts[idx as usize].clone());
        }
        metadata
    }
}

//----------------------------
// seqnado
//----------------------------
/// The seqnado output layout:
/// `.../seqnado_output/{assay}/{file_type}/{method}/{norm}/{sample}[_{x}].ext`
///
/// MCC files carry a `viewpoint` and RNA files a `strand` after the sample
/// name.
#[derive(Debug, Clone, Default)]
pub struct SeqnadoPath;

impl SeqnadoPath {
    fn assay_of(parts: &[String]) -> Option<String> {
        for (i, part) in parts.iter().enumerate() {
            if part.to_lowercase() == "seqnado_output" && i + 1 < parts.len() {
                return Some(parts[i + 1].clone());
            }
        }
        if parts.len() >= 4 {
            return Some(parts[parts.len() - 4].clone());
        }
        None
    }
}

impl MetadataExtractor for SeqnadoPath {
    fn extract(&self, path: &Path) -> Metadata {
        lazy_static::lazy_static! {
            static ref RE_SEP: Regex = Regex::new(r"[._]").unwrap();
        }

        let mut metadata = Metadata::new();
        let parts = parts_of(path);
        if parts.len() < 4 {
            return metadata;
        }
        let assay = match Self::assay_of(&parts) {
            Some(a) => a,
            None => return metadata,
        };
        let n = parts.len();

        let stem = stem_of(path);
        let pieces: Vec<&str> = RE_SEP.split(&stem).collect();

        metadata.insert("assay".to_string(), assay.clone());
        metadata.insert("norm".to_string(), parts[n - 2].clone());
        metadata.insert("method".to_string(), parts[n - 3].clone());
        metadata.insert("file_type".to_string(), parts[n - 4].clone());
        metadata.insert("samplename".to_string(), pieces[0].to_string());

        let last = pieces.last().copied().unwrap_or_default();
        match assay.as_str() {
            "MCC" => {
                metadata.insert("viewpoint".to_string(), last.to_string());
            }
            "RNA" => {
                metadata.insert("strand".to_string(), last.to_string());
            }
            _ => {}
        }

        metadata
    }
}

//----------------------------
// Regex
//----------------------------
/// Named capture groups matched against the file name become fields.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    regex: Regex,
}

impl FilenamePattern {
    /// Fails here, not per file, when the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| HubError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }
}

impl MetadataExtractor for FilenamePattern {
    fn extract(&self, path: &Path) -> Metadata {
        let mut metadata = Metadata::new();
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => return metadata,
        };

        if let Some(caps) = self.regex.captures(&name) {
            for field in self.regex.capture_names().flatten() {
                if let Some(m) = caps.name(field) {
                    metadata.insert(field.to_string(), m.as_str().to_string());
                }
            }
        }
        metadata
    }
}

//----------------------------
// Parent directories
//----------------------------
/// The names of the `depth` closest ancestor directories, nearest first.
/// Fields are named by `names`, falling back to `dir_1`, `dir_2`, ...
#[derive(Debug, Clone)]
pub struct ParentDirs {
    depth: usize,
    names: Vec<String>,
}

impl ParentDirs {
    pub fn new(depth: usize, names: &[String]) -> Self {
        Self {
            depth,
            names: names.to_vec(),
        }
    }
}

impl MetadataExtractor for ParentDirs {
    fn extract(&self, path: &Path) -> Metadata {
        let mut metadata = Metadata::new();
        let mut current = path.parent();

        for i in 0..self.depth {
            let dir = match current {
                Some(d) => d,
                None => break,
            };
            let dir_name = match dir.file_name() {
                Some(n) => n.to_string_lossy().to_string(),
                None => break,
            };
            let key = self
                .names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("dir_{}", i + 1));
            metadata.insert(key, dir_name);
            current = dir.parent();
        }

        metadata
    }
}

//----------------------------
// Constant
//----------------------------
/// The same fields for every path, usually the lowest layer of a pipeline.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    values: Metadata,
}

impl StaticMetadata {
    pub fn new(values: Metadata) -> Self {
        Self { values }
    }

    /// Parse `key=value` pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut values = Metadata::new();
        for pair in pairs {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    values.insert(k.trim().to_string(), v.trim().to_string());
                }
                _ => {
                    return Err(HubError::InvalidSpec(format!(
                        "static metadata `{}` is not key=value",
                        pair
                    )))
                }
            }
        }
        Ok(Self { values })
    }
}

impl MetadataExtractor for StaticMetadata {
    fn extract(&self, _path: &Path) -> Metadata {
        self.values.clone()
    }
}

//----------------------------
// Composition
//----------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// A later stage replaces a value set by an earlier one
    Overwrite,
    /// The first non-empty value of a field is kept
    KeepFirst,
}

impl MergePolicy {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            MergePolicy::Overwrite
        } else {
            MergePolicy::KeepFirst
        }
    }

    /// Fold one stage's output into the accumulated fields.
    /// Empty values are never written.
    pub fn reduce(&self, acc: &mut Metadata, incoming: Metadata) {
        for (field, value) in incoming {
            if value.is_empty() {
                continue;
            }
            match self {
                MergePolicy::Overwrite => {
                    acc.insert(field, value);
                }
                MergePolicy::KeepFirst => {
                    let entry = acc.entry(field).or_default();
                    if entry.is_empty() {
                        *entry = value;
                    }
                }
            }
        }
    }
}

struct Stage {
    priority: usize,
    extractor: Box<dyn MetadataExtractor>,
}

/// An ordered list of extractors applied to the same path.
///
/// With three or more stages the policy is applied pairwise from left to
/// right, which makes `Overwrite` "last non-empty writer wins" and
/// `KeepFirst` "first non-empty writer wins".
pub struct Pipeline {
    stages: Vec<Stage>,
    policy: MergePolicy,
}

impl Pipeline {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            stages: vec![],
            policy,
        }
    }

    /// Compose extractors in the given order.
    ///
    /// ```
    /// use hubr::libs::extract::*;
    /// use std::path::Path;
    ///
    /// let defaults = StaticMetadata::from_pairs(&["sample=DEFAULT"]).unwrap();
    /// let pattern = FilenamePattern::new(r"(?P<sample>.+?)_(?P<mark>.+?)\.").unwrap();
    ///
    /// let pipeline = Pipeline::compose(vec![Box::new(defaults), Box::new(pattern)], true);
    /// let md = pipeline.extract(Path::new("K562_CTCF.bigWig"));
    /// assert_eq!(md["sample"], "K562");
    /// assert_eq!(md["mark"], "CTCF");
    /// ```
    pub fn compose(extractors: Vec<Box<dyn MetadataExtractor>>, overwrite: bool) -> Self {
        let mut pipeline = Self::new(MergePolicy::from_overwrite(overwrite));
        for extractor in extractors {
            pipeline.push_boxed(extractor);
        }
        pipeline
    }

    /// Append a stage after all existing ones.
    pub fn stage(mut self, extractor: impl MetadataExtractor + 'static) -> Self {
        self.push_boxed(Box::new(extractor));
        self
    }

    fn push_boxed(&mut self, extractor: Box<dyn MetadataExtractor>) {
        let priority = self.stages.iter().map(|s| s.priority + 1).max().unwrap_or(0);
        self.stages.push(Stage {
            priority,
            extractor,
        });
    }

    /// Insert a stage at an explicit priority; lower runs first, ties keep
    /// insertion order.
    pub fn with_priority(
        mut self,
        priority: usize,
        extractor: impl MetadataExtractor + 'static,
    ) -> Self {
        let idx = self
            .stages
            .iter()
            .position(|s| s.priority > priority)
            .unwrap_or(self.stages.len());
        self.stages.insert(
            idx,
            Stage {
                priority,
                extractor: Box::new(extractor),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl MetadataExtractor for Pipeline {
    fn extract(&self, path: &Path) -> Metadata {
        let mut metadata = Metadata::new();
        for stage in &self.stages {
            self.policy.reduce(&mut metadata, stage.extractor.extract(path));
        }
        metadata
    }
}
