use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered field → value mapping. Insertion order is the order in which the
/// fields were first seen and is kept through serialization.
pub type Metadata = IndexMap<String, String>;

/// The display label field every record carries.
pub const NAME_FIELD: &str = "name";

/// Name of the file reference column in metadata tables.
pub const FILE_FIELD: &str = "fn";

/// A per-track color, `#rrggbb` or `r,g,b`, that beats the palette.
pub const COLOR_FIELD: &str = "color";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Signal,
    Region,
    Annotation,
    Alignment,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackKind::Signal => "signal",
            TrackKind::Region => "region",
            TrackKind::Annotation => "annotation",
            TrackKind::Alignment => "alignment",
        };
        write!(f, "{}", s)
    }
}

/// Normalize a file extension or a user supplied type to a browser format
/// name. Unknown values are returned unchanged.
///
/// ```
/// use hubr::libs::track::normalize_format;
/// assert_eq!(normalize_format("bw"), "bigWig");
/// assert_eq!(normalize_format("BED"), "bed");
/// assert_eq!(normalize_format("gff"), "gff");
/// assert_eq!(normalize_format("vcf"), "vcf");
/// ```
pub fn normalize_format(ext: &str) -> String {
    let lower = ext.trim_start_matches('.').to_lowercase();
    let format = match lower.as_str() {
        "bw" | "bigwig" => "bigWig",
        "bb" | "bigbed" => "bigBed",
        "biggenepred" => "bigGenePred",
        "narrowpeak" => "narrowPeak",
        "broadpeak" => "broadPeak",
        "bed" => "bed",
        "gtf" => "gtf",
        "gff" | "gff3" => "gff",
        "bam" => "bam",
        "cram" => "cram",
        _ => return ext.trim_start_matches('.').to_string(),
    };
    format.to_string()
}

/// Formats that can't be displayed before an indexing conversion.
pub fn needs_conversion(format: &str) -> bool {
    matches!(format, "bed" | "gtf" | "gff")
}

/// The format a convertible file ends up as.
pub fn converted_format(format: &str) -> Option<&'static str> {
    match format {
        "bed" => Some("bigBed"),
        "gtf" | "gff" => Some("bigGenePred"),
        _ => None,
    }
}

pub fn kind_of_format(format: &str) -> TrackKind {
    match format {
        "bigWig" => TrackKind::Signal,
        "bigGenePred" | "gtf" | "gff" => TrackKind::Annotation,
        "bam" | "cram" => TrackKind::Alignment,
        _ => TrackKind::Region,
    }
}

/// Replace every character a track identifier can't hold with `_`.
///
/// ```
/// use hubr::libs::track::sanitize;
/// assert_eq!(sanitize("K562 CTCF.rep-1"), "K562_CTCF_rep_1");
/// ```
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// File name without the (last) extension, `.gz` is looked through.
pub fn file_stem(file_ref: &str) -> String {
    let name = file_ref.rsplit(['/', '\\']).next().unwrap_or(file_ref);
    let name = name.strip_suffix(".gz").unwrap_or(name);
    match name.rfind('.') {
        Some(i) if i > 0 => name[..i].to_string(),
        _ => name.to_string(),
    }
}

pub fn file_ext(file_ref: &str) -> String {
    let name = file_ref.rsplit(['/', '\\']).next().unwrap_or(file_ref);
    let name = name.strip_suffix(".gz").unwrap_or(name);
    match name.rfind('.') {
        Some(i) if i > 0 => name[i + 1..].to_string(),
        _ => String::new(),
    }
}

/// Turn a display name into a label: separators become spaces.
pub fn label_of(name: &str) -> String {
    name.split(['.', '_', '-', ' ', '|'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One data file and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Unique within a design, derived from the file name
    pub id: String,
    /// Path or URL, never opened by the engine
    pub file_ref: String,
    /// Browser format, e.g. `bigWig`
    pub format: String,
    pub kind: TrackKind,
    /// Always holds [`NAME_FIELD`]
    pub metadata: Metadata,
}

impl TrackRecord {
    /// Build a record from a file reference. The format comes from
    /// `track_type` if given, else from the extension; a missing `name` is
    /// synthesized from the file stem.
    ///
    /// ```
    /// use hubr::libs::track::{TrackKind, TrackRecord};
    /// let rec = TrackRecord::new("data/K562_CTCF.bw", None, Default::default());
    /// assert_eq!(rec.id, "K562_CTCF");
    /// assert_eq!(rec.name(), "K562_CTCF");
    /// assert_eq!(rec.format, "bigWig");
    /// assert_eq!(rec.kind, TrackKind::Signal);
    /// ```
    pub fn new(file_ref: &str, track_type: Option<&str>, mut metadata: Metadata) -> Self {
        let stem = file_stem(file_ref);
        let format = match track_type {
            Some(t) if !t.is_empty() => normalize_format(t),
            _ => normalize_format(&file_ext(file_ref)),
        };

        let has_name = metadata
            .get(NAME_FIELD)
            .map(|n| !n.is_empty())
            .unwrap_or(false);
        if !has_name {
            metadata.insert(NAME_FIELD.to_string(), stem.clone());
        }

        Self {
            id: sanitize(&stem),
            file_ref: file_ref.to_string(),
            kind: kind_of_format(&format),
            format,
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata
            .get(NAME_FIELD)
            .map(|s| s.as_str())
            .unwrap_or(self.id.as_str())
    }

    /// Value of a field; empty values count as absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.metadata
            .get(field)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Values of all `fields`, `None` if any one is absent.
    pub fn values_of(&self, fields: &[String]) -> Option<Vec<String>> {
        fields
            .iter()
            .map(|f| self.get(f).map(|v| v.to_string()))
            .collect()
    }

    /// Replace the file reference, e.g. after a conversion. The id is kept.
    pub fn set_file(&mut self, file_ref: &str, format: &str) {
        self.file_ref = file_ref.to_string();
        self.format = format.to_string();
        self.kind = kind_of_format(format);
    }

    pub fn is_signal(&self) -> bool {
        self.kind == TrackKind::Signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_and_ext() {
        assert_eq!(file_stem("a/b/sample1.plus.bigWig"), "sample1.plus");
        assert_eq!(file_ext("a/b/sample1.plus.bigWig"), "bigWig");
        assert_eq!(file_stem("peaks.bed.gz"), "peaks");
        assert_eq!(file_ext("peaks.bed.gz"), "bed");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_ext("noext"), "");
        assert_eq!(file_stem("https://host/x/y.bw"), "y");
    }

    #[test]
    fn test_record_kinds() {
        let rec = TrackRecord::new("p.narrowPeak", None, Metadata::new());
        assert_eq!(rec.format, "narrowPeak");
        assert_eq!(rec.kind, TrackKind::Region);

        let rec = TrackRecord::new("genes.gtf", None, Metadata::new());
        assert_eq!(rec.kind, TrackKind::Annotation);
        assert!(needs_conversion(&rec.format));
        assert_eq!(converted_format(&rec.format), Some("bigGenePred"));

        let rec = TrackRecord::new("reads.bam", None, Metadata::new());
        assert_eq!(rec.kind, TrackKind::Alignment);

        let rec = TrackRecord::new("x.dat", Some("bigwig"), Metadata::new());
        assert_eq!(rec.format, "bigWig");
        assert!(rec.is_signal());
    }

    #[test]
    fn test_record_keeps_given_name() {
        let mut md = Metadata::new();
        md.insert("name".to_string(), "Nice name".to_string());
        md.insert("assay".to_string(), "".to_string());
        let rec = TrackRecord::new("x/file.bw", None, md);
        assert_eq!(rec.name(), "Nice name");
        assert_eq!(rec.id, "file");
        assert_eq!(rec.get("assay"), None);
        assert_eq!(rec.values_of(&["name".to_string()]), Some(vec!["Nice name".to_string()]));
        assert_eq!(rec.values_of(&["name".to_string(), "assay".to_string()]), None);
    }

    #[test]
    fn test_label_of() {
        assert_eq!(label_of("K562_CTCF.rep-1"), "K562 CTCF rep 1");
    }
}
