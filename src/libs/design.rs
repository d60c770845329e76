use crate::libs::error::{HubError, Result};
use crate::libs::extract::{MergePolicy, MetadataExtractor};
use crate::libs::track::{Metadata, TrackRecord, COLOR_FIELD, FILE_FIELD, NAME_FIELD};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Columns of a metadata table that describe the file rather than the track.
const RESERVED: [&str; 4] = ["path", "ext", "track_type", "basename"];

/// The table of all tracks of a hub.
///
/// Records keep their insertion order, which is the order the hierarchy is
/// laid out in. The schema is the union of all metadata keys seen so far, in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackDesign {
    records: Vec<TrackRecord>,
    schema: IndexSet<String>,
}

impl TrackDesign {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; its id must be new and its unseen keys extend the
    /// schema.
    pub fn push(&mut self, record: TrackRecord) -> Result<()> {
        if let Some(prev) = self.get(&record.id) {
            return Err(HubError::DuplicateName {
                parent: "track design".to_string(),
                name: record.id.clone(),
                first: prev.file_ref.clone(),
                second: record.file_ref,
            });
        }
        for key in record.metadata.keys() {
            if key != FILE_FIELD && !self.schema.contains(key) {
                self.schema.insert(key.clone());
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// One record per path; `common` fields are given to all of them and
    /// the extractor's fields are layered on top.
    pub fn from_paths<S: AsRef<str>>(
        paths: &[S],
        common: &Metadata,
        extractor: Option<&dyn MetadataExtractor>,
    ) -> Result<Self> {
        let mut design = Self::new();
        for p in paths {
            let file_ref = p.as_ref();
            let mut metadata = common.clone();
            if let Some(ex) = extractor {
                MergePolicy::Overwrite.reduce(&mut metadata, ex.extract(Path::new(file_ref)));
            }
            design.push(TrackRecord::new(file_ref, None, metadata))?;
        }
        Ok(design)
    }

    /// Read a CSV/TSV table. The delimiter is a tab if the header line holds
    /// one, a comma otherwise. `fn_col` names the file reference column;
    /// `name`, `ext` and `track_type` are understood, every other column
    /// becomes a metadata field. Empty cells are absent fields.
    ///
    /// Extracted fields are layered over the table's own values.
    pub fn from_table<R: Read>(
        mut rdr: R,
        fn_col: &str,
        extractor: Option<&dyn MetadataExtractor>,
    ) -> Result<Self> {
        let mut content = String::new();
        rdr.read_to_string(&mut content)?;

        let header = content.lines().next().unwrap_or_default();
        let delimiter = if header.contains('\t') { b'\t' } else { b',' };

        let mut csv_rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = csv_rdr.headers()?.iter().map(|s| s.to_string()).collect();
        let fn_idx = headers
            .iter()
            .position(|h| h == fn_col)
            .ok_or_else(|| {
                HubError::Table(format!(
                    "no `{}` column in header [{}]",
                    fn_col,
                    headers.join(", ")
                ))
            })?;

        let mut design = Self::new();
        for (i, result) in csv_rdr.records().enumerate() {
            let row = result?;
            let file_ref = row.get(fn_idx).unwrap_or_default();
            if file_ref.is_empty() {
                return Err(HubError::Table(format!(
                    "row {} has an empty `{}`",
                    i + 1,
                    fn_col
                )));
            }

            let mut track_type = None;
            let mut metadata = Metadata::new();
            for (col, value) in headers.iter().zip(row.iter()) {
                if col == fn_col || value.is_empty() {
                    continue;
                }
                if col == "ext" || col == "track_type" {
                    track_type = Some(value.to_string());
                    continue;
                }
                if RESERVED.contains(&col.as_str()) {
                    continue;
                }
                metadata.insert(col.clone(), value.to_string());
            }

            if let Some(ex) = extractor {
                MergePolicy::Overwrite.reduce(&mut metadata, ex.extract(Path::new(file_ref)));
            }
            log::debug!("{}: {:?}", file_ref, metadata);

            design.push(TrackRecord::new(file_ref, track_type.as_deref(), metadata))?;
        }

        Ok(design)
    }

    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [TrackRecord] {
        &mut self.records
    }

    pub fn schema(&self) -> &IndexSet<String> {
        &self.schema
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == FILE_FIELD || self.schema.contains(column)
    }

    /// [`HubError::Schema`] unless `column` is known.
    pub fn require_column(&self, column: &str, usage: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(HubError::Schema {
                column: column.to_string(),
                usage: usage.to_string(),
                known: self.schema.iter().cloned().collect::<Vec<_>>().join(", "),
            })
        }
    }

    pub fn get(&self, id: &str) -> Option<&TrackRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct non-empty values of `column`, in first-appearance order,
    /// with their counts.
    pub fn distinct_values(&self, column: &str) -> IndexMap<String, usize> {
        let mut values: IndexMap<String, usize> = IndexMap::new();
        for rec in &self.records {
            if let Some(v) = rec.get(column) {
                *values.entry(v.to_string()).or_default() += 1;
            }
        }
        values
    }

    /// Drop the records whose id is in `ids`; the schema is kept.
    pub fn remove_ids(&mut self, ids: &IndexSet<String>) {
        self.records.retain(|r| !ids.contains(&r.id));
    }

    /// Tab separated dump: `id`, `fn`, `kind`, `format`, then the schema.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        let mut header = vec!["id", FILE_FIELD, "kind", "format"];
        header.extend(self.schema.iter().map(|s| s.as_str()));
        out += &header.join("\t");
        out += "\n";

        for rec in &self.records {
            let mut fields = vec![
                rec.id.clone(),
                rec.file_ref.clone(),
                rec.kind.to_string(),
                rec.format.clone(),
            ];
            for col in &self.schema {
                fields.push(rec.metadata.get(col).cloned().unwrap_or_default());
            }
            out += &fields.join("\t");
            out += "\n";
        }
        out
    }
}

/// Header of an empty metadata table.
pub fn template_header() -> Vec<&'static str> {
    vec![
        FILE_FIELD,
        NAME_FIELD,
        "track_type",
        COLOR_FIELD,
        "supertrack",
        "composite",
        "overlay",
    ]
}
