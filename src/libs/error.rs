use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

/// Errors raised while building, serializing or merging a hub.
///
/// Merge-time structural and color disagreements are not errors; they are
/// reported as [`crate::libs::merge::ConflictReport`]s.
#[derive(Error, Debug)]
pub enum HubError {
    /// A grouping or color column is not part of the design's schema
    #[error("Column `{column}` used for {usage} is not in the track design (known: {known})")]
    Schema {
        column: String,
        usage: String,
        known: String,
    },

    /// The grouping specification contradicts itself
    #[error("Invalid grouping: {0}")]
    InvalidSpec(String),

    /// Two siblings resolve to the same name
    #[error("Duplicate name `{name}` under `{parent}`: `{first}` and `{second}` collide; add a column with distinct values (e.g. a sample name)")]
    DuplicateName {
        parent: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("Genome mismatch: hub `{hub}` targets `{found}`, expected `{expected}`")]
    GenomeMismatch {
        expected: String,
        found: String,
        hub: String,
    },

    /// An external tool needed for an optional operation is not installed
    #[error("{tool} not found, can't {operation}")]
    CapabilityMissing { tool: String, operation: String },

    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Metadata table error: {0}")]
    Table(String),

    #[error("Conversion of track `{track}` failed: {message}")]
    Conversion { track: String, message: String },

    #[error("Nothing to merge")]
    EmptyMerge,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
