pub mod color;
pub mod convert;
pub mod design;
pub mod error;
pub mod extract;
pub mod grouping;
pub mod hierarchy;
pub mod io;
pub mod merge;
pub mod sidecar;
pub mod track;
pub mod trackdb;
pub mod validate;

pub use error::{HubError, Result};
