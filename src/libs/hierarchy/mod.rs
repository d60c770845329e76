//! The track hierarchy of a hub and the engine that builds it.

mod build;
mod node;
mod tree;

pub use build::{GroupingEngine, NAME_SEP};
pub use node::{dimension_tags, Dimension, HubNode, NodeId, NodeKind};
pub use tree::Hierarchy;
