//! Subcommand modules for the `hubr` binary.

pub mod args;
pub mod create;
pub mod design;
pub mod merge;
pub mod template;
pub mod tree;
pub mod validate;
