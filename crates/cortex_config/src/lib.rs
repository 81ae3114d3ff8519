#![deny(missing_docs)]
//! Configuration for cortex services and executors.
//!
//! Every component reads its settings through the [`ConfigSource`] trait, a
//! read-only view of a hierarchical key/value store. [`ConfigTree`] is the
//! in-memory implementation, normally loaded from a YAML file.
//! The [`paths`] module knows where well-known options live and how a
//! component name maps onto its configuration section.

#[allow(missing_docs)]
mod error;
pub mod paths;
mod source;
mod tree;

pub use error::*;
pub use source::{
    convert_value, join_path, path_segments, ConfigSource, ConfigSourceExt, ConfigValue,
};
pub use tree::ConfigTree;
