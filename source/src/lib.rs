//! Builds typed, addressable trees of source units (files, directories,
//! archive members, network resources and byte ranges inside any of these)
//! ahead of any format-specific parsing.
//!
//! Everything is constructed through a [SourceFactory], which hands every
//! new node to a [persist::SourcePersister] exactly once before returning it.

mod config;
mod errors;
mod id;

pub mod factory;
pub mod fixtures;
pub mod input;
pub mod persist;
pub mod resource;
pub mod source;
pub mod temp;

pub use config::InvocationConfig;
pub use errors::{ConstructionError, Error};
pub use factory::SourceFactory;
pub use id::SourceId;
pub use source::{Aggregate, Child, Identity, Measurable, Named, Source, SourceKind, Unit};

#[cfg(test)]
mod tests;

// rstest_reuse templates resolve the crate through `$crate::rstest_reuse`.
#[cfg(test)]
#[allow(clippy::single_component_path_imports)]
use rstest_reuse;
