//! Testing utilities for cadmod workspace
//!
//! Shared fixtures, modification-document builders and filesystem doubles.

#![allow(missing_docs)]

pub mod fixtures;
pub mod fs;

pub use fixtures::{
    bracket_assembly, dimension_entry, feature_entry, material_database, material_entry,
    modification_document, scale_entry, split_bracket_assembly,
};
pub use fs::{FlakyFs, LockAwareFs};
