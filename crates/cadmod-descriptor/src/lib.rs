//! cadmod Descriptors
//!
//! Typed engineering-change instructions and the validator that produces them
//! from a JSON modification document.
//!
//! # Example
//!
//! ```rust
//! use cadmod_descriptor::{parse_document, ModificationDescriptor};
//!
//! let report = parse_document(
//!     r#"{"modifications":[{"type":"scale","axis":"X","targetSize":250}]}"#,
//! );
//! assert!(report.is_valid());
//! assert!(matches!(report.descriptors[0], ModificationDescriptor::Scale(_)));
//! ```
//!
//! Validation never touches the CAD surface and never aborts on a single bad
//! entry: each malformed instruction contributes one error and is dropped.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod model;
pub mod parser;

pub use error::ValidationError;
pub use model::{
    Axis, DescriptorKind, DimensionChange, DimensionRef, FeatureChange, FeatureOperation,
    FeatureParameters, MaterialChange, ModificationDescriptor, ParamValue, ScaleChange,
};
pub use parser::{parse_document, validate_document, validate_entry, ValidationReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
