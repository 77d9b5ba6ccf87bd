//! cadmod Core
//!
//! The modification-execution pipeline:
//! - [`Dispatcher`]: applies validated descriptors through a CAD bridge
//! - [`RollbackLedger`]: first-write-wins originals and ordered results
//! - [`MaterialResolver`]: canonical material names from database files
//! - [`ChangeRunner`]: async, one-run-at-a-time orchestration with commit and discard
//!
//! # Example
//!
//! ```rust,no_run
//! use cadmod_bridge::SimulatedCad;
//! use cadmod_core::{ChangeRunner, RunConfig};
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), cadmod_core::RunError> {
//! let runner = ChangeRunner::new(SimulatedCad::new(), RunConfig::default());
//! let report = runner
//!     .run(
//!         Path::new("Bracket.json"),
//!         r#"{"modifications":[{"type":"dimension","feature":"Sketch3","dimension":"D1@Sketch3","newValue":12}]}"#,
//!         |update| println!("{:.0}% {}", update.fraction * 100.0, update.status.feature_name),
//!     )
//!     .await?;
//! println!("{}", report.summary);
//! runner.commit().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cancel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod materials;
pub mod outcome;
pub mod runner;

pub use cancel::CancelToken;
pub use config::{FeatureDefaults, RunConfig};
pub use dispatcher::{BatchOutcome, Dispatcher, ScaleLogLine};
pub use error::{ConfigError, DescriptorExecutionError, RunError, SessionError};
pub use ledger::{OriginalValue, RollbackEntry, RollbackKey, RollbackKind, RollbackLedger, RunSummary};
pub use materials::MaterialResolver;
pub use outcome::{
    format_value, FeatureProcessingStatus, ModificationResult, ProcessingState, ProgressUpdate,
};
pub use runner::{ChangeRunner, CommitReport, RunReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
