//! cadmod Bridge
//!
//! Synchronous facade over a CAD automation surface:
//! - [`CadBridge`]: every call the change engine makes, addressed by an explicit [`Session`]
//! - [`BridgeError`]: failures the surface can report, with classifiers
//! - [`SimulatedCad`]: file-backed implementation for tests and offline runs
//!
//! The surface is blocking and not reentrant. Callers own one bridge per run
//! and never share it across threads concurrently.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bridge;
pub mod error;
pub mod session;
pub mod simulator;

pub use bridge::{CadBridge, DimensionReading, DimensionSample, FeatureSpec, MaterialAssignment};
pub use error::{BridgeError, BridgeResult};
pub use session::{Session, SessionId};
pub use simulator::document::{AssemblyDocument, ComponentNode, DimensionNode, FeatureNode};
pub use simulator::{BridgeCall, FailurePoint, FileLocks, SimulatedCad};
