//! The CAD bridge trait
//!
//! A thin synchronous facade over an external automation surface. Calls are
//! blocking and the surface is not assumed reentrant: callers serialize every
//! call for one run onto a single execution context.
//!
//! Contract every implementation honors:
//! - Feature insertion acts on the current selection; callers clear and
//!   re-select before each mutating call
//! - A successful mutation marks the document dirty
//! - Rebuilds are explicit; the caller decides when to force one

use crate::error::BridgeResult;
use crate::session::Session;
use cadmod_descriptor::{Axis, DimensionRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A dimension value together with the units the surface reports it in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionReading {
    /// Numeric value
    pub value: f64,
    /// Units label, e.g. `mm`
    pub units: String,
}

/// One dimension found while enumerating a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSample {
    /// Component (or assembly) owning the dimension
    pub component: String,
    /// Full dimension name
    pub dimension: String,
    /// Current value
    pub value: f64,
    /// Axis tag, when the dimension has one
    pub axis: Option<Axis>,
}

/// Material to assign, optionally resolved against a material database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialAssignment {
    /// Material name as it will be written
    pub name: String,
    /// Database file the name was resolved in, if any
    pub database: Option<PathBuf>,
}

impl MaterialAssignment {
    /// Assignment using the name as given, without a database
    #[inline]
    #[must_use]
    pub fn raw(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
        }
    }
}

/// Fully parameterized feature to insert on the current selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureSpec {
    /// Distance-angle chamfer
    Chamfer {
        /// Setback distance
        distance: f64,
        /// Angle in degrees
        angle_deg: f64,
    },
    /// Constant-radius fillet
    Fillet {
        /// Fillet radius
        radius: f64,
    },
    /// Blind simple hole
    Hole {
        /// Hole diameter
        diameter: f64,
        /// Hole depth
        depth: f64,
    },
}

impl FeatureSpec {
    /// Base name the surface uses for features of this kind
    #[inline]
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Chamfer { .. } => "Chamfer",
            Self::Fillet { .. } => "Fillet",
            Self::Hole { .. } => "Hole",
        }
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chamfer {
                distance,
                angle_deg,
            } => write!(f, "Chamfer {distance} x {angle_deg}°"),
            Self::Fillet { radius } => write!(f, "Fillet R{radius}"),
            Self::Hole { diameter, depth } => write!(f, "Hole Ø{diameter} x {depth}"),
        }
    }
}

/// Synchronous facade over the CAD automation surface
///
/// Implementations must be `Send` so a run can move its bridge onto a
/// dedicated blocking worker.
pub trait CadBridge: Send {
    /// Open a document and return a handle to it
    fn open_document(&mut self, path: &Path) -> BridgeResult<Session>;

    /// Close every open document without saving; returns how many were closed
    fn close_all(&mut self) -> usize;

    /// Clear any active selection
    fn clear_selection(&mut self, session: &Session) -> BridgeResult<()>;

    /// Add references to the selection; fails on the first unresolved one
    fn select(&mut self, session: &Session, refs: &[String]) -> BridgeResult<()>;

    /// Read one dimension
    fn dimension(&mut self, session: &Session, target: &DimensionRef) -> BridgeResult<DimensionReading>;

    /// Write one dimension; returns the value it replaced
    fn set_dimension(
        &mut self,
        session: &Session,
        target: &DimensionRef,
        value: f64,
    ) -> BridgeResult<DimensionReading>;

    /// Read a component's material name (empty when none assigned)
    fn material(&mut self, session: &Session, component: &str) -> BridgeResult<String>;

    /// Assign a material; returns the material it replaced
    fn set_material(
        &mut self,
        session: &Session,
        component: &str,
        material: &MaterialAssignment,
    ) -> BridgeResult<String>;

    /// Insert a feature on the current selection; returns the new feature's name
    fn insert_feature(&mut self, session: &Session, spec: &FeatureSpec) -> BridgeResult<String>;

    /// Component names in assembly order
    fn components(&mut self, session: &Session) -> BridgeResult<Vec<String>>;

    /// Enumerate dimensions across every component, optionally only one axis
    fn list_dimensions(
        &mut self,
        session: &Session,
        axis: Option<Axis>,
    ) -> BridgeResult<Vec<DimensionSample>>;

    /// Write a dimension addressed by component; returns the value it replaced
    fn set_component_dimension(
        &mut self,
        session: &Session,
        component: &str,
        dimension: &str,
        value: f64,
    ) -> BridgeResult<f64>;

    /// Rebuild one component
    fn rebuild_component(&mut self, session: &Session, component: &str) -> BridgeResult<()>;

    /// Rebuild the whole document; `force` rebuilds every feature
    fn rebuild(&mut self, session: &Session, force: bool) -> BridgeResult<()>;

    /// True when the document has unsaved changes
    fn is_dirty(&self, session: &Session) -> BridgeResult<bool>;

    /// Save the document in place
    fn save(&mut self, session: &Session) -> BridgeResult<()>;

    /// Copy the document and every file it references into `destination`
    ///
    /// Returns the paths written, document first.
    fn pack_and_go(&mut self, session: &Session, destination: &Path) -> BridgeResult<Vec<PathBuf>>;
}

impl<B: CadBridge + ?Sized> CadBridge for Box<B> {
    fn open_document(&mut self, path: &Path) -> BridgeResult<Session> {
        (**self).open_document(path)
    }

    fn close_all(&mut self) -> usize {
        (**self).close_all()
    }

    fn clear_selection(&mut self, session: &Session) -> BridgeResult<()> {
        (**self).clear_selection(session)
    }

    fn select(&mut self, session: &Session, refs: &[String]) -> BridgeResult<()> {
        (**self).select(session, refs)
    }

    fn dimension(&mut self, session: &Session, target: &DimensionRef) -> BridgeResult<DimensionReading> {
        (**self).dimension(session, target)
    }

    fn set_dimension(
        &mut self,
        session: &Session,
        target: &DimensionRef,
        value: f64,
    ) -> BridgeResult<DimensionReading> {
        (**self).set_dimension(session, target, value)
    }

    fn material(&mut self, session: &Session, component: &str) -> BridgeResult<String> {
        (**self).material(session, component)
    }

    fn set_material(
        &mut self,
        session: &Session,
        component: &str,
        material: &MaterialAssignment,
    ) -> BridgeResult<String> {
        (**self).set_material(session, component, material)
    }

    fn insert_feature(&mut self, session: &Session, spec: &FeatureSpec) -> BridgeResult<String> {
        (**self).insert_feature(session, spec)
    }

    fn components(&mut self, session: &Session) -> BridgeResult<Vec<String>> {
        (**self).components(session)
    }

    fn list_dimensions(
        &mut self,
        session: &Session,
        axis: Option<Axis>,
    ) -> BridgeResult<Vec<DimensionSample>> {
        (**self).list_dimensions(session, axis)
    }

    fn set_component_dimension(
        &mut self,
        session: &Session,
        component: &str,
        dimension: &str,
        value: f64,
    ) -> BridgeResult<f64> {
        (**self).set_component_dimension(session, component, dimension, value)
    }

    fn rebuild_component(&mut self, session: &Session, component: &str) -> BridgeResult<()> {
        (**self).rebuild_component(session, component)
    }

    fn rebuild(&mut self, session: &Session, force: bool) -> BridgeResult<()> {
        (**self).rebuild(session, force)
    }

    fn is_dirty(&self, session: &Session) -> BridgeResult<bool> {
        (**self).is_dirty(session)
    }

    fn save(&mut self, session: &Session) -> BridgeResult<()> {
        (**self).save(session)
    }

    fn pack_and_go(&mut self, session: &Session, destination: &Path) -> BridgeResult<Vec<PathBuf>> {
        (**self).pack_and_go(session, destination)
    }
}
