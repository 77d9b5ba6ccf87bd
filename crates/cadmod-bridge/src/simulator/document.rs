//! File format of simulated CAD documents
//!
//! An assembly is a JSON file listing its components, features, dimensions
//! and the relative paths of every file it references. Referenced files that
//! are themselves documents are followed when bundling.

use cadmod_descriptor::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{BridgeError, BridgeResult};

fn default_units() -> String {
    "mm".to_string()
}

/// One dimension owned by a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionNode {
    /// Full name, e.g. `D1@Sketch3`
    pub name: String,
    /// Current value
    pub value: f64,
    /// Units label
    #[serde(default = "default_units")]
    pub units: String,
    /// Axis tag used by proportional scaling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
}

impl DimensionNode {
    /// Does `name` address this dimension, either fully or by its short form
    #[must_use]
    pub fn matches(&self, name: &str, feature: &str) -> bool {
        self.name == name || (!name.contains('@') && self.name == format!("{name}@{feature}"))
    }
}

/// One feature in the feature tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNode {
    /// Feature name, e.g. `Sketch3` or `Chamfer1`
    pub name: String,
    /// Feature type label
    #[serde(default)]
    pub kind: String,
    /// Dimensions owned by the feature
    #[serde(default)]
    pub dimensions: Vec<DimensionNode>,
    /// Geometry references the feature was built on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl FeatureNode {
    /// Find a dimension by full or short name
    #[must_use]
    pub fn dimension_mut(&mut self, name: &str) -> Option<&mut DimensionNode> {
        let feature = self.name.clone();
        self.dimensions.iter_mut().find(|d| d.matches(name, &feature))
    }
}

/// One component instance in the assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Instance name, e.g. `Base-1`
    pub name: String,
    /// Material name; empty when unassigned
    #[serde(default)]
    pub material: String,
    /// Part file backing this component, relative to the assembly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Feature tree of the component
    #[serde(default)]
    pub features: Vec<FeatureNode>,
    /// Times this component was rebuilt since the document was opened
    #[serde(skip)]
    pub rebuilds: u32,
}

/// An assembly (or part) document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyDocument {
    /// Document title
    pub name: String,
    /// Default units for dimensions without their own label
    #[serde(default = "default_units")]
    pub units: String,
    /// Top-level features (assembly features and inserted features)
    #[serde(default)]
    pub features: Vec<FeatureNode>,
    /// Component instances
    #[serde(default)]
    pub components: Vec<ComponentNode>,
    /// Selectable edge/face references
    #[serde(default)]
    pub geometry: Vec<String>,
    /// Files referenced by this document, relative to it
    #[serde(default)]
    pub references: Vec<String>,
    /// Free-form document properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl AssemblyDocument {
    /// Empty document with a title
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: default_units(),
            features: Vec::new(),
            components: Vec::new(),
            geometry: Vec::new(),
            references: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// - `BridgeError::DocumentNotFound` if the file does not exist
    /// - `BridgeError::OpenFailed` if it is not a valid document
    pub fn load(path: &Path) -> BridgeResult<Self> {
        if !path.exists() {
            return Err(BridgeError::DocumentNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|e| BridgeError::io_error(path, e))?;
        serde_json::from_str(&text).map_err(|e| BridgeError::open_failed(path, e.to_string()))
    }

    /// Write as pretty JSON
    ///
    /// # Errors
    /// `BridgeError::SaveFailed` if serialization or the write fails
    pub fn store(&self, path: &Path) -> BridgeResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| BridgeError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text).map_err(|e| BridgeError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Find a feature by name anywhere in the document
    pub fn feature_mut(&mut self, name: &str) -> Option<&mut FeatureNode> {
        if let Some(idx) = self.features.iter().position(|f| f.name == name) {
            return self.features.get_mut(idx);
        }
        self.components
            .iter_mut()
            .flat_map(|c| c.features.iter_mut())
            .find(|f| f.name == name)
    }

    /// Find a component by instance name
    pub fn component_mut(&mut self, name: &str) -> Option<&mut ComponentNode> {
        self.components.iter_mut().find(|c| c.name == name)
    }

    /// Is `reference` a selectable entity of this document
    #[must_use]
    pub fn has_reference(&self, reference: &str) -> bool {
        self.geometry.iter().any(|g| g == reference)
            || self.components.iter().any(|c| c.name == reference)
            || self
                .features
                .iter()
                .chain(self.components.iter().flat_map(|c| c.features.iter()))
                .any(|f| f.name == reference)
    }

    /// Next free feature name for a kind, e.g. `Fillet3`
    #[must_use]
    pub fn next_feature_name(&self, base: &str) -> String {
        let existing: Vec<&str> = self
            .features
            .iter()
            .chain(self.components.iter().flat_map(|c| c.features.iter()))
            .map(|f| f.name.as_str())
            .collect();
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !existing.contains(&candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }
}
