//! Descriptor model
//!
//! In-memory form of one engineering-change instruction:
//! - `Dimension`: set a named dimension under a named feature
//! - `Material`: assign a material to a component
//! - `Feature`: insert a chamfer, fillet or hole on referenced geometry
//! - `Scale`: proportionally resize every dimension on one axis

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The four instruction kinds accepted in a modification document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    /// Dimension value change
    Dimension,
    /// Material assignment
    Material,
    /// Feature insertion
    Feature,
    /// Axis-proportional scale
    Scale,
}

impl DescriptorKind {
    /// The `type` string used in the JSON document
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dimension => "dimension",
            Self::Material => "material",
            Self::Feature => "feature",
            Self::Scale => "scale",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dimension" => Ok(Self::Dimension),
            "material" => Ok(Self::Material),
            "feature" => Ok(Self::Feature),
            "scale" => Ok(Self::Scale),
            _ => Err(s.to_string()),
        }
    }
}

/// Model axis a dimension is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Axis {
    /// All axes in canonical order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
            Axis::Z => f.write_str("Z"),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Axis::X),
            "Y" | "y" => Ok(Axis::Y),
            "Z" | "z" => Ok(Axis::Z),
            other => Err(other.to_string()),
        }
    }
}

/// Reference to one dimension owned by one feature, e.g. `D1@Sketch3` under `Sketch3`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionRef {
    /// Owning feature name
    pub feature: String,
    /// Dimension name as the CAD surface reports it
    pub dimension: String,
}

impl DimensionRef {
    /// Create a new reference
    #[inline]
    #[must_use]
    pub fn new(feature: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            dimension: dimension.into(),
        }
    }
}

impl fmt::Display for DimensionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.dimension, self.feature)
    }
}

/// Recursively decoded feature parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// JSON null
    Null,
    /// Boolean flag
    Bool(bool),
    /// Any JSON number
    Number(f64),
    /// String value
    Text(String),
    /// Ordered list
    List(Vec<ParamValue>),
    /// Nested object
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Numeric view, if this is a number
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String view, if this is text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view, if this is a flag
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&serde_json::Value> for ParamValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            // serde_json numbers without arbitrary precision always fit f64
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Named parameters attached to a feature instruction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureParameters(BTreeMap<String, ParamValue>);

impl FeatureParameters {
    /// Empty parameter set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Raw parameter lookup
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Numeric parameter lookup, ignoring values of other shapes
    #[inline]
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ParamValue::as_f64)
    }

    /// Text parameter lookup
    #[inline]
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_str)
    }

    /// Number of parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameter is present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, ParamValue)> for FeatureParameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Feature operation requested by a `feature` instruction
///
/// Unknown operations are kept rather than rejected at validation time so the
/// dispatcher can report them as a failed result naming the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureOperation {
    /// Edge chamfer
    Chamfer,
    /// Edge fillet
    Fillet,
    /// Simple hole
    Hole,
    /// Operation this system does not implement
    Unrecognized(String),
}

impl FeatureOperation {
    /// Operation name as written in the document
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Chamfer => "chamfer",
            Self::Fillet => "fillet",
            Self::Hole => "hole",
            Self::Unrecognized(name) => name,
        }
    }
}

impl From<&str> for FeatureOperation {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "chamfer" => Self::Chamfer,
            "fillet" => Self::Fillet,
            "hole" => Self::Hole,
            _ => Self::Unrecognized(s.trim().to_string()),
        }
    }
}

impl fmt::Display for FeatureOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Change the value of one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionChange {
    /// Dimension to change
    pub target: DimensionRef,
    /// Value the author believed was current (informational)
    pub current_value: Option<f64>,
    /// Value to write
    pub new_value: f64,
    /// Units the author used (informational)
    pub units: Option<String>,
}

/// Assign a material to one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialChange {
    /// Component (or part feature) receiving the material
    pub component: String,
    /// Material the author believed was current (informational)
    pub current_material: Option<String>,
    /// Material to assign
    pub new_material: String,
}

/// Insert a feature on referenced geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureChange {
    /// Operation to perform
    pub operation: FeatureOperation,
    /// Edge/face references to select before inserting
    pub target_refs: Vec<String>,
    /// Primary size (chamfer distance, fillet radius, hole diameter)
    pub value: Option<f64>,
    /// Operation-specific parameters
    pub parameters: FeatureParameters,
}

/// Proportionally resize all dimensions along one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleChange {
    /// Axis whose dimensions are rescaled
    pub axis: Axis,
    /// Desired largest dimension on that axis
    pub target_size: f64,
}

/// One validated modification instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModificationDescriptor {
    /// Dimension value change
    Dimension(DimensionChange),
    /// Material assignment
    Material(MaterialChange),
    /// Feature insertion
    Feature(FeatureChange),
    /// Axis-proportional scale
    Scale(ScaleChange),
}

impl ModificationDescriptor {
    /// Kind of this descriptor
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Dimension(_) => DescriptorKind::Dimension,
            Self::Material(_) => DescriptorKind::Material,
            Self::Feature(_) => DescriptorKind::Feature,
            Self::Scale(_) => DescriptorKind::Scale,
        }
    }

    /// Name used to identify this descriptor in progress updates and results
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Dimension(change) => change.target.dimension.clone(),
            Self::Material(change) => change.component.clone(),
            Self::Feature(change) if change.target_refs.is_empty() => {
                change.operation.name().to_string()
            }
            Self::Feature(change) => {
                format!("{}({})", change.operation, change.target_refs.join(", "))
            }
            Self::Scale(change) => format!("Scale {}", change.axis),
        }
    }
}

impl From<DimensionChange> for ModificationDescriptor {
    fn from(change: DimensionChange) -> Self {
        Self::Dimension(change)
    }
}

impl From<MaterialChange> for ModificationDescriptor {
    fn from(change: MaterialChange) -> Self {
        Self::Material(change)
    }
}

impl From<FeatureChange> for ModificationDescriptor {
    fn from(change: FeatureChange) -> Self {
        Self::Feature(change)
    }
}

impl From<ScaleChange> for ModificationDescriptor {
    fn from(change: ScaleChange) -> Self {
        Self::Scale(change)
    }
}
