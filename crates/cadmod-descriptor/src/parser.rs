//! Modification document parser and validator
//!
//! Uses serde_json for the syntax layer, then walks the value by hand so that
//! every malformed entry produces its own error while the well-formed entries
//! around it still come through.

use crate::error::ValidationError;
use crate::model::{
    Axis, DescriptorKind, DimensionChange, DimensionRef, FeatureChange, FeatureOperation,
    FeatureParameters, MaterialChange, ModificationDescriptor, ParamValue, ScaleChange,
};
use serde_json::{Map, Value};

/// Outcome of validating one modification document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Every problem found, in document order
    pub errors: Vec<ValidationError>,
    /// Every entry that validated, in document order
    pub descriptors: Vec<ModificationDescriptor>,
}

impl ValidationReport {
    /// True when nothing was rejected and at least one descriptor was produced
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && !self.descriptors.is_empty()
    }

    /// Human-readable error strings
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    fn document_error(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
            descriptors: Vec::new(),
        }
    }
}

/// Parse a JSON string and validate it
///
/// A syntax error yields a report holding exactly that error.
#[must_use]
pub fn parse_document(json: &str) -> ValidationReport {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => validate_document(&value),
        Err(e) => ValidationReport::document_error(ValidationError::Syntax(e.to_string())),
    }
}

/// Validate an already-parsed JSON document
#[must_use]
pub fn validate_document(document: &Value) -> ValidationReport {
    let Some(root) = document.as_object() else {
        return ValidationReport::document_error(ValidationError::NotAnObject);
    };

    let entries = match root.get("modifications") {
        None => return ValidationReport::document_error(ValidationError::MissingModifications),
        Some(Value::Array(entries)) => entries,
        Some(_) => return ValidationReport::document_error(ValidationError::ModificationsNotArray),
    };

    let mut report = ValidationReport::default();
    for (index, entry) in entries.iter().enumerate() {
        match validate_entry(index, entry) {
            Ok(descriptor) => report.descriptors.push(descriptor),
            Err(error) => {
                tracing::debug!("Rejected modification #{}: {}", index, error);
                report.errors.push(error);
            }
        }
    }

    if entries.is_empty() {
        report.errors.push(ValidationError::Empty);
    }

    tracing::debug!(
        "Validated {} modification(s): {} accepted, {} error(s)",
        entries.len(),
        report.descriptors.len(),
        report.errors.len()
    );
    report
}

/// Validate one entry of the `modifications` array
///
/// # Errors
/// The first problem found in the entry; later problems in the same entry are
/// not reported since the entry is dropped either way.
pub fn validate_entry(index: usize, entry: &Value) -> Result<ModificationDescriptor, ValidationError> {
    let obj = entry
        .as_object()
        .ok_or(ValidationError::EntryNotObject { index })?;

    let kind_str = match obj.get("type") {
        None | Some(Value::Null) => return Err(ValidationError::MissingType { index }),
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(ValidationError::invalid(index, "type", "a string")),
    };

    let kind: DescriptorKind = kind_str
        .parse()
        .map_err(|kind| ValidationError::UnknownType { index, kind })?;

    let fields = Fields { index, kind, obj };
    match kind {
        DescriptorKind::Dimension => fields.dimension().map(Into::into),
        DescriptorKind::Material => fields.material().map(Into::into),
        DescriptorKind::Feature => fields.feature().map(Into::into),
        DescriptorKind::Scale => fields.scale().map(Into::into),
    }
}

/// Field accessors for one entry, carrying the context errors need
struct Fields<'a> {
    index: usize,
    kind: DescriptorKind,
    obj: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn present(&self, key: &str) -> Option<&'a Value> {
        self.obj.get(key).filter(|v| !v.is_null())
    }

    fn required_str(&self, key: &'static str) -> Result<String, ValidationError> {
        let value = self
            .present(key)
            .ok_or_else(|| ValidationError::missing(self.index, self.kind, key))?;
        non_empty_str(value).ok_or_else(|| ValidationError::invalid(self.index, key, "a non-empty string"))
    }

    /// First present key among `keys`; errors name the first key
    fn required_str_alias(&self, keys: &[&'static str]) -> Result<String, ValidationError> {
        for &key in keys {
            if let Some(value) = self.present(key) {
                return non_empty_str(value)
                    .ok_or_else(|| ValidationError::invalid(self.index, key, "a non-empty string"));
            }
        }
        Err(ValidationError::missing(self.index, self.kind, keys[0]))
    }

    fn optional_str(&self, key: &'static str) -> Result<Option<String>, ValidationError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ValidationError::invalid(self.index, key, "a string")),
        }
    }

    fn required_number(&self, key: &'static str) -> Result<f64, ValidationError> {
        let value = self
            .present(key)
            .ok_or_else(|| ValidationError::missing(self.index, self.kind, key))?;
        finite_number(value).ok_or_else(|| ValidationError::invalid(self.index, key, "a number"))
    }

    fn optional_number(&self, key: &'static str) -> Result<Option<f64>, ValidationError> {
        self.present(key)
            .map(|value| {
                finite_number(value).ok_or_else(|| ValidationError::invalid(self.index, key, "a number"))
            })
            .transpose()
    }

    fn dimension(&self) -> Result<DimensionChange, ValidationError> {
        let feature = self.required_str("feature")?;
        let dimension = self.required_str("dimension")?;
        let new_value = self.required_number("newValue")?;
        let current_value = self.optional_number("currentValue")?;
        let units = self.optional_str("units")?;

        Ok(DimensionChange {
            target: DimensionRef::new(feature, dimension),
            current_value,
            new_value,
            units,
        })
    }

    fn material(&self) -> Result<MaterialChange, ValidationError> {
        let component = self.required_str_alias(&["component", "feature"])?;
        let new_material = self.required_str_alias(&["newMaterial", "newValue"])?;
        let current_material = self.optional_str("currentMaterial")?;

        Ok(MaterialChange {
            component,
            current_material,
            new_material,
        })
    }

    fn feature(&self) -> Result<FeatureChange, ValidationError> {
        let operation = FeatureOperation::from(self.required_str("operation")?.as_str());

        let edges = self
            .present("edges")
            .ok_or_else(|| ValidationError::missing(self.index, self.kind, "edges"))?;
        let target_refs = string_array(edges)
            .ok_or_else(|| ValidationError::invalid(self.index, "edges", "an array of strings"))?;
        if target_refs.is_empty() {
            return Err(ValidationError::invalid(
                self.index,
                "edges",
                "a non-empty array of strings",
            ));
        }

        let value = self.optional_number("value")?;

        let parameters = match self.present("parameters") {
            None => FeatureParameters::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), ParamValue::from(v)))
                .collect(),
            Some(_) => return Err(ValidationError::invalid(self.index, "parameters", "an object")),
        };

        Ok(FeatureChange {
            operation,
            target_refs,
            value,
            parameters,
        })
    }

    fn scale(&self) -> Result<ScaleChange, ValidationError> {
        let axis_str = self.required_str("axis")?;
        let axis: Axis = axis_str
            .parse()
            .map_err(|_| ValidationError::invalid(self.index, "axis", "one of X, Y, Z"))?;

        let target_size = self.required_number("targetSize")?;
        if target_size <= 0.0 {
            return Err(ValidationError::invalid(
                self.index,
                "targetSize",
                "a positive number",
            ));
        }

        Ok(ScaleChange { axis, target_size })
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(ToString::to_string))
        .collect()
}
