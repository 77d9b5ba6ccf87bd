use cadmod_descriptor::{
    parse_document, Axis, DescriptorKind, FeatureOperation, ModificationDescriptor,
    ValidationError,
};
use proptest::prelude::*;
use serde_json::json;

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_-]{0,12}"
}

fn axis() -> impl Strategy<Value = Axis> {
    prop_oneof![Just(Axis::X), Just(Axis::Y), Just(Axis::Z)]
}

/// Quarter steps keep the JSON text exact so parsed values compare equal
fn quantity(lo: i32, hi: i32) -> impl Strategy<Value = f64> {
    (lo..hi).prop_map(|n| f64::from(n) / 4.0)
}

fn document(entries: Vec<serde_json::Value>) -> String {
    json!({ "modifications": entries }).to_string()
}

proptest! {
    #[test]
    fn prop_dimension_roundtrips_fields(
        feature in name(),
        dim in name(),
        new_value in quantity(-400_000, 400_000),
        current in proptest::option::of(quantity(-400_000, 400_000)),
    ) {
        let dimension = format!("{dim}@{feature}");
        let mut entry = json!({
            "type": "dimension",
            "feature": feature,
            "dimension": dimension,
            "newValue": new_value,
        });
        if let Some(current) = current {
            entry["currentValue"] = json!(current);
        }

        let report = parse_document(&document(vec![entry]));
        prop_assert!(report.is_valid());
        prop_assert_eq!(report.descriptors.len(), 1);
        match &report.descriptors[0] {
            ModificationDescriptor::Dimension(change) => {
                prop_assert_eq!(&change.target.feature, &feature);
                prop_assert_eq!(&change.target.dimension, &dimension);
                prop_assert_eq!(change.new_value, new_value);
                prop_assert_eq!(change.current_value, current);
            }
            other => prop_assert!(false, "unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn prop_material_roundtrips_fields(component in name(), material in name()) {
        let report = parse_document(&document(vec![json!({
            "type": "material",
            "component": component,
            "newMaterial": material,
        })]));
        prop_assert!(report.is_valid());
        match &report.descriptors[0] {
            ModificationDescriptor::Material(change) => {
                prop_assert_eq!(&change.component, &component);
                prop_assert_eq!(&change.new_material, &material);
            }
            other => prop_assert!(false, "unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn prop_feature_roundtrips_fields(
        op in prop_oneof![Just("chamfer"), Just("fillet"), Just("hole")],
        edges in proptest::collection::vec(name(), 1..5),
        value in proptest::option::of(quantity(1, 200)),
    ) {
        let mut entry = json!({"type": "feature", "operation": op, "edges": edges});
        if let Some(value) = value {
            entry["value"] = json!(value);
        }
        let report = parse_document(&document(vec![entry]));
        prop_assert!(report.is_valid());
        match &report.descriptors[0] {
            ModificationDescriptor::Feature(change) => {
                prop_assert_eq!(&change.operation, &FeatureOperation::from(op));
                prop_assert_eq!(&change.target_refs, &edges);
                prop_assert_eq!(change.value, value);
            }
            other => prop_assert!(false, "unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn prop_scale_roundtrips_fields(axis in axis(), size in quantity(1, 400_000)) {
        let report = parse_document(&document(vec![json!({
            "type": "scale",
            "axis": axis.to_string(),
            "targetSize": size,
        })]));
        prop_assert!(report.is_valid());
        match &report.descriptors[0] {
            ModificationDescriptor::Scale(change) => {
                prop_assert_eq!(change.axis, axis);
                prop_assert_eq!(change.target_size, size);
            }
            other => prop_assert!(false, "unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn prop_unknown_type_always_rejected(kind in "[a-z]{3,10}") {
        prop_assume!(kind.parse::<DescriptorKind>().is_err());
        let report = parse_document(&document(vec![json!({"type": kind, "feature": "F"})]));
        prop_assert!(report.descriptors.is_empty());
        prop_assert_eq!(report.errors.len(), 1);
        let is_unknown = matches!(report.errors[0], ValidationError::UnknownType { index: 0, .. });
        prop_assert!(is_unknown);
    }

    #[test]
    fn prop_one_valid_one_malformed(
        size in quantity(4, 2_000),
        malformed_first in any::<bool>(),
    ) {
        let valid = json!({"type": "scale", "axis": "X", "targetSize": size});
        let malformed = json!({"type": "dimension", "feature": "Sketch1"});
        let entries = if malformed_first {
            vec![malformed, valid]
        } else {
            vec![valid, malformed]
        };

        let report = parse_document(&document(entries));
        prop_assert_eq!(report.errors.len(), 1);
        prop_assert_eq!(report.descriptors.len(), 1);
        prop_assert!(!report.is_valid());
    }
}
