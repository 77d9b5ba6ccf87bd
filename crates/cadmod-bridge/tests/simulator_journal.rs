//! Call ordering and boxed-bridge behaviour of the simulator

use cadmod_bridge::{
    AssemblyDocument, BridgeCall, CadBridge, ComponentNode, DimensionNode, FeatureNode,
    FeatureSpec, SimulatedCad,
};
use cadmod_descriptor::{Axis, DimensionRef};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn assembly(dir: &Path) -> PathBuf {
    let mut asm = AssemblyDocument::new("Housing");
    asm.geometry = vec!["Edge1".into(), "Edge2".into(), "Face1".into()];
    asm.components.push(ComponentNode {
        name: "Shell-1".into(),
        material: String::new(),
        file: None,
        features: vec![FeatureNode {
            name: "Boss1".into(),
            kind: "extrude".into(),
            dimensions: vec![DimensionNode {
                name: "D1@Boss1".into(),
                value: 40.0,
                units: "mm".into(),
                axis: Some(Axis::Z),
            }],
            references: Vec::new(),
        }],
        rebuilds: 0,
    });
    let path = dir.join("Housing.json");
    asm.store(&path).expect("store");
    path
}

#[test]
fn boxed_bridge_forwards_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = assembly(dir.path());
    let mut cad: Box<dyn CadBridge> = Box::new(SimulatedCad::new());

    let session = cad.open_document(&path).expect("open");
    let old = cad
        .set_component_dimension(&session, "Shell-1", "D1@Boss1", 50.0)
        .expect("set");
    assert_eq!(old, 40.0);
    assert!(cad.is_dirty(&session).expect("dirty"));
    cad.save(&session).expect("save");
    assert!(!cad.is_dirty(&session).expect("dirty"));

    let reloaded = AssemblyDocument::load(&path).expect("reload");
    assert_eq!(reloaded.components[0].features[0].dimensions[0].value, 50.0);
}

#[test]
fn journal_records_selection_before_insert() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = assembly(dir.path());
    let mut cad = SimulatedCad::new();
    let session = cad.open_document(&path).expect("open");

    cad.clear_selection(&session).expect("clear");
    cad.select(&session, &["Edge1".to_string(), "Edge2".to_string()])
        .expect("select");
    let name = cad
        .insert_feature(
            &session,
            &FeatureSpec::Chamfer {
                distance: 2.0,
                angle_deg: 45.0,
            },
        )
        .expect("insert");
    assert_eq!(name, "Chamfer1");

    assert_eq!(
        &cad.journal()[1..],
        &[
            BridgeCall::ClearSelection,
            BridgeCall::Select(vec!["Edge1".into(), "Edge2".into()]),
            BridgeCall::InsertFeature("Chamfer1".into()),
        ]
    );

    // Inserted dimensions are addressable like any other
    let angle = cad
        .dimension(&session, &DimensionRef::new("Chamfer1", "D2@Chamfer1"))
        .expect("angle");
    assert_eq!(angle.value, 45.0);
    assert_eq!(angle.units, "deg");
}

#[test]
fn chamfer_angle_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = assembly(dir.path());
    let mut cad = SimulatedCad::new();
    let session = cad.open_document(&path).expect("open");
    cad.select(&session, &["Edge1".to_string()]).expect("select");

    let err = cad
        .insert_feature(
            &session,
            &FeatureSpec::Chamfer {
                distance: 1.0,
                angle_deg: 95.0,
            },
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("Chamfer rejected"));
    assert!(!cad.is_dirty(&session).expect("dirty"));
}
