//! Sample assemblies and modification documents

use cadmod_bridge::{AssemblyDocument, ComponentNode, DimensionNode, FeatureNode};
use cadmod_descriptor::Axis;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn dimension(name: &str, value: f64, axis: Option<Axis>) -> DimensionNode {
    DimensionNode {
        name: name.to_string(),
        value,
        units: "mm".to_string(),
        axis,
    }
}

fn feature(name: &str, kind: &str, dimensions: Vec<DimensionNode>) -> FeatureNode {
    FeatureNode {
        name: name.to_string(),
        kind: kind.to_string(),
        dimensions,
        references: Vec::new(),
    }
}

/// Write the `Bracket` assembly into `dir` and return its path
///
/// - `Base-1` (AISI 1020): `D1@Sketch3` = 10 (X), `D2@Sketch3` = 4 (Y), `D1@Extrude1` = 100 (X)
/// - `Cover-1` (no material): `D1@Sketch1` = 50 (X), `D2@Sketch1` = 30 (Y)
/// - Selectable geometry `Edge1`..`Edge4`, `Face1`
/// - References `Base.json` and `Cover.json`, both written alongside
pub fn bracket_assembly(dir: &Path) -> PathBuf {
    AssemblyDocument::new("Base")
        .store(&dir.join("Base.json"))
        .unwrap();
    AssemblyDocument::new("Cover")
        .store(&dir.join("Cover.json"))
        .unwrap();

    let mut asm = AssemblyDocument::new("Bracket");
    asm.geometry = ["Edge1", "Edge2", "Edge3", "Edge4", "Face1"]
        .iter()
        .map(ToString::to_string)
        .collect();
    asm.references = vec!["Base.json".to_string(), "Cover.json".to_string()];
    asm.components = vec![
        ComponentNode {
            name: "Base-1".to_string(),
            material: "AISI 1020".to_string(),
            file: Some("Base.json".to_string()),
            features: vec![
                feature(
                    "Sketch3",
                    "sketch",
                    vec![
                        dimension("D1@Sketch3", 10.0, Some(Axis::X)),
                        dimension("D2@Sketch3", 4.0, Some(Axis::Y)),
                    ],
                ),
                feature(
                    "Extrude1",
                    "extrude",
                    vec![dimension("D1@Extrude1", 100.0, Some(Axis::X))],
                ),
            ],
            rebuilds: 0,
        },
        ComponentNode {
            name: "Cover-1".to_string(),
            material: String::new(),
            file: Some("Cover.json".to_string()),
            features: vec![feature(
                "Sketch1",
                "sketch",
                vec![
                    dimension("D1@Sketch1", 50.0, Some(Axis::X)),
                    dimension("D2@Sketch1", 30.0, Some(Axis::Y)),
                ],
            )],
            rebuilds: 0,
        },
    ];

    let path = dir.join("Bracket.json");
    asm.store(&path).unwrap();
    path
}

/// Write the `Bracket` assembly to `dir/asm` with its parts in `dir/parts`
///
/// The assembly reaches its parts through `../parts/...` references, so a
/// bundle has to relocate them.
pub fn split_bracket_assembly(dir: &Path) -> PathBuf {
    let parts = dir.join("parts");
    let asm_dir = dir.join("asm");
    std::fs::create_dir_all(&parts).unwrap();
    std::fs::create_dir_all(&asm_dir).unwrap();

    let flat = bracket_assembly(&parts);
    let mut asm = AssemblyDocument::load(&flat).unwrap();
    std::fs::remove_file(&flat).unwrap();
    for reference in &mut asm.references {
        *reference = format!("../parts/{reference}");
    }
    for component in &mut asm.components {
        component.file = component.file.take().map(|f| format!("../parts/{f}"));
    }

    let path = asm_dir.join("Bracket.json");
    asm.store(&path).unwrap();
    path
}

/// Write a material database listing `names` and return its path
pub fn material_database(dir: &Path, file: &str, names: &[&str]) -> PathBuf {
    let mut body = String::from("<mstns:materialdb>\n  <classification name=\"Steel\">\n");
    for name in names {
        body.push_str(&format!("    <material name=\"{name}\" matid=\"0\"/>\n"));
    }
    body.push_str("  </classification>\n</mstns:materialdb>\n");
    let path = dir.join(file);
    std::fs::write(&path, body).unwrap();
    path
}

pub fn dimension_entry(feature: &str, dimension: &str, new_value: f64) -> Value {
    json!({
        "type": "dimension",
        "feature": feature,
        "dimension": dimension,
        "newValue": new_value,
        "units": "mm"
    })
}

pub fn material_entry(component: &str, new_material: &str) -> Value {
    json!({
        "type": "material",
        "component": component,
        "newMaterial": new_material
    })
}

pub fn feature_entry(operation: &str, edges: &[&str], value: Option<f64>) -> Value {
    let mut entry = json!({
        "type": "feature",
        "operation": operation,
        "edges": edges
    });
    if let Some(v) = value {
        entry["value"] = json!(v);
    }
    entry
}

pub fn scale_entry(axis: &str, target_size: f64) -> Value {
    json!({
        "type": "scale",
        "axis": axis,
        "targetSize": target_size
    })
}

/// Wrap entries into a modification document
pub fn modification_document(entries: impl IntoIterator<Item = Value>) -> String {
    json!({ "modifications": entries.into_iter().collect::<Vec<_>>() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = bracket_assembly(dir.path());
        let doc = AssemblyDocument::load(&path).unwrap();
        assert_eq!(doc.components.len(), 2);
        assert!(dir.path().join("Base.json").is_file());
    }

    #[test]
    fn document_wraps_entries() {
        let text = modification_document([scale_entry("X", 250.0)]);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["modifications"][0]["targetSize"], 250.0);
    }
}
