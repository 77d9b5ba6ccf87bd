//! Simulated CAD automation surface
//!
//! A file-backed implementation of [`CadBridge`] used by tests and the CLI:
//! - Documents are JSON files (see [`document`])
//! - Open documents hold a lock on their file until `close_all`
//! - Every call is recorded in a journal so call ordering can be asserted
//! - Failures can be injected per operation to exercise error paths

pub mod document;

use crate::bridge::{CadBridge, DimensionReading, DimensionSample, FeatureSpec, MaterialAssignment};
use crate::error::{BridgeError, BridgeResult};
use crate::session::{Session, SessionId};
use cadmod_descriptor::{Axis, DimensionRef};
use document::{AssemblyDocument, DimensionNode, FeatureNode};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// File locks held by open documents, shareable with filesystem helpers
#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    inner: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl FileLocks {
    /// Empty lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a lock on `path`
    pub fn hold(&self, path: impl Into<PathBuf>) {
        self.inner.lock().insert(path.into());
    }

    /// Release every lock
    pub fn release_all(&self) {
        self.inner.lock().clear();
    }

    /// True when any locked file lives under `dir`
    #[must_use]
    pub fn is_locked_under(&self, dir: &Path) -> bool {
        self.inner.lock().iter().any(|p| p.starts_with(dir))
    }

    /// Snapshot of held locks
    #[must_use]
    pub fn held(&self) -> Vec<PathBuf> {
        self.inner.lock().iter().cloned().collect()
    }
}

/// One recorded bridge call
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    /// `open_document`
    Open(PathBuf),
    /// `close_all` with the number of documents closed
    CloseAll(usize),
    /// `clear_selection`
    ClearSelection,
    /// `select`
    Select(Vec<String>),
    /// `set_dimension`
    SetDimension {
        /// Feature name
        feature: String,
        /// Dimension name
        dimension: String,
        /// Value written
        value: f64,
    },
    /// `set_material`
    SetMaterial {
        /// Component name
        component: String,
        /// Material written
        material: String,
    },
    /// `insert_feature`, with the created feature's name
    InsertFeature(String),
    /// `set_component_dimension`
    SetComponentDimension {
        /// Component name
        component: String,
        /// Dimension name
        dimension: String,
        /// Value written
        value: f64,
    },
    /// `rebuild_component`
    RebuildComponent(String),
    /// `rebuild`
    Rebuild {
        /// Whether the rebuild was forced
        force: bool,
    },
    /// `save`
    Save(PathBuf),
    /// `pack_and_go` with its destination
    PackAndGo(PathBuf),
}

impl BridgeCall {
    /// True for calls that change document state
    #[inline]
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::SetDimension { .. }
                | Self::SetMaterial { .. }
                | Self::InsertFeature(_)
                | Self::SetComponentDimension { .. }
        )
    }
}

/// Operation that should fail when invoked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// Every `open_document`
    Open,
    /// Every `save`
    Save,
    /// Every `pack_and_go`
    PackAndGo,
    /// Every `rebuild`
    Rebuild,
    /// `set_dimension` on this dimension name
    SetDimension(String),
    /// `set_component_dimension` on this dimension name
    SetComponentDimension(String),
    /// `set_material` on this component
    SetMaterial(String),
}

#[derive(Debug)]
struct OpenDocument {
    session: Session,
    doc: AssemblyDocument,
    dirty: bool,
    selection: Vec<String>,
    rebuilds: u32,
}

/// File-backed simulated CAD application
#[derive(Debug, Default)]
pub struct SimulatedCad {
    open: HashMap<SessionId, OpenDocument>,
    journal: Vec<BridgeCall>,
    failures: HashSet<FailurePoint>,
    locks: FileLocks,
}

impl SimulatedCad {
    /// Create a simulator with its own lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simulator sharing an existing lock table
    #[inline]
    #[must_use]
    pub fn with_locks(locks: FileLocks) -> Self {
        Self {
            locks,
            ..Self::default()
        }
    }

    /// Make an operation fail from now on
    pub fn inject_failure(&mut self, point: FailurePoint) {
        self.failures.insert(point);
    }

    /// Stop failing an operation
    pub fn clear_failure(&mut self, point: &FailurePoint) {
        self.failures.remove(point);
    }

    /// Every call made so far, in order
    #[inline]
    #[must_use]
    pub fn journal(&self) -> &[BridgeCall] {
        &self.journal
    }

    /// Lock table shared with filesystem helpers
    #[inline]
    #[must_use]
    pub fn locks(&self) -> FileLocks {
        self.locks.clone()
    }

    /// Number of open documents
    #[inline]
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// In-memory state of an open document
    #[must_use]
    pub fn document(&self, session: &Session) -> Option<&AssemblyDocument> {
        self.open.get(&session.id()).map(|o| &o.doc)
    }

    /// Full rebuilds performed on an open document
    #[must_use]
    pub fn rebuild_count(&self, session: &Session) -> Option<u32> {
        self.open.get(&session.id()).map(|o| o.rebuilds)
    }

    fn fail_if(&self, point: FailurePoint) -> BridgeResult<()> {
        if self.failures.contains(&point) {
            return Err(BridgeError::Surface(format!("injected failure: {point:?}")));
        }
        Ok(())
    }

    fn doc(&self, session: &Session) -> BridgeResult<&OpenDocument> {
        self.open
            .get(&session.id())
            .ok_or(BridgeError::InvalidSession(session.id()))
    }

    fn doc_mut(&mut self, session: &Session) -> BridgeResult<&mut OpenDocument> {
        self.open
            .get_mut(&session.id())
            .ok_or(BridgeError::InvalidSession(session.id()))
    }
}

fn check_value(target: &str, value: f64) -> BridgeResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BridgeError::InvalidValue {
            target: target.to_string(),
            value,
        })
    }
}

/// Map a reference to a path inside the bundle; escaping paths are flattened
/// Location of `reference` inside a bundle, relative to the bundle root
///
/// `..` segments are collapsed lexically; anything still escaping the root
/// (or absolute) is flattened to its file name.
fn bundle_relative(reference: &Path) -> PathBuf {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in reference.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir if !parts.is_empty() => {
                parts.pop();
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return reference
                    .file_name()
                    .map_or_else(|| reference.to_path_buf(), PathBuf::from);
            }
        }
    }
    parts.iter().collect()
}

/// Path from bundle directory `from` to bundle file `to`, both bundle-relative
fn relative_between(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    std::iter::repeat(Component::ParentDir.as_os_str())
        .take(from.len() - common)
        .chain(to[common..].iter().map(|c| c.as_os_str()))
        .collect()
}

/// Rewrite a document's references (and matching component files) to the
/// bundle layout; returns `(source path, bundle path)` for each reference
fn rebase_references(
    doc: &mut AssemblyDocument,
    source_dir: &Path,
    bundle_dir: &Path,
) -> Vec<(PathBuf, PathBuf)> {
    let mut targets = Vec::with_capacity(doc.references.len());
    let mut renamed: HashMap<String, String> = HashMap::new();
    for reference in &mut doc.references {
        let bundled = bundle_relative(&bundle_dir.join(reference.as_str()));
        let rewritten = relative_between(bundle_dir, &bundled)
            .to_string_lossy()
            .replace('\\', "/");
        targets.push((source_dir.join(reference.as_str()), bundled));
        if *reference != rewritten {
            renamed.insert(reference.clone(), rewritten.clone());
            *reference = rewritten;
        }
    }
    for component in &mut doc.components {
        if let Some(file) = component.file.as_mut() {
            if let Some(rewritten) = renamed.get(file.as_str()) {
                file.clone_from(rewritten);
            }
        }
    }
    targets
}

impl CadBridge for SimulatedCad {
    fn open_document(&mut self, path: &Path) -> BridgeResult<Session> {
        self.journal.push(BridgeCall::Open(path.to_path_buf()));
        self.fail_if(FailurePoint::Open)
            .map_err(|e| BridgeError::open_failed(path, e.to_string()))?;

        if let Some(existing) = self.open.values().find(|o| o.session.path() == path) {
            return Ok(existing.session.clone());
        }

        let doc = AssemblyDocument::load(path)?;
        let session = Session::new(path, doc.name.clone());
        tracing::debug!("Opened {} as {}", path.display(), session);

        self.locks.hold(path);
        self.open.insert(
            session.id(),
            OpenDocument {
                session: session.clone(),
                doc,
                dirty: false,
                selection: Vec::new(),
                rebuilds: 0,
            },
        );
        Ok(session)
    }

    fn close_all(&mut self) -> usize {
        let closed = self.open.len();
        self.open.clear();
        self.locks.release_all();
        self.journal.push(BridgeCall::CloseAll(closed));
        closed
    }

    fn clear_selection(&mut self, session: &Session) -> BridgeResult<()> {
        self.journal.push(BridgeCall::ClearSelection);
        self.doc_mut(session)?.selection.clear();
        Ok(())
    }

    fn select(&mut self, session: &Session, refs: &[String]) -> BridgeResult<()> {
        self.journal.push(BridgeCall::Select(refs.to_vec()));
        let open = self.doc_mut(session)?;
        if let Some(missing) = refs.iter().find(|r| !open.doc.has_reference(r)) {
            return Err(BridgeError::ReferenceNotFound(missing.clone()));
        }
        open.selection.extend(refs.iter().cloned());
        Ok(())
    }

    fn dimension(&mut self, session: &Session, target: &DimensionRef) -> BridgeResult<DimensionReading> {
        let open = self.doc_mut(session)?;
        let units = open.doc.units.clone();
        let feature = open
            .doc
            .feature_mut(&target.feature)
            .ok_or_else(|| BridgeError::FeatureNotFound(target.feature.clone()))?;
        let dim = feature
            .dimension_mut(&target.dimension)
            .ok_or_else(|| BridgeError::DimensionNotFound {
                feature: target.feature.clone(),
                dimension: target.dimension.clone(),
            })?;
        Ok(DimensionReading {
            value: dim.value,
            units: if dim.units.is_empty() { units } else { dim.units.clone() },
        })
    }

    fn set_dimension(
        &mut self,
        session: &Session,
        target: &DimensionRef,
        value: f64,
    ) -> BridgeResult<DimensionReading> {
        self.journal.push(BridgeCall::SetDimension {
            feature: target.feature.clone(),
            dimension: target.dimension.clone(),
            value,
        });
        self.fail_if(FailurePoint::SetDimension(target.dimension.clone()))?;
        check_value(&target.dimension, value)?;

        let old = self.dimension(session, target)?;
        let open = self.doc_mut(session)?;
        if let Some(dim) = open
            .doc
            .feature_mut(&target.feature)
            .and_then(|f| f.dimension_mut(&target.dimension))
        {
            dim.value = value;
        }
        open.dirty = true;
        Ok(old)
    }

    fn material(&mut self, session: &Session, component: &str) -> BridgeResult<String> {
        let open = self.doc_mut(session)?;
        open.doc
            .component_mut(component)
            .map(|c| c.material.clone())
            .ok_or_else(|| BridgeError::ComponentNotFound(component.to_string()))
    }

    fn set_material(
        &mut self,
        session: &Session,
        component: &str,
        material: &MaterialAssignment,
    ) -> BridgeResult<String> {
        self.journal.push(BridgeCall::SetMaterial {
            component: component.to_string(),
            material: material.name.clone(),
        });
        self.fail_if(FailurePoint::SetMaterial(component.to_string()))?;

        let open = self.doc_mut(session)?;
        let node = open
            .doc
            .component_mut(component)
            .ok_or_else(|| BridgeError::ComponentNotFound(component.to_string()))?;
        let old = std::mem::replace(&mut node.material, material.name.clone());
        if let Some(db) = &material.database {
            open.doc
                .properties
                .insert(format!("material_db:{component}"), db.display().to_string());
        }
        open.dirty = true;
        Ok(old)
    }

    fn insert_feature(&mut self, session: &Session, spec: &FeatureSpec) -> BridgeResult<String> {
        let open = self.doc_mut(session)?;
        if open.selection.is_empty() {
            return Err(BridgeError::EmptySelection);
        }

        let reject = |message: &str| BridgeError::FeatureRejected {
            kind: spec.kind_name().to_string(),
            message: message.to_string(),
        };
        let sizes: Vec<(f64, &str)> = match *spec {
            FeatureSpec::Chamfer {
                distance,
                angle_deg,
            } => {
                if !(0.0..90.0).contains(&angle_deg) || angle_deg == 0.0 {
                    return Err(reject("angle must be between 0 and 90 degrees"));
                }
                vec![(distance, "mm"), (angle_deg, "deg")]
            }
            FeatureSpec::Fillet { radius } => vec![(radius, "mm")],
            FeatureSpec::Hole { diameter, depth } => vec![(diameter, "mm"), (depth, "mm")],
        };
        if sizes.iter().any(|(v, _)| !v.is_finite() || *v <= 0.0) {
            return Err(reject("sizes must be positive"));
        }

        let name = open.doc.next_feature_name(spec.kind_name());
        let dimensions = sizes
            .into_iter()
            .enumerate()
            .map(|(i, (value, units))| DimensionNode {
                name: format!("D{}@{}", i + 1, name),
                value,
                units: units.to_string(),
                axis: None,
            })
            .collect();
        let references = std::mem::take(&mut open.selection);
        open.doc.features.push(FeatureNode {
            name: name.clone(),
            kind: spec.kind_name().to_ascii_lowercase(),
            dimensions,
            references,
        });
        open.dirty = true;

        self.journal.push(BridgeCall::InsertFeature(name.clone()));
        tracing::debug!("Inserted {} as {}", spec, name);
        Ok(name)
    }

    fn components(&mut self, session: &Session) -> BridgeResult<Vec<String>> {
        Ok(self
            .doc(session)?
            .doc
            .components
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    fn list_dimensions(
        &mut self,
        session: &Session,
        axis: Option<Axis>,
    ) -> BridgeResult<Vec<DimensionSample>> {
        let doc = &self.doc(session)?.doc;
        let top = doc.features.iter().map(|f| (doc.name.as_str(), f));
        let nested = doc
            .components
            .iter()
            .flat_map(|c| c.features.iter().map(move |f| (c.name.as_str(), f)));

        Ok(nested
            .chain(top)
            .flat_map(|(owner, feature)| {
                feature.dimensions.iter().map(move |d| DimensionSample {
                    component: owner.to_string(),
                    dimension: d.name.clone(),
                    value: d.value,
                    axis: d.axis,
                })
            })
            .filter(|s| axis.map_or(true, |a| s.axis == Some(a)))
            .collect())
    }

    fn set_component_dimension(
        &mut self,
        session: &Session,
        component: &str,
        dimension: &str,
        value: f64,
    ) -> BridgeResult<f64> {
        self.journal.push(BridgeCall::SetComponentDimension {
            component: component.to_string(),
            dimension: dimension.to_string(),
            value,
        });
        self.fail_if(FailurePoint::SetComponentDimension(dimension.to_string()))?;
        check_value(dimension, value)?;

        let open = self.doc_mut(session)?;
        let features = if component == open.doc.name {
            &mut open.doc.features
        } else {
            &mut open
                .doc
                .component_mut(component)
                .ok_or_else(|| BridgeError::ComponentNotFound(component.to_string()))?
                .features
        };
        let dim = features
            .iter_mut()
            .flat_map(|f| f.dimensions.iter_mut())
            .find(|d| d.name == dimension)
            .ok_or_else(|| BridgeError::DimensionNotFound {
                feature: component.to_string(),
                dimension: dimension.to_string(),
            })?;
        let old = std::mem::replace(&mut dim.value, value);
        open.dirty = true;
        Ok(old)
    }

    fn rebuild_component(&mut self, session: &Session, component: &str) -> BridgeResult<()> {
        self.journal
            .push(BridgeCall::RebuildComponent(component.to_string()));
        let open = self.doc_mut(session)?;
        if component == open.doc.name {
            open.rebuilds += 1;
            return Ok(());
        }
        let node = open
            .doc
            .component_mut(component)
            .ok_or_else(|| BridgeError::ComponentNotFound(component.to_string()))?;
        node.rebuilds += 1;
        Ok(())
    }

    fn rebuild(&mut self, session: &Session, force: bool) -> BridgeResult<()> {
        self.journal.push(BridgeCall::Rebuild { force });
        self.fail_if(FailurePoint::Rebuild)?;
        self.doc_mut(session)?.rebuilds += 1;
        Ok(())
    }

    fn is_dirty(&self, session: &Session) -> BridgeResult<bool> {
        Ok(self.doc(session)?.dirty)
    }

    fn save(&mut self, session: &Session) -> BridgeResult<()> {
        self.journal.push(BridgeCall::Save(session.path().to_path_buf()));
        self.fail_if(FailurePoint::Save).map_err(|e| BridgeError::SaveFailed {
            path: session.path().to_path_buf(),
            message: e.to_string(),
        })?;
        let open = self.doc_mut(session)?;
        open.doc.store(session.path())?;
        open.dirty = false;
        tracing::debug!("Saved {}", session.path().display());
        Ok(())
    }

    fn pack_and_go(&mut self, session: &Session, destination: &Path) -> BridgeResult<Vec<PathBuf>> {
        self.journal
            .push(BridgeCall::PackAndGo(destination.to_path_buf()));
        self.fail_if(FailurePoint::PackAndGo)?;

        let open = self.doc(session)?;
        std::fs::create_dir_all(destination).map_err(|e| BridgeError::io_error(destination, e))?;

        let file_name = session
            .path()
            .file_name()
            .ok_or_else(|| BridgeError::Surface("document path has no file name".to_string()))?;
        let doc_target = destination.join(file_name);
        let source_dir = session.path().parent().unwrap_or(Path::new(".")).to_path_buf();

        let mut packed = open.doc.clone();
        let mut queue: VecDeque<(PathBuf, PathBuf)> =
            rebase_references(&mut packed, &source_dir, Path::new("")).into();
        packed.store(&doc_target)?;
        let mut written = vec![doc_target];
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut missing = Vec::new();

        while let Some((source, relative)) = queue.pop_front() {
            if !seen.insert(source.clone()) {
                continue;
            }
            if !source.is_file() {
                missing.push(source);
                continue;
            }
            let target = destination.join(&relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| BridgeError::io_error(parent, e))?;
            }

            // Referenced documents bring their own references along
            match AssemblyDocument::load(&source) {
                Ok(mut nested) => {
                    let base = source.parent().unwrap_or(Path::new(".")).to_path_buf();
                    let rel_base = relative.parent().map(Path::to_path_buf).unwrap_or_default();
                    queue.extend(rebase_references(&mut nested, &base, &rel_base));
                    nested.store(&target)?;
                }
                Err(_) => {
                    std::fs::copy(&source, &target).map_err(|e| BridgeError::io_error(&source, e))?;
                }
            }
            written.push(target);
        }

        if !missing.is_empty() {
            tracing::warn!(
                "Pack and go into {} missed {} file(s)",
                destination.display(),
                missing.len()
            );
            return Err(BridgeError::PackAndGoIncomplete { missing });
        }

        tracing::debug!(
            "Packed {} file(s) into {}",
            written.len(),
            destination.display()
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::document::ComponentNode;
    use super::*;

    fn write_fixture(dir: &Path) -> PathBuf {
        let mut part = AssemblyDocument::new("Base");
        part.references.push("Base.sketch".into());
        part.store(&dir.join("Base.json")).unwrap();
        std::fs::write(dir.join("Base.sketch"), "sketch data").unwrap();

        let mut asm = AssemblyDocument::new("Bracket");
        asm.geometry = vec!["Edge1".into(), "Edge2".into()];
        asm.references.push("Base.json".into());
        asm.components.push(ComponentNode {
            name: "Base-1".into(),
            material: "AISI 1020".into(),
            file: Some("Base.json".into()),
            features: vec![FeatureNode {
                name: "Sketch3".into(),
                kind: "sketch".into(),
                dimensions: vec![
                    DimensionNode {
                        name: "D1@Sketch3".into(),
                        value: 10.0,
                        units: "mm".into(),
                        axis: Some(Axis::X),
                    },
                    DimensionNode {
                        name: "D2@Sketch3".into(),
                        value: 4.0,
                        units: "mm".into(),
                        axis: Some(Axis::Y),
                    },
                ],
                references: Vec::new(),
            }],
            rebuilds: 0,
        });
        let path = dir.join("Bracket.json");
        asm.store(&path).unwrap();
        path
    }

    #[test]
    fn open_locks_and_close_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();

        let session = cad.open_document(&path).unwrap();
        assert_eq!(session.title(), "Bracket");
        assert!(cad.locks().is_locked_under(dir.path()));

        assert_eq!(cad.close_all(), 1);
        assert!(!cad.locks().is_locked_under(dir.path()));
        assert!(matches!(
            cad.is_dirty(&session),
            Err(BridgeError::InvalidSession(_))
        ));
    }

    #[test]
    fn reopening_returns_same_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let a = cad.open_document(&path).unwrap();
        let b = cad.open_document(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(cad.open_count(), 1);
    }

    #[test]
    fn set_dimension_returns_old_and_marks_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();
        let target = DimensionRef::new("Sketch3", "D1@Sketch3");

        assert!(!cad.is_dirty(&session).unwrap());
        let old = cad.set_dimension(&session, &target, 12.0).unwrap();
        assert_eq!(old.value, 10.0);
        assert_eq!(old.units, "mm");
        assert_eq!(cad.dimension(&session, &target).unwrap().value, 12.0);
        assert!(cad.is_dirty(&session).unwrap());
    }

    #[test]
    fn set_dimension_unknown_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();
        let err = cad
            .set_dimension(&session, &DimensionRef::new("Sketch9", "D1@Sketch9"), 1.0)
            .unwrap_err();
        assert!(matches!(err, BridgeError::FeatureNotFound(name) if name == "Sketch9"));
        assert!(!cad.is_dirty(&session).unwrap());
    }

    #[test]
    fn insert_feature_requires_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();
        let spec = FeatureSpec::Fillet { radius: 2.0 };

        assert!(matches!(
            cad.insert_feature(&session, &spec),
            Err(BridgeError::EmptySelection)
        ));

        cad.select(&session, &["Edge1".to_string()]).unwrap();
        assert_eq!(cad.insert_feature(&session, &spec).unwrap(), "Fillet1");
        cad.select(&session, &["Edge2".to_string()]).unwrap();
        assert_eq!(cad.insert_feature(&session, &spec).unwrap(), "Fillet2");
    }

    #[test]
    fn select_rejects_unknown_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();
        let err = cad
            .select(&session, &["Edge1".to_string(), "Edge42".to_string()])
            .unwrap_err();
        assert!(matches!(err, BridgeError::ReferenceNotFound(r) if r == "Edge42"));
    }

    #[test]
    fn list_dimensions_filters_by_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();

        assert_eq!(cad.list_dimensions(&session, None).unwrap().len(), 2);
        let x = cad.list_dimensions(&session, Some(Axis::X)).unwrap();
        assert_eq!(x.len(), 1);
        assert_eq!(x[0].component, "Base-1");
        assert_eq!(x[0].dimension, "D1@Sketch3");
        assert!(cad.list_dimensions(&session, Some(Axis::Z)).unwrap().is_empty());
    }

    #[test]
    fn pack_and_go_copies_references_transitively() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let path = write_fixture(src.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();

        let target = dst.path().join("bundle");
        let written = cad.pack_and_go(&session, &target).unwrap();
        assert_eq!(written.len(), 3);
        assert!(target.join("Bracket.json").is_file());
        assert!(target.join("Base.json").is_file());
        assert!(target.join("Base.sketch").is_file());
    }

    #[test]
    fn pack_and_go_relocates_escaping_references() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let parts = src.path().join("parts");
        let asm_dir = src.path().join("asm");
        std::fs::create_dir_all(&parts).unwrap();
        std::fs::create_dir_all(&asm_dir).unwrap();
        let flat = write_fixture(&parts);
        let mut asm = AssemblyDocument::load(&flat).unwrap();
        asm.references = vec!["../parts/Base.json".into()];
        asm.components[0].file = Some("../parts/Base.json".into());
        let path = asm_dir.join("Bracket.json");
        asm.store(&path).unwrap();

        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();
        let first = dst.path().join("first");
        let written = cad.pack_and_go(&session, &first).unwrap();
        assert_eq!(written.len(), 3);
        assert!(first.join("Base.sketch").is_file());

        let packed = AssemblyDocument::load(&first.join("Bracket.json")).unwrap();
        assert_eq!(packed.references, vec!["Base.json".to_string()]);
        assert_eq!(packed.components[0].file.as_deref(), Some("Base.json"));

        // The bundle is self-contained: packing it again needs nothing outside it
        assert_eq!(cad.close_all(), 1);
        let session = cad.open_document(&first.join("Bracket.json")).unwrap();
        let again = cad.pack_and_go(&session, &dst.path().join("second")).unwrap();
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn bundle_paths_collapse_parent_segments() {
        assert_eq!(bundle_relative(Path::new("sub/../Base.json")), PathBuf::from("Base.json"));
        assert_eq!(bundle_relative(Path::new("../parts/Base.json")), PathBuf::from("Base.json"));
        assert_eq!(bundle_relative(Path::new("parts/Base.json")), PathBuf::from("parts/Base.json"));
        assert_eq!(
            relative_between(Path::new("parts"), Path::new("Base.sketch")),
            PathBuf::from("../Base.sketch")
        );
    }

    #[test]
    fn pack_and_go_reports_missing_reference() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let path = write_fixture(src.path());
        std::fs::remove_file(src.path().join("Base.sketch")).unwrap();
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();

        let err = cad.pack_and_go(&session, dst.path()).unwrap_err();
        assert!(matches!(err, BridgeError::PackAndGoIncomplete { missing } if missing.len() == 1));
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        cad.inject_failure(FailurePoint::Open);
        assert!(cad.open_document(&path).unwrap_err().is_session_fatal());

        cad.clear_failure(&FailurePoint::Open);
        let session = cad.open_document(&path).unwrap();
        cad.inject_failure(FailurePoint::Save);
        assert!(matches!(
            cad.save(&session),
            Err(BridgeError::SaveFailed { .. })
        ));
    }

    #[test]
    fn save_persists_and_clears_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cad = SimulatedCad::new();
        let session = cad.open_document(&path).unwrap();
        cad.set_material(&session, "Base-1", &MaterialAssignment::raw("Brass"))
            .unwrap();
        cad.save(&session).unwrap();
        assert!(!cad.is_dirty(&session).unwrap());

        let reloaded = AssemblyDocument::load(&path).unwrap();
        assert_eq!(reloaded.components[0].material, "Brass");
    }
}
