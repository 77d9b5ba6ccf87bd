//! Modification Dispatcher
//!
//! Applies validated descriptors to the workspace copy, one at a time:
//! - Opening the copy is the only fatal step before persistence
//! - Each descriptor yields exactly one result; a failure never stops the batch
//! - Selection is cleared before every mutation
//! - One forced rebuild precedes the single save at the end of the batch
//!
//! Progress is streamed through a callback: every descriptor is announced as
//! `Pending`, then moves to `Running` and finally `Succeeded` or `Failed`.

use crate::cancel::CancelToken;
use crate::config::{FeatureDefaults, RunConfig};
use crate::error::{DescriptorExecutionError, SessionError};
use crate::ledger::{OriginalValue, RollbackEntry, RollbackKey, RollbackKind, RollbackLedger, RunSummary};
use crate::materials::MaterialResolver;
use crate::outcome::{
    format_value, FeatureProcessingStatus, ModificationResult, ProcessingState, ProgressUpdate,
};
use cadmod_bridge::{CadBridge, FeatureSpec, MaterialAssignment, Session};
use cadmod_descriptor::{
    DimensionChange, DimensionRef, FeatureChange, FeatureOperation, MaterialChange,
    ModificationDescriptor, ScaleChange,
};
use cadmod_workspace::{Workspace, WorkspaceState};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// One dimension rewritten by a scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleLogLine {
    /// Owning component
    pub component: String,
    /// Dimension name
    pub dimension: String,
    /// Value before scaling
    pub old_value: f64,
    /// Value written
    pub new_value: f64,
}

impl fmt::Display for ScaleLogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: {} -> {}",
            self.component, self.dimension, self.old_value, self.new_value
        )
    }
}

/// Everything a batch produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Captured originals and ordered results
    pub ledger: RollbackLedger,
    /// Per-dimension lines written by scale descriptors
    pub scale_log: Vec<ScaleLogLine>,
    /// True when the batch stopped early on request
    pub cancelled: bool,
}

impl BatchOutcome {
    /// Results in input order
    #[inline]
    #[must_use]
    pub fn results(&self) -> &[ModificationResult] {
        self.ledger.results()
    }

    /// Success and total counts
    #[inline]
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.ledger.summary()
    }
}

struct Applied {
    old: String,
    new: String,
    units: Option<String>,
}

/// A failed descriptor and the value it observed before failing, if any
struct Failure {
    error: DescriptorExecutionError,
    observed: Option<String>,
}

impl Failure {
    fn observed(error: impl Into<DescriptorExecutionError>, value: String) -> Self {
        Self {
            error: error.into(),
            observed: Some(value),
        }
    }
}

impl From<DescriptorExecutionError> for Failure {
    fn from(error: DescriptorExecutionError) -> Self {
        Self {
            error,
            observed: None,
        }
    }
}

impl From<cadmod_bridge::BridgeError> for Failure {
    fn from(error: cadmod_bridge::BridgeError) -> Self {
        DescriptorExecutionError::from(error).into()
    }
}

struct Progress<'a> {
    total: usize,
    done: usize,
    sink: &'a mut dyn FnMut(&ProgressUpdate),
}

impl Progress<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    fn emit(
        &mut self,
        index: usize,
        name: &str,
        state: ProcessingState,
        message: impl Into<String>,
        elapsed: Duration,
    ) {
        let update = ProgressUpdate {
            index,
            total: self.total,
            fraction: self.fraction(),
            status: FeatureProcessingStatus {
                feature_name: name.to_string(),
                state,
                message: message.into(),
                elapsed,
            },
        };
        (self.sink)(&update);
    }

    fn finish(&mut self, index: usize, result: &ModificationResult, elapsed: Duration) {
        self.done += 1;
        let (state, message) = if result.success {
            (
                ProcessingState::Succeeded,
                format!("{} -> {}", result.old_value, result.new_value),
            )
        } else {
            (
                ProcessingState::Failed,
                result.error_message.clone().unwrap_or_default(),
            )
        };
        self.emit(index, &result.feature_name, state, message, elapsed);
    }
}

/// Applies descriptors through a [`CadBridge`]
#[derive(Debug, Clone)]
pub struct Dispatcher {
    defaults: FeatureDefaults,
    resolver: MaterialResolver,
    rebuild_each_change: bool,
    cancel: CancelToken,
}

impl Dispatcher {
    /// Dispatcher configured from a run configuration
    #[must_use]
    pub fn new(config: &RunConfig) -> Self {
        Self {
            defaults: config.feature_defaults,
            resolver: MaterialResolver::new(config.material_databases.clone()),
            rebuild_each_change: config.rebuild_each_change,
            cancel: CancelToken::new(),
        }
    }

    /// With a cancellation token checked between descriptors
    #[inline]
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Apply `descriptors` in order to the workspace copy
    ///
    /// # Errors
    /// - `SessionError::WorkspaceNotActive` unless the workspace is active
    /// - `SessionError::Open` if the copy cannot be opened; nothing is applied
    /// - `SessionError::Save` if the changes cannot be persisted
    pub fn apply<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        descriptors: &[ModificationDescriptor],
        workspace: &Workspace,
        on_progress: &mut dyn FnMut(&ProgressUpdate),
    ) -> Result<BatchOutcome, SessionError> {
        let session = open_copy(bridge, workspace)?;
        tracing::info!("Applying {} change(s) to {}", descriptors.len(), session);

        let mut outcome = BatchOutcome::default();
        let names: Vec<String> = descriptors
            .iter()
            .map(ModificationDescriptor::display_name)
            .collect();
        let mut progress = Progress {
            total: descriptors.len(),
            done: 0,
            sink: on_progress,
        };
        for (index, name) in names.iter().enumerate() {
            progress.emit(index, name, ProcessingState::Pending, "queued", Duration::ZERO);
        }

        for (index, (descriptor, name)) in descriptors.iter().zip(&names).enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Cancelled before change {} of {}",
                    index + 1,
                    descriptors.len()
                );
                outcome.cancelled = true;
                break;
            }

            progress.emit(index, name, ProcessingState::Running, "applying", Duration::ZERO);
            let started = Instant::now();
            let applied = self.apply_one(bridge, &session, descriptor, &mut outcome);
            let elapsed = started.elapsed();

            let result = match applied {
                Ok(applied) => {
                    tracing::info!("{}: {} -> {}", name, applied.old, applied.new);
                    let result = ModificationResult::succeeded(name.clone(), applied.old, applied.new);
                    match applied.units {
                        Some(units) => result.with_units(units),
                        None => result,
                    }
                }
                Err(Failure { error, observed }) => {
                    tracing::warn!("{} failed: {}", name, error);
                    let result =
                        ModificationResult::failed(name.clone(), requested_value(descriptor), error.to_string());
                    match observed {
                        Some(old) => result.with_old_value(old),
                        None => result,
                    }
                }
            };
            progress.finish(index, &result, elapsed);
            outcome.ledger.record(result);
        }

        persist(bridge, &session)?;
        tracing::info!("Batch finished: {}", outcome.summary());
        Ok(outcome)
    }

    /// Restore every original captured in `ledger`, newest capture first
    ///
    /// # Errors
    /// Same conditions as [`Dispatcher::apply`]
    pub fn revert<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        ledger: &RollbackLedger,
        workspace: &Workspace,
        on_progress: &mut dyn FnMut(&ProgressUpdate),
    ) -> Result<BatchOutcome, SessionError> {
        let session = open_copy(bridge, workspace)?;
        let entries: Vec<&RollbackEntry> = ledger.entries().rev().collect();
        tracing::info!("Reverting {} captured value(s) in {}", entries.len(), session);

        let mut outcome = BatchOutcome::default();
        let mut progress = Progress {
            total: entries.len(),
            done: 0,
            sink: on_progress,
        };

        for (index, entry) in entries.iter().enumerate() {
            let name = entry.key.to_string();
            progress.emit(index, &name, ProcessingState::Running, "restoring", Duration::ZERO);
            let started = Instant::now();
            let result = match restore(bridge, &session, entry) {
                Ok(old) => ModificationResult::succeeded(name, old, entry.original.to_string()),
                Err(e) => {
                    tracing::warn!("Restoring {} failed: {}", name, e);
                    ModificationResult::failed(name, entry.original.to_string(), e.to_string())
                }
            };
            progress.finish(index, &result, started.elapsed());
            outcome.ledger.record(result);
        }

        persist(bridge, &session)?;
        Ok(outcome)
    }

    fn apply_one<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        session: &Session,
        descriptor: &ModificationDescriptor,
        outcome: &mut BatchOutcome,
    ) -> Result<Applied, Failure> {
        bridge.clear_selection(session)?;
        let applied = match descriptor {
            ModificationDescriptor::Dimension(change) => {
                apply_dimension(bridge, session, change, &mut outcome.ledger)
            }
            ModificationDescriptor::Material(change) => {
                self.apply_material(bridge, session, change, &mut outcome.ledger)
            }
            ModificationDescriptor::Feature(change) => self.apply_feature(bridge, session, change),
            ModificationDescriptor::Scale(change) => apply_scale(bridge, session, change, outcome),
        }?;

        if self.rebuild_each_change {
            if let Err(e) = bridge.rebuild(session, false) {
                tracing::warn!("Rebuild after {} failed: {}", descriptor.display_name(), e);
            }
        }
        Ok(applied)
    }

    fn apply_material<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        session: &Session,
        change: &MaterialChange,
        ledger: &mut RollbackLedger,
    ) -> Result<Applied, Failure> {
        let current = bridge.material(session, &change.component)?;
        ledger.capture(
            RollbackKey::new(&change.component, "material"),
            RollbackKind::Material,
            OriginalValue::Text(current.clone()),
        );

        let assignment = self.resolver.resolve(&change.new_material);
        let old = bridge
            .set_material(session, &change.component, &assignment)
            .map_err(|e| Failure::observed(e, current))?;
        Ok(Applied {
            old,
            new: assignment.name,
            units: None,
        })
    }

    fn apply_feature<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        session: &Session,
        change: &FeatureChange,
    ) -> Result<Applied, Failure> {
        let spec = self.feature_spec(change)?;
        bridge.select(session, &change.target_refs)?;
        let name = bridge.insert_feature(session, &spec)?;
        tracing::debug!("{} inserted on {} reference(s)", spec, change.target_refs.len());
        Ok(Applied {
            old: String::new(),
            new: name,
            units: None,
        })
    }

    fn feature_spec(&self, change: &FeatureChange) -> Result<FeatureSpec, DescriptorExecutionError> {
        let d = &self.defaults;
        let p = &change.parameters;
        let primary = |key: &str, default: f64| change.value.or_else(|| p.number(key)).unwrap_or(default);
        match &change.operation {
            FeatureOperation::Chamfer => Ok(FeatureSpec::Chamfer {
                distance: primary("distance", d.chamfer_distance),
                angle_deg: p.number("angle").unwrap_or(d.chamfer_angle),
            }),
            FeatureOperation::Fillet => Ok(FeatureSpec::Fillet {
                radius: primary("radius", d.fillet_radius),
            }),
            FeatureOperation::Hole => Ok(FeatureSpec::Hole {
                diameter: primary("diameter", d.hole_diameter),
                depth: p.number("depth").unwrap_or(d.hole_depth),
            }),
            FeatureOperation::Unrecognized(name) => {
                Err(DescriptorExecutionError::UnsupportedFeature(name.clone()))
            }
        }
    }
}

fn open_copy<B: CadBridge + ?Sized>(bridge: &mut B, workspace: &Workspace) -> Result<Session, SessionError> {
    if workspace.state() != WorkspaceState::Active {
        return Err(SessionError::WorkspaceNotActive(workspace.state()));
    }
    let path = workspace.assembly_copy();
    bridge.open_document(path).map_err(|source| {
        tracing::error!("Could not open workspace copy {}: {}", path.display(), source);
        SessionError::Open {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn persist<B: CadBridge + ?Sized>(bridge: &mut B, session: &Session) -> Result<(), SessionError> {
    if let Err(e) = bridge.rebuild(session, true) {
        tracing::warn!("Forced rebuild of {} failed: {}", session, e);
    }
    bridge.save(session).map_err(|e| {
        tracing::error!("Saving {} failed: {}", session, e);
        SessionError::Save(e)
    })
}

fn requested_value(descriptor: &ModificationDescriptor) -> String {
    match descriptor {
        ModificationDescriptor::Dimension(c) => format_value(c.new_value),
        ModificationDescriptor::Material(c) => c.new_material.clone(),
        ModificationDescriptor::Feature(c) => c.operation.name().to_string(),
        ModificationDescriptor::Scale(c) => format_value(c.target_size),
    }
}

fn apply_dimension<B: CadBridge + ?Sized>(
    bridge: &mut B,
    session: &Session,
    change: &DimensionChange,
    ledger: &mut RollbackLedger,
) -> Result<Applied, Failure> {
    let current = bridge.dimension(session, &change.target)?;
    ledger.capture(
        RollbackKey::new(&change.target.feature, &change.target.dimension),
        RollbackKind::FeatureDimension,
        OriginalValue::Number(current.value),
    );

    let old = bridge
        .set_dimension(session, &change.target, change.new_value)
        .map_err(|e| Failure::observed(e, format_value(current.value)))?;
    Ok(Applied {
        old: format_value(old.value),
        new: format_value(change.new_value),
        units: Some(old.units),
    })
}

fn apply_scale<B: CadBridge + ?Sized>(
    bridge: &mut B,
    session: &Session,
    change: &ScaleChange,
    outcome: &mut BatchOutcome,
) -> Result<Applied, Failure> {
    let samples = bridge.list_dimensions(session, Some(change.axis))?;
    let maximum = samples
        .iter()
        .map(|s| s.value)
        .fold(f64::NEG_INFINITY, f64::max);
    if samples.is_empty() || maximum <= 0.0 {
        return Err(DescriptorExecutionError::NoDimensionOnAxis(change.axis).into());
    }

    let ratio = change.target_size / maximum;
    tracing::info!(
        "Scaling {} dimension(s) on {} by {} ({} -> {})",
        samples.len(),
        change.axis,
        ratio,
        maximum,
        change.target_size
    );

    let mut modified: IndexSet<String> = IndexSet::new();
    let mut failed = 0usize;
    for sample in &samples {
        let new_value = sample.value * ratio;
        outcome.ledger.capture(
            RollbackKey::new(&sample.component, &sample.dimension),
            RollbackKind::ComponentDimension,
            OriginalValue::Number(sample.value),
        );
        match bridge.set_component_dimension(session, &sample.component, &sample.dimension, new_value) {
            Ok(old) => {
                let line = ScaleLogLine {
                    component: sample.component.clone(),
                    dimension: sample.dimension.clone(),
                    old_value: old,
                    new_value,
                };
                tracing::info!("  {}", line);
                outcome.scale_log.push(line);
                modified.insert(sample.component.clone());
            }
            Err(e) => {
                tracing::warn!(
                    "  {}/{} not scaled: {}",
                    sample.component,
                    sample.dimension,
                    e
                );
                failed += 1;
            }
        }
    }

    if modified.is_empty() {
        return Err(Failure::observed(
            DescriptorExecutionError::ScaleWritesFailed {
                axis: change.axis,
                failed,
            },
            format_value(maximum),
        ));
    }

    for component in &modified {
        if let Err(e) = bridge.rebuild_component(session, component) {
            tracing::warn!("Rebuild of {} failed: {}", component, e);
        }
    }
    if let Err(e) = bridge.rebuild(session, false) {
        tracing::warn!("Assembly rebuild after scale failed: {}", e);
    }

    Ok(Applied {
        old: format_value(maximum),
        new: format_value(change.target_size),
        units: None,
    })
}

fn restore<B: CadBridge + ?Sized>(
    bridge: &mut B,
    session: &Session,
    entry: &RollbackEntry,
) -> Result<String, DescriptorExecutionError> {
    bridge.clear_selection(session)?;
    let key = &entry.key;
    match (entry.kind, &entry.original) {
        (RollbackKind::FeatureDimension, OriginalValue::Number(v)) => {
            let target = DimensionRef::new(&key.reference, &key.attribute);
            Ok(format_value(bridge.set_dimension(session, &target, *v)?.value))
        }
        (RollbackKind::ComponentDimension, OriginalValue::Number(v)) => Ok(format_value(
            bridge.set_component_dimension(session, &key.reference, &key.attribute, *v)?,
        )),
        (RollbackKind::Material, OriginalValue::Text(name)) => Ok(bridge.set_material(
            session,
            &key.reference,
            &MaterialAssignment::raw(name.as_str()),
        )?),
        (kind, original) => Err(cadmod_bridge::BridgeError::Surface(format!(
            "captured {original} cannot be restored as {kind:?}"
        ))
        .into()),
    }
}
