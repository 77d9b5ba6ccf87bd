//! Run configuration
//!
//! Loaded from TOML; every field has a default so a partial file is enough:
//!
//! ```toml
//! working_root = "/var/tmp/cadmod"
//! material_databases = ["/opt/cad/materials/custom.sldmat"]
//!
//! [cleanup]
//! retry_delays_ms = [0, 500, 500]
//!
//! [feature_defaults]
//! fillet_radius = 2.0
//! ```

use crate::error::ConfigError;
use cadmod_workspace::{CleanupPolicy, DEFAULT_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters used when a feature instruction leaves one out (document units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    /// Chamfer setback distance
    pub chamfer_distance: f64,
    /// Chamfer angle in degrees
    pub chamfer_angle: f64,
    /// Fillet radius
    pub fillet_radius: f64,
    /// Hole diameter
    pub hole_diameter: f64,
    /// Hole depth
    pub hole_depth: f64,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            chamfer_distance: 5.0,
            chamfer_angle: 45.0,
            fillet_radius: 5.0,
            hole_diameter: 10.0,
            hole_depth: 10.0,
        }
    }
}

/// Configuration for a change run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Parent directory of workspace directories
    pub working_root: PathBuf,
    /// Parent directory of the output folder
    pub output_root: PathBuf,
    /// Workspace directory name prefix
    pub workspace_prefix: String,
    /// Folder under `output_root` that committed assemblies land in
    pub output_folder: String,
    /// Teardown retry policy
    pub cleanup: CleanupPolicy,
    /// Remove leftover workspaces before each run
    pub sweep_on_start: bool,
    /// Material database files, most preferred first
    pub material_databases: Vec<PathBuf>,
    /// Feature parameter defaults
    pub feature_defaults: FeatureDefaults,
    /// Rebuild after every successful change, not only once before save
    pub rebuild_each_change: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        let temp = std::env::temp_dir();
        Self {
            working_root: temp.clone(),
            output_root: temp,
            workspace_prefix: DEFAULT_PREFIX.to_string(),
            output_folder: "Modified_Assemblies".to_string(),
            cleanup: CleanupPolicy::default(),
            sweep_on_start: true,
            material_databases: Vec::new(),
            feature_defaults: FeatureDefaults::default(),
            rebuild_each_change: false,
        }
    }
}

impl RunConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` if the text is not valid for this schema
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse` if invalid
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// With working root
    #[inline]
    #[must_use]
    pub fn with_working_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.working_root = root.into();
        self
    }

    /// With output root
    #[inline]
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// With cleanup policy
    #[inline]
    #[must_use]
    pub fn with_cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup = policy;
        self
    }

    /// With orphan sweep on start
    #[inline]
    #[must_use]
    pub fn with_sweep_on_start(mut self, enabled: bool) -> Self {
        self.sweep_on_start = enabled;
        self
    }

    /// With material database search path
    #[inline]
    #[must_use]
    pub fn with_material_databases(mut self, databases: Vec<PathBuf>) -> Self {
        self.material_databases = databases;
        self
    }

    /// With feature defaults
    #[inline]
    #[must_use]
    pub fn with_feature_defaults(mut self, defaults: FeatureDefaults) -> Self {
        self.feature_defaults = defaults;
        self
    }

    /// With per-change rebuilds
    #[inline]
    #[must_use]
    pub fn with_rebuild_each_change(mut self, enabled: bool) -> Self {
        self.rebuild_each_change = enabled;
        self
    }

    /// Directory committed assemblies are written under
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(&self.output_folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.workspace_prefix, "Temp_Assembly");
        assert_eq!(config.output_folder, "Modified_Assemblies");
        assert_eq!(config.cleanup.retry_delays_ms, vec![0, 1000, 1000]);
        assert_eq!(config.feature_defaults.chamfer_distance, 5.0);
        assert_eq!(config.feature_defaults.fillet_radius, 5.0);
        assert!(!config.rebuild_each_change);
        assert!(config.sweep_on_start);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            working_root = "/work"
            sweep_on_start = false

            [cleanup]
            retry_delays_ms = [0, 250]

            [feature_defaults]
            fillet_radius = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.working_root, PathBuf::from("/work"));
        assert!(!config.sweep_on_start);
        assert_eq!(config.cleanup.retry_delays_ms, vec![0, 250]);
        assert!(config.cleanup.rename_fallback);
        assert_eq!(config.feature_defaults.fillet_radius, 2.5);
        assert_eq!(config.feature_defaults.chamfer_angle, 45.0);
        assert_eq!(config.output_folder, "Modified_Assemblies");
    }

    #[test]
    fn rejects_wrong_types() {
        let err = RunConfig::from_toml_str("sweep_on_start = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadmod.toml");
        std::fs::write(&path, "output_folder = \"Out\"\n").unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.output_dir(), config.output_root.join("Out"));

        let missing = RunConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn builders_chain() {
        let config = RunConfig::new()
            .with_working_root("/w")
            .with_output_root("/o")
            .with_rebuild_each_change(true)
            .with_cleanup(CleanupPolicy::immediate(1));
        assert_eq!(config.output_dir(), PathBuf::from("/o/Modified_Assemblies"));
        assert_eq!(config.cleanup.attempts(), 1);
        assert!(config.rebuild_each_change);
    }
}
