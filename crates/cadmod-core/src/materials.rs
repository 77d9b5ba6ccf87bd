//! Material name resolution
//!
//! Material databases are XML-like files with `name="..."` attributes. They
//! are searched in preference order; the first case-insensitive match wins
//! and yields the canonical spelling. Unresolved names are assigned as given.

use cadmod_bridge::MaterialAssignment;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Resolves material names against database files
#[derive(Debug, Clone)]
pub struct MaterialResolver {
    databases: Vec<PathBuf>,
    name_attr: Option<Regex>,
}

impl MaterialResolver {
    /// Resolver searching `databases` in order
    #[must_use]
    pub fn new(databases: Vec<PathBuf>) -> Self {
        Self {
            databases,
            name_attr: Regex::new(r#"name\s*=\s*"([^"]+)""#).ok(),
        }
    }

    /// Database files in preference order
    #[inline]
    #[must_use]
    pub fn databases(&self) -> &[PathBuf] {
        &self.databases
    }

    /// Resolve `requested` to an assignment; falls back to the raw name
    #[must_use]
    pub fn resolve(&self, requested: &str) -> MaterialAssignment {
        let wanted = requested.trim();
        for db in &self.databases {
            if let Some(name) = self.find_in(db, wanted) {
                tracing::debug!("Material '{}' resolved to '{}' in {}", wanted, name, db.display());
                return MaterialAssignment {
                    name,
                    database: Some(db.clone()),
                };
            }
        }
        tracing::debug!("Material '{}' not in any database, assigning as given", wanted);
        MaterialAssignment::raw(wanted)
    }

    fn find_in(&self, db: &Path, wanted: &str) -> Option<String> {
        let name_attr = self.name_attr.as_ref()?;
        let text = match std::fs::read_to_string(db) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Skipping material database {}: {}", db.display(), e);
                return None;
            }
        };
        name_attr
            .captures_iter(&text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|name| name.eq_ignore_ascii_case(wanted))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(dir: &Path, file: &str, names: &[&str]) -> PathBuf {
        let body: String = names
            .iter()
            .map(|n| format!("  <material name=\"{n}\" matid=\"1\"/>\n"))
            .collect();
        let path = dir.join(file);
        std::fs::write(&path, format!("<mstns:materials>\n{body}</mstns:materials>\n")).unwrap();
        path
    }

    #[test]
    fn case_insensitive_match_returns_canonical_name() {
        let dir = tempfile::tempdir().unwrap();
        let solid = db(dir.path(), "solid.sldmat", &["AISI 304", "6061-T6 (SS)"]);
        let resolver = MaterialResolver::new(vec![solid.clone()]);

        let found = resolver.resolve("aisi 304");
        assert_eq!(found.name, "AISI 304");
        assert_eq!(found.database, Some(solid));
    }

    #[test]
    fn preference_order_decides_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let custom = db(dir.path(), "custom.sldmat", &["Brass"]);
        let stock = db(dir.path(), "stock.sldmat", &["BRASS"]);
        let resolver = MaterialResolver::new(vec![custom.clone(), stock]);
        assert_eq!(resolver.resolve("brass").database, Some(custom));
    }

    #[test]
    fn unresolved_and_unreadable_fall_back_to_raw() {
        let dir = tempfile::tempdir().unwrap();
        let stock = db(dir.path(), "stock.sldmat", &["Brass"]);
        let resolver = MaterialResolver::new(vec![dir.path().join("missing.sldmat"), stock]);
        let found = resolver.resolve(" Unobtainium ");
        assert_eq!(found, MaterialAssignment::raw("Unobtainium"));
    }
}
