//! Solvent-accessibility sidecar (`spec.md` §6.3).
//!
//! Grounded in `original_source/FindSDRs.c`'s `ReadPDBAsSA`: per-atom
//! accessibility is never computed in-process — an external tool is
//! invoked to write a sidecar file in the same atomic-record layout as the
//! input structure but with accessibility numbers carried in the
//! temperature-factor field. The sidecar is cached on disk next to (or
//! under) a configured temp directory, reused across loops of the same
//! structure, and removed on clean exit unless retention is requested,
//! exactly as `ReadPDBAsSA` checks for an existing `.sa` file before
//! shelling out and unlinks it afterwards unless `KeepSAFile` is set.

use crate::atom::Structure;
use crate::error::SdrError;
use crate::structure_io::read_structure;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Per-atom accessibility, keyed by the same serial-order index the parent
/// `Structure`'s `atoms` vector uses.
#[derive(Debug, Clone, Default)]
pub struct AccessibilityTable {
    values: HashMap<usize, f64>,
}

impl AccessibilityTable {
    pub fn get(&self, atom_index: usize) -> Option<f64> {
        self.values.get(&atom_index).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Abstracts over how the accessibility sidecar is obtained, so tests can
/// supply a deterministic fixture instead of shelling out (`spec.md` §9's
/// "abstract as an interface" redesign note).
pub trait AccessibilityProvider {
    fn sidecar_for(&self, structure_path: &Path) -> Result<AccessibilityTable, SdrError>;
}

/// Invokes a real external accessibility tool and caches its output next to
/// a configured temp directory.
pub struct SubprocessAccessibility {
    pub temp_dir: PathBuf,
    pub command: String,
    pub retain: bool,
}

impl SubprocessAccessibility {
    pub fn new(temp_dir: impl Into<PathBuf>, command: impl Into<String>, retain: bool) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            command: command.into(),
            retain,
        }
    }

    fn sidecar_path(&self, structure_path: &Path) -> PathBuf {
        let stem = structure_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "structure".to_string());
        self.temp_dir.join(format!("{stem}.sa"))
    }
}

impl AccessibilityProvider for SubprocessAccessibility {
    fn sidecar_for(&self, structure_path: &Path) -> Result<AccessibilityTable, SdrError> {
        let sa_path = self.sidecar_path(structure_path);
        let pre_existing = sa_path.exists();

        if !pre_existing {
            debug!(target: "accessibility", tool = %self.command, input = %structure_path.display(), "invoking solvent-accessibility tool");
            let status = Command::new(&self.command)
                .arg(structure_path)
                .arg(&sa_path)
                .status();

            match status {
                Ok(s) if s.success() => {}
                Ok(s) => {
                    warn!(target: "accessibility", code = ?s.code(), "accessibility tool exited non-zero");
                    return Err(SdrError::AccessibilityUnavailable(sa_path));
                }
                Err(e) => {
                    warn!(target: "accessibility", error = %e, "failed to spawn accessibility tool");
                    return Err(SdrError::AccessibilityUnavailable(sa_path));
                }
            }
        }

        let table = match read_structure(&sa_path) {
            Ok(structure) => table_from_structure(&structure),
            Err(e) => {
                warn!(target: "accessibility", error = %e, "could not parse accessibility sidecar");
                return Err(SdrError::AccessibilityUnavailable(sa_path));
            }
        };

        if !pre_existing && !self.retain {
            let _ = std::fs::remove_file(&sa_path);
        }

        Ok(table)
    }
}

/// Reads accessibility values directly out of the b-factor column of an
/// already-materialised sidecar structure, bypassing any subprocess
/// invocation. Used by tests and by callers that prepared the sidecar
/// themselves.
pub struct FixedAccessibility {
    table: AccessibilityTable,
}

impl FixedAccessibility {
    pub fn from_structure(structure: &Structure) -> Self {
        Self {
            table: table_from_structure(structure),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = (usize, f64)>) -> Self {
        Self {
            table: AccessibilityTable {
                values: values.into_iter().collect(),
            },
        }
    }
}

impl AccessibilityProvider for FixedAccessibility {
    fn sidecar_for(&self, _structure_path: &Path) -> Result<AccessibilityTable, SdrError> {
        Ok(self.table.clone())
    }
}

fn table_from_structure(structure: &Structure) -> AccessibilityTable {
    let values = structure
        .atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| (i, atom.bfactor))
        .collect();
    AccessibilityTable { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_provider_returns_configured_values() {
        let provider = FixedAccessibility::from_values([(0, 1.2), (1, 8.4)]);
        let table = provider.sidecar_for(Path::new("ignored.pdb")).unwrap();
        assert_eq!(table.get(0), Some(1.2));
        assert_eq!(table.get(1), Some(8.4));
        assert_eq!(table.get(2), None);
    }

    #[test]
    fn empty_table_reports_empty() {
        let table = AccessibilityTable::default();
        assert!(table.is_empty());
    }
}
