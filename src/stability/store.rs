use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::model::Position;

/// Keys are kept sorted so an unchanged store serializes to identical bytes. The store only
/// grows during builds; removing entries is the job of an explicit prune.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionStore {
    positions: BTreeMap<String, Position>,
}

impl PositionStore {
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "position store missing, starting empty");
                return Self::default();
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "position store unreadable, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&raw) {
            Ok(mut store) => {
                let before = store.len();
                store.positions.retain(|_, position| position.is_finite());
                if store.len() != before {
                    warn!(dropped = before - store.len(), "ignored non-finite stored positions");
                }
                debug!(path = %path.display(), entries = store.len(), "position store loaded");
                store
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "position store corrupt, starting empty");
                Self::default()
            }
        }
    }

    /// Writes through a temporary file in the destination directory and renames it into
    /// place, so a crash mid-write leaves the previous store intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize position store")?;
        write_atomically(path, json.as_bytes())
            .with_context(|| format!("failed to write position store {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn insert(&mut self, id: impl Into<String>, position: Position) {
        self.positions.insert(id.into(), position);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.positions.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create directory {}", directory.display()))?;

    let mut file = NamedTempFile::new_in(directory)
        .with_context(|| format!("failed to create temporary file in {}", directory.display()))?;
    file.write_all(bytes).context("failed to write temporary file")?;
    file.as_file().sync_all().context("failed to flush temporary file")?;
    file.persist(path)
        .map_err(|error| error.error)
        .with_context(|| format!("failed to move temporary file onto {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("positions.json");

        let mut store = PositionStore::default();
        store.insert("b", Position::new(3.0, 4.0));
        store.insert("a", Position::new(-1.25, 0.5));
        store.save(&path).expect("saves");

        let loaded = PositionStore::load(&path);
        assert_eq!(loaded, store);

        let raw = fs::read_to_string(&path).expect("readable");
        assert!(raw.find("\"a\"") < raw.find("\"b\""));
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(PositionStore::load(&dir.path().join("none.json")).is_empty());
    }

    #[test]
    fn corrupt_store_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.json");
        fs::write(&path, "{\"a\": {\"x\": 1").expect("write");
        assert!(PositionStore::load(&path).is_empty());
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.json");
        fs::write(&path, "stale").expect("write");

        let mut store = PositionStore::default();
        store.insert("x", Position::new(1.0, 2.0));
        store.save(&path).expect("saves");

        assert_eq!(PositionStore::load(&path).get("x"), Some(Position::new(1.0, 2.0)));
    }
}
