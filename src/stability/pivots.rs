use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PivotSet {
    ids: BTreeSet<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PivotConfig {
    #[serde(default)]
    pivots: Vec<String>,
}

impl PivotSet {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no pivot configuration, nothing is pinned");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read pivots from {}", path.display()));
            }
        };

        let config: PivotConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid pivot configuration in {}", path.display()))?;
        Ok(config.pivots.into_iter().collect())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl FromIterator<String> for PivotSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_pivot_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pivots.json");
        fs::write(&path, r#"{ "pivots": ["athanor", " mercure ", ""] }"#).expect("write");

        let pivots = PivotSet::load(&path).expect("loads");
        assert_eq!(pivots.len(), 2);
        assert!(pivots.contains("mercure"));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pivots = PivotSet::load(&dir.path().join("absent.json")).expect("loads");
        assert_eq!(pivots.len(), 0);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pivots.json");
        fs::write(&path, "{ pivots: oops").expect("write");
        assert!(PivotSet::load(&path).is_err());
    }
}
