//! The persisted ranked candidate list.
//!
//! Best candidate first. This is the only artifact the updater shares with
//! the forwarding proxy, so writes go through a temp file and a rename: a
//! reader must never observe a half-written list.

use crate::error::Error;
use crate::instance::Candidate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One persisted entry: endpoint identity plus composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub url: String,
    pub score: f64,
}

/// Ordered candidate list, best first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RankedList {
    pub candidates: Vec<RankedEntry>,
}

impl RankedList {
    /// Build from scored candidates, preserving their order.
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        Self {
            candidates: candidates
                .iter()
                .map(|c| RankedEntry {
                    url: c.instance.url.clone(),
                    score: c.score,
                })
                .collect(),
        }
    }

    /// A single-entry list pointing at the fallback instance.
    pub fn fallback(default_url: &str) -> Self {
        Self {
            candidates: vec![RankedEntry {
                url: default_url.to_string(),
                score: 0.0,
            }],
        }
    }

    pub fn best(&self) -> Option<&RankedEntry> {
        self.candidates.first()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Write the list atomically: serialize to a sibling temp file, then
    /// rename over the destination.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp: PathBuf = path.to_path_buf();
        tmp.set_extension("tmp");

        let body = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Consumer-side read: when no list has been persisted yet, fall back to
    /// the configured default instance with score 0.
    pub fn load_or_default(path: &Path, default_url: &str) -> Self {
        match Self::load(path) {
            Ok(list) if !list.is_empty() => list,
            Ok(_) => {
                warn!("Ranked list at {} is empty, using default instance", path.display());
                Self::fallback(default_url)
            }
            Err(e) => {
                warn!(
                    "No usable ranked list at {} ({}), using default instance. Is the updater running?",
                    path.display(),
                    e
                );
                Self::fallback(default_url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use crate::timings::{Timing, Timings};

    fn candidate(url: &str, score: f64) -> Candidate {
        Candidate {
            instance: Instance {
                url: url.to_string(),
                timings: Timings::new(
                    Timing::Measured(0.1),
                    Timing::Measured(0.1),
                    Timing::Measured(0.1),
                    Timing::Measured(0.1),
                ),
            },
            score,
        }
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.json");

        let list = RankedList::from_candidates(&[
            candidate("https://a.example", 0.42),
            candidate("https://b.example", 1.17),
        ]);
        list.save(&path).unwrap();

        let loaded = RankedList::load(&path).unwrap();
        assert_eq!(loaded, list);
        assert_eq!(loaded.best().unwrap().url, "https://a.example");
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.json");
        RankedList::fallback("https://x.example").save(&path).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("candidates.json")]);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let list = RankedList::load_or_default(&path, "https://paulgo.io");
        assert_eq!(list.len(), 1);
        assert_eq!(list.best().unwrap().url, "https://paulgo.io");
        assert_eq!(list.best().unwrap().score, 0.0);
    }

    #[test]
    fn test_load_or_default_ignores_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.json");
        RankedList::default().save(&path).unwrap();
        let list = RankedList::load_or_default(&path, "https://paulgo.io");
        assert_eq!(list.best().unwrap().url, "https://paulgo.io");
    }
}
