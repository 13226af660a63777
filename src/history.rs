//! Per-horse accumulated history lookup.
//!
//! Horse profiles are accumulated by a separate pipeline under
//! `{accumulated_dir}/horses/{horse_id}.json`; only their
//! `history_features` block is read here.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::types::HistoryFeatures;

/// Read-only source of history features keyed by horse id
pub trait HistorySource: Send + Sync {
    fn history_features(&self, horse_id: &str) -> Option<HistoryFeatures>;
}

/// Source with no data, used when no store is configured
pub struct NoHistory;

impl HistorySource for NoHistory {
    fn history_features(&self, _horse_id: &str) -> Option<HistoryFeatures> {
        None
    }
}

#[derive(Deserialize)]
struct HorseProfile {
    #[serde(default)]
    history_features: Option<HistoryFeatures>,
}

/// Accumulated horse profiles on disk
pub struct AccumulatedHorseStore {
    base_dir: PathBuf,
}

impl AccumulatedHorseStore {
    pub fn new(accumulated_dir: PathBuf) -> Self {
        Self {
            base_dir: accumulated_dir.join("horses"),
        }
    }

    fn profile_path(&self, horse_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", horse_id))
    }
}

impl HistorySource for AccumulatedHorseStore {
    fn history_features(&self, horse_id: &str) -> Option<HistoryFeatures> {
        if horse_id.is_empty() || horse_id.contains(['/', '\\']) || horse_id.contains("..") {
            return None;
        }

        let path = self.profile_path(horse_id);
        if !path.exists() {
            debug!("No accumulated profile for horse {}", horse_id);
            return None;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read horse profile {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<HorseProfile>(&content) {
            Ok(profile) => profile.history_features,
            Err(e) => {
                warn!("Failed to parse horse profile {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Fixed features for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryHistory {
    pub features: std::collections::HashMap<String, HistoryFeatures>,
}

#[cfg(test)]
impl HistorySource for MemoryHistory {
    fn history_features(&self, horse_id: &str) -> Option<HistoryFeatures> {
        self.features.get(horse_id).cloned()
    }
}
