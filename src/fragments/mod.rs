//! Per-race fragment loading.
//!
//! A fragment is one parser's JSON output for one race. Absence is a normal
//! state; a file that fails to parse is logged and treated as absent.

pub mod schedule;
pub mod shapes;

use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::IntegrateError;
use crate::race_id::RaceId;
use crate::types::{
    PaddockInfo, PreviousRaceInterview, SourceState, SourceStatus, StableComment, TrainingData,
};

pub use schedule::{ScheduleContext, ScheduleEntry};
pub use shapes::{EntriesFragment, KeyedRows, ResultFragment};

/// Fragment types produced by the page parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentKind {
    Entries,
    Training,
    StableComment,
    Result,
    Interview,
    Paddock,
}

impl FragmentKind {
    /// File name prefix used by the parsers
    pub fn file_prefix(&self) -> &'static str {
        match self {
            FragmentKind::Entries => "shutsuba",
            FragmentKind::Training => "cyokyo",
            FragmentKind::StableComment => "danwa",
            FragmentKind::Result => "seiseki",
            FragmentKind::Interview => "syoin",
            FragmentKind::Paddock => "paddok",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_prefix())
    }
}

/// Keyed store of raw fragments
pub trait FragmentSource: Send + Sync {
    /// Raw fragment, or `None` when absent or unreadable
    fn load(&self, race_id: &RaceId, kind: FragmentKind) -> Option<Value>;
}

/// Fragments stored as `{dir}/{prefix}_{race_id}.json`
pub struct JsonFragmentStore {
    base_dir: PathBuf,
}

impl JsonFragmentStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn fragment_path(&self, race_id: &RaceId, kind: FragmentKind) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}.json", kind.file_prefix(), race_id))
    }
}

impl FragmentSource for JsonFragmentStore {
    fn load(&self, race_id: &RaceId, kind: FragmentKind) -> Option<Value> {
        let path = self.fragment_path(race_id, kind);

        if !path.exists() {
            debug!("{} fragment absent for {}", kind, race_id);
            return None;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                let err = IntegrateError::CorruptFragment {
                    race_id: race_id.to_string(),
                    kind: kind.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                None
            }
        }
    }
}

/// All fragments for one race, adapted to canonical rows
#[derive(Debug, Clone, Default)]
pub struct FragmentSet {
    pub entries: Option<EntriesFragment>,
    pub training: Option<KeyedRows<TrainingData>>,
    pub stable_comments: Option<KeyedRows<StableComment>>,
    pub results: Option<ResultFragment>,
    pub interviews: Option<KeyedRows<PreviousRaceInterview>>,
    pub paddock: Option<KeyedRows<PaddockInfo>>,
}

impl FragmentSet {
    /// Load and adapt every fragment kind for `race_id`
    pub fn load(source: &dyn FragmentSource, race_id: &RaceId) -> Self {
        let raw = |kind| source.load(race_id, kind);

        Self {
            entries: raw(FragmentKind::Entries).map(|v| EntriesFragment::from_value(&v)),
            training: raw(FragmentKind::Training).map(|v| shapes::adapt_training(&v)),
            stable_comments: raw(FragmentKind::StableComment)
                .map(|v| shapes::adapt_stable_comments(&v)),
            results: raw(FragmentKind::Result).map(|v| ResultFragment::from_value(&v)),
            interviews: raw(FragmentKind::Interview).map(|v| shapes::adapt_interviews(&v)),
            paddock: raw(FragmentKind::Paddock).map(|v| shapes::adapt_paddock(&v)),
        }
    }

    /// Completion flags for the metadata block
    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            shutsuba: SourceState::from_present(self.entries.is_some()),
            cyokyo: SourceState::from_present(self.training.is_some()),
            danwa: SourceState::from_present(self.stable_comments.is_some()),
            seiseki: SourceState::from_present(self.results.is_some()),
            syoin: SourceState::from_present(self.interviews.is_some()),
            paddok: SourceState::from_present(self.paddock.is_some()),
        }
    }
}

/// In-memory fragments for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryFragments {
    pub fragments: std::collections::HashMap<(String, FragmentKind), Value>,
}

#[cfg(test)]
impl MemoryFragments {
    pub fn insert(&mut self, race_id: &str, kind: FragmentKind, value: Value) {
        self.fragments.insert((race_id.to_string(), kind), value);
    }
}

#[cfg(test)]
impl FragmentSource for MemoryFragments {
    fn load(&self, race_id: &RaceId, kind: FragmentKind) -> Option<Value> {
        self.fragments
            .get(&(race_id.to_string(), kind))
            .cloned()
    }
}
