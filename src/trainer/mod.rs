//! Trainer reconciliation index.
//!
//! Maps the site's local trainer identifiers to official trainer codes,
//! affiliation and commentary. Built offline by [`builder`], consumed
//! read-only by the horse merger.

pub mod builder;
pub mod directory;
pub mod lookup;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub use directory::TrainerDirectory;
pub use lookup::find_trainer;

pub const MIHO: &str = "美浦";
pub const RITTO: &str = "栗東";
pub const UNKNOWN_AFFILIATION: &str = "不明";

/// Affiliation label, folded to one of the three known values
pub fn normalize_affiliation(raw: &str) -> String {
    match raw.trim() {
        MIHO => MIHO.to_string(),
        RITTO => RITTO.to_string(),
        _ => UNKNOWN_AFFILIATION.to_string(),
    }
}

/// One trainer as known to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerIndexEntry {
    #[serde(alias = "jvn_code")]
    pub official_code: String,
    pub name: String,
    #[serde(alias = "tozai", default = "default_affiliation")]
    pub affiliation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_affiliation() -> String {
    UNKNOWN_AFFILIATION.to_string()
}

impl TrainerIndexEntry {
    pub fn comment_len(&self) -> usize {
        self.comment.as_deref().map(|c| c.chars().count()).unwrap_or(0)
    }

    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Persisted index keyed by local trainer id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainerIndex {
    entries: BTreeMap<String, TrainerIndexEntry>,
}

impl TrainerIndex {
    pub fn new(entries: BTreeMap<String, TrainerIndexEntry>) -> Self {
        Self { entries }
    }

    /// Load the persisted index; a missing file yields an empty index
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Trainer index not found at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trainer index {}", path.display()))?;
        let index: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse trainer index {}", path.display()))?;

        info!("Loaded trainer index: {} entries", index.len());
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write trainer index {}", path.display()))?;
        Ok(())
    }

    /// Resolve a local id or trainer name
    pub fn find(&self, query: &str) -> Option<&TrainerIndexEntry> {
        find_trainer(query, &self.entries)
    }

    pub fn entries(&self) -> &BTreeMap<String, TrainerIndexEntry> {
        &self.entries
    }

    pub fn into_entries(self) -> BTreeMap<String, TrainerIndexEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
