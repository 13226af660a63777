//! Incremental trainer index construction.
//!
//! Layers, highest trust first: the official CSV table, manual mappings, the
//! previously persisted index, then `(local id, name)` pairs observed in
//! recently integrated races. A local id is never overwritten by a lower
//! layer; commentary is the one field that may grow, longest text winning.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use super::{find_trainer, TrainerDirectory, TrainerIndex, TrainerIndexEntry};
use crate::normalize::normalize_person_name;
use crate::storage::collect_integrated_files;

/// A local trainer id seen next to a trainer name on an entry row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTrainer {
    pub local_id: String,
    pub name: String,
}

/// Counts reported after a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub manual: usize,
    pub existing: usize,
    pub observed_added: usize,
    pub observed_unmatched: usize,
    pub comments_from_csv: usize,
}

/// Newest `limit` integrated race files under `races_dir`, by mtime
pub fn recent_integrated_files(races_dir: &Path, limit: usize) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_integrated_files(races_dir, &mut files);

    let mut stamped: Vec<(SystemTime, PathBuf)> = files
        .into_iter()
        .map(|p| {
            let mtime = std::fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (mtime, p)
        })
        .collect();
    stamped.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    stamped.into_iter().take(limit).map(|(_, p)| p).collect()
}

/// Trainer id/name pairs from one integrated record
pub fn observed_in_record(record: &Value) -> Vec<ObservedTrainer> {
    let Some(entries) = record.get("entries").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|horse| {
            let entry = horse.get("entry_data")?;
            let local_id = entry.get("trainer_id")?.as_str()?.trim();
            let name = entry.get("trainer")?.as_str()?.trim();
            if local_id.is_empty() || name.is_empty() {
                return None;
            }
            Some(ObservedTrainer {
                local_id: local_id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Observed pairs from the newest integrated files; unreadable files are skipped
pub fn harvest_observed(races_dir: &Path, limit: usize) -> Vec<ObservedTrainer> {
    let mut observed = Vec::new();
    for path in recent_integrated_files(races_dir, limit) {
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str::<Value>(&s).map_err(anyhow::Error::from));
        match parsed {
            Ok(record) => {
                debug!("Harvesting trainers from {}", path.display());
                observed.extend(observed_in_record(&record));
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    observed
}

/// Resolve an observed trainer name to an official entry.
///
/// The CSV table is tried first by prefix-stripped name equality or
/// containment, then the fuzzy lookup runs over the table keyed by code and name.
pub fn resolve_observed(
    name: &str,
    directory: &TrainerDirectory,
    lookup_table: &BTreeMap<String, TrainerIndexEntry>,
) -> Option<TrainerIndexEntry> {
    let stripped = normalize_person_name(name.trim());
    if !stripped.is_empty() {
        let by_csv = directory.iter().find(|csv| {
            let csv_name = normalize_person_name(csv.name.trim());
            !csv_name.is_empty()
                && (csv_name == stripped || csv_name.contains(&stripped) || stripped.contains(&csv_name))
        });
        if let Some(csv) = by_csv {
            return Some(csv.clone());
        }
    }

    let mut found = find_trainer(name, lookup_table)?.clone();
    if let Some(csv) = directory.get(&found.official_code) {
        found.comment = csv.comment.clone();
    }
    Some(found)
}

fn keep_longer_comment(target: &mut TrainerIndexEntry, candidate: &TrainerIndexEntry) -> bool {
    if candidate.has_comment() && candidate.comment_len() > target.comment_len() {
        target.comment = candidate.comment.clone();
        true
    } else {
        false
    }
}

/// Merge all layers into a fresh index
pub fn build_index(
    directory: &TrainerDirectory,
    manual: &TrainerIndex,
    existing: &TrainerIndex,
    observed: &[ObservedTrainer],
) -> (TrainerIndex, BuildStats) {
    let mut stats = BuildStats::default();
    let mut index: BTreeMap<String, TrainerIndexEntry> = BTreeMap::new();

    for (local_id, entry) in manual.entries() {
        if !index.contains_key(local_id) {
            index.insert(local_id.clone(), entry.clone());
            stats.manual += 1;
        }
    }

    for (local_id, entry) in existing.entries() {
        if index.contains_key(local_id) {
            continue;
        }
        let mut entry = entry.clone();
        if !entry.has_comment() {
            if let Some(csv) = directory.get(&entry.official_code) {
                entry.comment = csv.comment.clone();
            }
        }
        index.insert(local_id.clone(), entry);
        stats.existing += 1;
    }

    let lookup_table = directory.lookup_table();
    for obs in observed {
        let Some(fresh) = resolve_observed(&obs.name, directory, &lookup_table) else {
            debug!("No official trainer for {} ({})", obs.local_id, obs.name);
            stats.observed_unmatched += 1;
            continue;
        };
        match index.get_mut(&obs.local_id) {
            Some(current) => {
                keep_longer_comment(current, &fresh);
            }
            None => {
                debug!("{} ({}) -> {} ({})", obs.local_id, obs.name, fresh.name, fresh.official_code);
                index.insert(obs.local_id.clone(), fresh);
                stats.observed_added += 1;
            }
        }
    }

    for entry in index.values_mut() {
        if let Some(csv) = directory.get(&entry.official_code) {
            if keep_longer_comment(entry, csv) {
                stats.comments_from_csv += 1;
            }
        }
    }

    (TrainerIndex::new(index), stats)
}

/// File locations used by a full rebuild
#[derive(Debug, Clone)]
pub struct BuildInputs {
    pub trainer_csv: PathBuf,
    pub manual_mappings: PathBuf,
    pub existing_index: PathBuf,
    pub races_dir: PathBuf,
    pub observed_file_limit: usize,
}

/// Load every layer from disk and build
pub fn rebuild_from_disk(inputs: &BuildInputs) -> Result<(TrainerIndex, BuildStats)> {
    let directory = TrainerDirectory::load_csv(&inputs.trainer_csv)?;
    let manual = TrainerIndex::load(&inputs.manual_mappings).context("Failed to load manual mappings")?;
    let existing = TrainerIndex::load(&inputs.existing_index)?;
    let observed = harvest_observed(&inputs.races_dir, inputs.observed_file_limit);
    info!(
        "Index inputs: {} CSV trainers, {} manual, {} existing, {} observed pairs",
        directory.len(),
        manual.len(),
        existing.len(),
        observed.len()
    );

    Ok(build_index(&directory, &manual, &existing, &observed))
}
