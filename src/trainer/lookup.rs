//! Exact-then-fuzzy trainer lookup.

use std::collections::BTreeMap;

use super::TrainerIndexEntry;
use crate::normalize::normalize_person_name;

/// Overlap score between a prefix-stripped query and a candidate name.
///
/// Longest of: query inside candidate, candidate inside query, candidate
/// ending with query, candidate starting with query. Lengths are in chars.
fn overlap_score(query: &str, candidate: &str) -> usize {
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }
    let query_len = query.chars().count();
    let candidate_len = candidate.chars().count();

    let mut score = 0;
    if candidate.contains(query) || candidate.ends_with(query) || candidate.starts_with(query) {
        score = score.max(query_len);
    }
    if query.contains(candidate) {
        score = score.max(candidate_len);
    }
    score
}

/// Keys that look like names rather than codes
fn is_name_key(key: &str) -> bool {
    key.chars().count() > 1 && !key.chars().all(|c| c.is_ascii_digit())
}

/// Find the index entry for a local id or trainer name.
///
/// Tries the raw query, then the prefix-stripped query, then a fuzzy pass over
/// name-like keys. Ties keep the first key in map order.
pub fn find_trainer<'a>(
    query: &str,
    index: &'a BTreeMap<String, TrainerIndexEntry>,
) -> Option<&'a TrainerIndexEntry> {
    if query.trim().is_empty() {
        return None;
    }

    if let Some(entry) = index.get(query) {
        return Some(entry);
    }

    let stripped = normalize_person_name(query.trim());
    if let Some(entry) = index.get(&stripped) {
        return Some(entry);
    }

    let mut best: Option<&TrainerIndexEntry> = None;
    let mut best_score = 0;
    for (key, entry) in index.iter().filter(|(k, _)| is_name_key(k)) {
        let score = overlap_score(&stripped, key);
        if score > best_score {
            best_score = score;
            best = Some(entry);
        }
    }
    best
}
