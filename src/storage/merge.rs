//! Merge-on-write for integrated race files.
//!
//! Rules, applied recursively at the JSON value level:
//! - a fresh non-empty value replaces the existing one
//! - a fresh `null` or empty string never erases existing data
//! - keys only present in the existing file are kept
//! - `entries` arrays merge element-wise by `horse_number`
//! - `meta.created_at` keeps its original value
//! - `meta.data_sources` flags stay `present` once present
//! - `analysis` is recomputed over the merged `entries`

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::integrator::assembler::analyze;
use crate::types::{HorseRecord, RaceRecord};

const PRESENT: &str = "present";

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn horse_number_of(value: &Value) -> Option<u64> {
    value.get("horse_number").and_then(Value::as_u64)
}

fn merge_entries(existing: &mut Vec<Value>, fresh: Vec<Value>) {
    for horse in fresh {
        let slot = match horse_number_of(&horse) {
            Some(n) => existing.iter_mut().find(|e| horse_number_of(e) == Some(n)),
            None => None,
        };
        match slot {
            Some(current) => merge_value(current, horse),
            None => existing.push(horse),
        }
    }
    existing.sort_by_key(|e| horse_number_of(e).unwrap_or(u64::MAX));
}

fn merge_object(existing: &mut Map<String, Value>, fresh: Map<String, Value>) {
    for (key, value) in fresh {
        match existing.get_mut(&key) {
            Some(current) => match (current, value) {
                (Value::Array(current_list), Value::Array(fresh_list)) if key == "entries" => {
                    merge_entries(current_list, fresh_list)
                }
                (current, value) => merge_value(current, value),
            },
            None => {
                existing.insert(key, value);
            }
        }
    }
}

/// Merge `fresh` into `existing` in place
pub fn merge_value(existing: &mut Value, fresh: Value) {
    if is_blank(&fresh) {
        return;
    }
    match (existing, fresh) {
        (Value::Object(current), Value::Object(incoming)) => merge_object(current, incoming),
        (slot, incoming) => *slot = incoming,
    }
}

/// Carry `created_at` and sticky source flags over from the existing file
fn restore_meta(merged: &mut Value, existing_meta: Option<&Value>) {
    let Some(old_meta) = existing_meta else { return };
    let Some(meta) = merged.get_mut("meta").and_then(Value::as_object_mut) else {
        return;
    };

    if let Some(created) = old_meta.get("created_at").filter(|v| !is_blank(v)) {
        meta.insert("created_at".to_string(), created.clone());
    }

    let old_sources = old_meta.get("data_sources").and_then(Value::as_object);
    let new_sources = meta.get_mut("data_sources").and_then(Value::as_object_mut);
    if let (Some(old_sources), Some(new_sources)) = (old_sources, new_sources) {
        for (kind, state) in old_sources {
            if state.as_str() == Some(PRESENT) {
                new_sources.insert(kind.clone(), Value::from(PRESENT));
            }
        }
    }
}

/// Rebuild `analysis` so it describes every horse kept in `entries`
fn refresh_analysis(merged: &mut Value) {
    let Some(entries) = merged.get("entries").cloned() else { return };
    match serde_json::from_value::<Vec<HorseRecord>>(entries) {
        Ok(horses) => match serde_json::to_value(analyze(&horses)) {
            Ok(analysis) => {
                if let Some(record) = merged.as_object_mut() {
                    record.insert("analysis".to_string(), analysis);
                }
            }
            Err(e) => debug!("Analysis not refreshed: {}", e),
        },
        Err(e) => debug!("Merged entries not in record shape, analysis kept: {}", e),
    }
}

/// Three-way merge of an existing persisted record with a freshly assembled one
pub fn merge_records(existing: Option<Value>, fresh: &RaceRecord) -> Result<Value> {
    let fresh = serde_json::to_value(fresh)?;
    let Some(mut merged) = existing.filter(Value::is_object) else {
        return Ok(fresh);
    };

    let existing_meta = merged.get("meta").cloned();
    merge_value(&mut merged, fresh);
    restore_meta(&mut merged, existing_meta.as_ref());
    refresh_analysis(&mut merged);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_scalars_win_and_nulls_keep() {
        let mut existing = json!({"venue": "東京", "distance": 1600, "weather": "晴"});
        merge_value(&mut existing, json!({"venue": "京都", "distance": null, "weather": ""}));
        assert_eq!(existing, json!({"venue": "京都", "distance": 1600, "weather": "晴"}));
    }

    #[test]
    fn test_existing_only_keys_preserved() {
        let mut existing = json!({"race_info": {"venue": "東京"}, "user_notes": "本命は3番"});
        merge_value(&mut existing, json!({"race_info": {"venue": "東京", "grade": "G1"}}));
        assert_eq!(existing["user_notes"], json!("本命は3番"));
        assert_eq!(existing["race_info"]["grade"], json!("G1"));
    }

    #[test]
    fn test_entries_merge_by_horse_number() {
        let mut existing = json!({"entries": [
            {"horse_number": 1, "result": {"finish_position": "1"}, "memo": "◎"},
            {"horse_number": 2, "result": null}
        ]});
        merge_value(
            &mut existing,
            json!({"entries": [
                {"horse_number": 2, "result": {"finish_position": "3"}},
                {"horse_number": 1, "result": null},
                {"horse_number": 3}
            ]}),
        );

        let entries = existing["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["result"]["finish_position"], json!("1"));
        assert_eq!(entries[0]["memo"], json!("◎"));
        assert_eq!(entries[1]["result"]["finish_position"], json!("3"));
        assert_eq!(entries[2]["horse_number"], json!(3));
    }

    #[test]
    fn test_analysis_covers_kept_horses() {
        let race: crate::race_id::RaceId = "202505040511".parse().unwrap();
        let merger = crate::integrator::HorseMerger::new(None, &crate::history::NoHistory);
        let assemble = |horses: Value| {
            let mut mem = crate::fragments::MemoryFragments::default();
            mem.insert("202505040511", crate::fragments::FragmentKind::Entries, horses);
            let fragments = crate::fragments::FragmentSet::load(&mem, &race);
            crate::integrator::assemble_race(&race, &fragments, None, &merger).unwrap()
        };

        let earlier = assemble(json!({"horses": [
            {"馬番": "1", "馬名": "イチ", "人気": "1"},
            {"馬番": "2", "馬名": "ニ", "人気": "2"}
        ]}));
        let later = assemble(json!({"horses": [{"馬番": "1", "馬名": "イチ", "人気": "1"}]}));
        assert_eq!(later.analysis.entry_count, 1);

        let existing = merge_records(None, &earlier).unwrap();
        let merged = merge_records(Some(existing), &later).unwrap();

        assert_eq!(merged["entries"].as_array().unwrap().len(), 2);
        assert_eq!(merged["analysis"]["entry_count"], json!(2));
        assert_eq!(merged["analysis"]["favorites"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_restore_meta() {
        let old_meta = json!({
            "created_at": "2025-05-03T10:00:00+09:00",
            "data_sources": {"shutsuba": "present", "seiseki": "present", "cyokyo": "absent"}
        });
        let mut merged = json!({"meta": {
            "created_at": "2025-05-04T18:00:00+09:00",
            "data_sources": {"shutsuba": "present", "seiseki": "absent", "cyokyo": "present"}
        }});
        restore_meta(&mut merged, Some(&old_meta));

        assert_eq!(merged["meta"]["created_at"], json!("2025-05-03T10:00:00+09:00"));
        assert_eq!(merged["meta"]["data_sources"]["seiseki"], json!("present"));
        assert_eq!(merged["meta"]["data_sources"]["cyokyo"], json!("present"));
    }
}
