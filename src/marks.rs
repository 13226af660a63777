//! Mark-point aggregation.
//!
//! Each marker (a tipster column on the entry list) gives a horse one symbolic
//! mark. Marks convert to fixed points and sum into the aggregate score.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::normalize::{is_empty_value, text_of, Row};

/// Symbol → points, checked in this order
pub const MARK_POINTS: [(&str, u32); 7] = [
    ("◎", 8),
    ("○", 5),
    ("▲", 3),
    ("△", 2),
    ("穴", 1),
    ("注", 1),
    ("×", 0),
];

/// Label recorded for a marker column present but left blank
pub const NO_MARK: &str = "無印";

/// Marker label → source column synonyms, in priority order
const MARKER_SOURCES: [(&str, &[&str]); 6] = [
    ("CPU", &["CPU", "ＣＰＵ"]),
    ("本誌", &["本誌", "本紙", "本誌見解", "本紙見解"]),
    ("牟田雅", &["牟田雅", "牟田"]),
    ("西村敬", &["西村敬", "西村"]),
    ("広瀬健", &["広瀬健", "広瀬"]),
    ("予想1", &["印", "印_2", "印_3", "印_4"]),
];

/// Most markers considered per entry row
pub const MAX_MARKERS: usize = 7;

/// Entry columns never read as marker columns
const NON_MARKER_KEYS: [&str; 6] = ["馬番", "馬名", "馬名_clean", "単勝", "人気", "枠番"];

fn has_mark_symbol(text: &str) -> bool {
    MARK_POINTS.iter().any(|(symbol, _)| text.contains(symbol))
}

/// Points for one mark text; blank or unrecognized marks score zero
pub fn mark_point(mark: &str) -> u32 {
    let mark = mark.trim();
    if mark.is_empty() {
        return 0;
    }
    MARK_POINTS
        .iter()
        .find(|(symbol, _)| mark.contains(symbol))
        .map(|(_, p)| *p)
        .unwrap_or(0)
}

/// Rounded, non-negative sum of points across all markers
pub fn aggregate_points(marks: &BTreeMap<String, String>) -> u32 {
    let total: f64 = marks.values().map(|m| mark_point(m) as f64).sum();
    total.round().max(0.0) as u32
}

/// Collect marks for one entry row.
///
/// A producer-supplied `marks_by_person` object wins. Otherwise the known
/// marker columns are harvested first, then any other column holding a mark
/// symbol, up to [`MAX_MARKERS`] in total.
pub fn collect_marks(row: &Row) -> BTreeMap<String, String> {
    if let Some(Value::Object(map)) = row.get("marks_by_person") {
        return map
            .iter()
            .map(|(label, v)| {
                let mark = text_of(v);
                let mark = if mark.is_empty() { NO_MARK.to_string() } else { mark };
                (label.clone(), mark)
            })
            .collect();
    }

    let mut marks = BTreeMap::new();
    for (label, keys) in MARKER_SOURCES {
        if let Some(value) = keys.iter().find_map(|k| row.get(*k)) {
            let mark = if is_empty_value(value) {
                NO_MARK.to_string()
            } else {
                text_of(value)
            };
            marks.insert(label.to_string(), mark);
        }
    }

    for (key, value) in row {
        if marks.len() >= MAX_MARKERS {
            break;
        }
        let Value::String(text) = value else { continue };
        let known = NON_MARKER_KEYS.contains(&key.as_str())
            || MARKER_SOURCES.iter().any(|(_, keys)| keys.contains(&key.as_str()));
        if known || marks.contains_key(key) || !has_mark_symbol(text) {
            continue;
        }
        marks.insert(key.clone(), text.trim().to_string());
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marks(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_aggregate_example() {
        let m = marks(&[("A", "◎"), ("B", "○"), ("C", "")]);
        assert_eq!(aggregate_points(&m), 13);
    }

    #[test]
    fn test_mark_point_table() {
        assert_eq!(mark_point("◎"), 8);
        assert_eq!(mark_point("▲"), 3);
        assert_eq!(mark_point("△"), 2);
        assert_eq!(mark_point("穴"), 1);
        assert_eq!(mark_point("×"), 0);
        assert_eq!(mark_point(NO_MARK), 0);
        assert_eq!(mark_point("?"), 0);
    }

    #[test]
    fn test_collect_from_marks_by_person() {
        let row = json!({"marks_by_person": {"CPU": "◎", "本誌": ""}, "本誌": "▲"});
        let collected = collect_marks(row.as_object().unwrap());
        assert_eq!(collected.get("CPU").map(String::as_str), Some("◎"));
        assert_eq!(collected.get("本誌").map(String::as_str), Some(NO_MARK));
        assert_eq!(aggregate_points(&collected), 8);
    }

    #[test]
    fn test_collect_from_columns() {
        let row = json!({"ＣＰＵ": "○", "本紙": "◎", "西村": "", "馬名": "テスト"});
        let collected = collect_marks(row.as_object().unwrap());
        assert_eq!(collected.len(), 3);
        assert_eq!(collected["CPU"], "○");
        assert_eq!(collected["本誌"], "◎");
        assert_eq!(collected["西村敬"], NO_MARK);
        assert_eq!(aggregate_points(&collected), 13);
    }

    #[test]
    fn test_other_marker_columns_harvested() {
        let row = json!({"CPU": "◎", "本誌": "○", "今井": "▲", "馬名": "◎スター", "単勝": "3.1"});
        let collected = collect_marks(row.as_object().unwrap());
        assert_eq!(collected.len(), 3);
        assert_eq!(collected["今井"], "▲");
        assert!(!collected.contains_key("馬名"));
        assert_eq!(aggregate_points(&collected), 16);
    }

    #[test]
    fn test_marker_harvest_stops_at_seven() {
        let row = json!({
            "CPU": "◎", "本誌": "○",
            "a": "▲", "b": "△", "c": "注", "d": "穴", "e": "▲", "f": "◎"
        });
        let collected = collect_marks(row.as_object().unwrap());
        assert_eq!(collected.len(), MAX_MARKERS);
        assert!(!collected.contains_key("f"));
        assert_eq!(aggregate_points(&collected), 8 + 5 + 3 + 2 + 1 + 1 + 3);
    }

    #[test]
    fn test_no_marks() {
        let row = json!({"馬名": "テスト"});
        assert!(collect_marks(row.as_object().unwrap()).is_empty());
    }
}
