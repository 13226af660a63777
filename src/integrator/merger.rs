//! Per-horse merge.
//!
//! One entry-list row plus whatever the other fragments say about the same
//! horse number becomes one [`HorseRecord`]. Every optional block degrades to
//! `None` on its own.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::fragments::FragmentSet;
use crate::history::HistorySource;
use crate::marks::{aggregate_points, collect_marks};
use crate::normalize::{first_text, first_u32, Row};
use crate::trainer::TrainerIndex;
use crate::types::{EntryData, HorseRecord};

// Entry-row synonyms, first non-empty wins
const HORSE_NAME: &[&str] = &["馬 名", "馬名_clean", "馬名", "horse_name"];
const HORSE_ID: &[&str] = &["umacd", "horse_id"];
const WEIGHT: &[&str] = &["重量", "斤量", "weight"];
const WEIGHT_DIFF: &[&str] = &["増減", "weight_diff"];
const JOCKEY: &[&str] = &["騎手", "騎\u{2003}手", "騎 手", "jockey"];
const TRAINER: &[&str] = &["厩舎", "厩\u{2003}舎", "厩 舎", "trainer"];
const SHORT_COMMENT: &[&str] = &["短評", "短\u{2003}評", "短 評", "short_comment"];
const ODDS: &[&str] = &["単勝", "odds"];
const ODDS_RANK: &[&str] = &["人気", "odds_rank"];
const AGE: &[&str] = &["性齢", "age"];
const WAKU: &[&str] = &["枠番", "waku"];
const RATING: &[&str] = &["レイティング", "rating"];
const HORSE_WEIGHT: &[&str] = &["馬体重(kg)", "horse_weight"];
const HONSHI_MARK: &[&str] = &["本誌印", "本誌", "本紙"];
const FALLBACK_AGGREGATE: &[&str] = &["総合印ポイント", "本誌印ポイント"];

fn artifact_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\x{FFFD}[A-Za-z0-9@]?|[\x00-\x08\x0B-\x1F\x7F]").expect("static artifact pattern")
    })
}

/// Strip replacement-character artifacts and control characters (newline and tab survive)
pub fn clean_trainer_comment(raw: &str) -> String {
    artifact_regex().replace_all(raw, "").trim().to_string()
}

fn optional_text(row: &Row, keys: &[&str]) -> Option<String> {
    Some(first_text(row, keys)).filter(|s| !s.is_empty())
}

/// Merges one horse at a time against injected read-only lookups
pub struct HorseMerger<'a> {
    trainer_index: Option<&'a TrainerIndex>,
    history: &'a dyn HistorySource,
}

impl<'a> HorseMerger<'a> {
    pub fn new(trainer_index: Option<&'a TrainerIndex>, history: &'a dyn HistorySource) -> Self {
        Self {
            trainer_index,
            history,
        }
    }

    fn entry_data(&self, row: &Row) -> EntryData {
        let marks_by_person = collect_marks(row);
        let aggregate_mark_point = if marks_by_person.is_empty() {
            first_u32(row, FALLBACK_AGGREGATE).unwrap_or(0)
        } else {
            aggregate_points(&marks_by_person)
        };

        let ai_index = first_text(row, &["AI指数"]);

        EntryData {
            weight: first_text(row, WEIGHT),
            weight_diff: first_text(row, WEIGHT_DIFF),
            jockey: first_text(row, JOCKEY),
            trainer: first_text(row, TRAINER),
            trainer_id: optional_text(row, &["trainer_id"]),
            trainer_link: optional_text(row, &["trainer_link"]),
            trainer_tozai: None,
            trainer_comment: None,
            owner: first_text(row, &["owner", "馬主"]),
            short_comment: first_text(row, SHORT_COMMENT),
            odds: first_text(row, ODDS),
            odds_rank: first_u32(row, ODDS_RANK),
            ai_index: if ai_index.is_empty() { "-".to_string() } else { ai_index },
            ai_rank: first_text(row, &["AI指数ランク"]),
            popularity_index: first_text(row, &["人気指数"]),
            age: first_text(row, AGE),
            sex: first_text(row, &["sex"]),
            waku: first_text(row, WAKU),
            rating: first_text(row, RATING),
            horse_weight: first_text(row, HORSE_WEIGHT),
            father: first_text(row, &["father"]),
            mother: first_text(row, &["mother"]),
            mother_father: first_text(row, &["mother_father"]),
            honshi_mark: first_text(row, HONSHI_MARK),
            mark_point: first_u32(row, &["本誌印ポイント"]).unwrap_or(0),
            marks_by_person,
            aggregate_mark_point,
        }
    }

    /// Fill affiliation and commentary from the trainer index
    fn enrich_trainer(&self, entry: &mut EntryData) {
        let (Some(index), Some(trainer_id)) = (self.trainer_index, entry.trainer_id.as_deref()) else {
            return;
        };

        match index.find(trainer_id) {
            Some(found) => {
                entry.trainer_tozai = Some(found.affiliation.clone());
                entry.trainer_comment = found
                    .comment
                    .as_deref()
                    .map(clean_trainer_comment)
                    .filter(|c| !c.is_empty());
            }
            None => debug!("Trainer {} not in index", trainer_id),
        }
    }

    /// Merge every source for one horse
    pub fn merge_horse(&self, horse_number: u32, entry_row: &Row, fragments: &FragmentSet) -> HorseRecord {
        let mut entry_data = self.entry_data(entry_row);
        self.enrich_trainer(&mut entry_data);

        let horse_id = optional_text(entry_row, HORSE_ID);
        let history_features = horse_id
            .as_deref()
            .and_then(|id| self.history.history_features(id));

        HorseRecord {
            horse_number,
            horse_name: first_text(entry_row, HORSE_NAME),
            horse_id,
            entry_data,
            training_data: fragments
                .training
                .as_ref()
                .and_then(|rows| rows.find(horse_number))
                .cloned(),
            stable_comment: fragments
                .stable_comments
                .as_ref()
                .and_then(|rows| rows.find(horse_number))
                .cloned(),
            result: fragments
                .results
                .as_ref()
                .and_then(|r| r.rows.find(horse_number))
                .cloned(),
            previous_race_interview: fragments
                .interviews
                .as_ref()
                .and_then(|rows| rows.find(horse_number))
                .cloned(),
            paddock_info: fragments
                .paddock
                .as_ref()
                .and_then(|rows| rows.find(horse_number))
                .cloned(),
            history_features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::{shapes, ResultFragment};
    use crate::history::{MemoryHistory, NoHistory};
    use crate::trainer::TrainerIndexEntry;
    use crate::types::HistoryFeatures;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().unwrap().clone()
    }

    fn trainer_index(comment: &str) -> TrainerIndex {
        let mut entries = BTreeMap::new();
        entries.insert(
            "ﾐ052".to_string(),
            TrainerIndexEntry {
                official_code: "01120".to_string(),
                name: "堀内岳志".to_string(),
                affiliation: "美浦".to_string(),
                comment: Some(comment.to_string()),
            },
        );
        TrainerIndex::new(entries)
    }

    #[test]
    fn test_entry_synonyms() {
        let entry = row(json!({
            "馬番": "3",
            "馬名": "サンプルホース",
            "騎\u{2003}手": "ルメール",
            "厩 舎": "美堀内",
            "重量": "",
            "weight": "57",
            "単勝": "3.4",
            "人気": "1",
            "umacd": "0931234"
        }));
        let merger = HorseMerger::new(None, &NoHistory);
        let horse = merger.merge_horse(3, &entry, &FragmentSet::default());

        assert_eq!(horse.horse_name, "サンプルホース");
        assert_eq!(horse.horse_id.as_deref(), Some("0931234"));
        assert_eq!(horse.entry_data.jockey, "ルメール");
        assert_eq!(horse.entry_data.trainer, "美堀内");
        assert_eq!(horse.entry_data.weight, "57");
        assert_eq!(horse.entry_data.odds_rank, Some(1));
        assert_eq!(horse.entry_data.ai_index, "-");
        assert!(horse.training_data.is_none());
        assert!(horse.result.is_none());
        assert!(horse.history_features.is_none());
    }

    #[test]
    fn test_marks_aggregate() {
        let entry = row(json!({"marks_by_person": {"A": "◎", "B": "○", "C": ""}}));
        let horse = HorseMerger::new(None, &NoHistory).merge_horse(1, &entry, &FragmentSet::default());
        assert_eq!(horse.entry_data.aggregate_mark_point, 13);
        assert_eq!(horse.entry_data.marks_by_person["C"], "無印");
    }

    #[test]
    fn test_aggregate_fallback_to_producer_points() {
        let entry = row(json!({"総合印ポイント": 11}));
        let horse = HorseMerger::new(None, &NoHistory).merge_horse(1, &entry, &FragmentSet::default());
        assert_eq!(horse.entry_data.aggregate_mark_point, 11);
    }

    #[test]
    fn test_trainer_enrichment() {
        let index = trainer_index("坂路\u{FFFD}Aで\u{0007}仕上げ\n順調");
        let entry = row(json!({"trainer_id": "ﾐ052", "厩舎": "美堀内"}));
        let horse = HorseMerger::new(Some(&index), &NoHistory).merge_horse(1, &entry, &FragmentSet::default());

        assert_eq!(horse.entry_data.trainer_tozai.as_deref(), Some("美浦"));
        assert_eq!(horse.entry_data.trainer_comment.as_deref(), Some("坂路で仕上げ\n順調"));
    }

    #[test]
    fn test_unknown_trainer_leaves_fields_empty() {
        let index = trainer_index("x");
        let entry = row(json!({"trainer_id": "ｸ999"}));
        let horse = HorseMerger::new(Some(&index), &NoHistory).merge_horse(1, &entry, &FragmentSet::default());
        assert!(horse.entry_data.trainer_tozai.is_none());
        assert!(horse.entry_data.trainer_comment.is_none());
    }

    #[test]
    fn test_sub_fragments_matched_by_number() {
        let fragments = FragmentSet {
            training: Some(shapes::adapt_training(&json!({"training_data": [{"馬番": "２", "評価": "A"}]}))),
            results: Some(ResultFragment::from_value(&json!({"results": [{"horse_number": 1, "着順": "1"}]}))),
            ..Default::default()
        };
        let merger = HorseMerger::new(None, &NoHistory);

        let two = merger.merge_horse(2, &Row::new(), &fragments);
        assert_eq!(two.training_data.unwrap().evaluation, "A");
        assert!(two.result.is_none());

        let one = merger.merge_horse(1, &Row::new(), &fragments);
        assert!(one.training_data.is_none());
        assert_eq!(one.result.unwrap().finish_position, "1");
    }

    #[test]
    fn test_history_by_horse_id() {
        let mut history = MemoryHistory::default();
        history.features.insert(
            "0931234".to_string(),
            HistoryFeatures {
                passing_style: Some("差し".to_string()),
                ..Default::default()
            },
        );
        let entry = row(json!({"horse_id": "0931234"}));
        let horse = HorseMerger::new(None, &history).merge_horse(1, &entry, &FragmentSet::default());
        assert_eq!(horse.history_features.unwrap().passing_style.as_deref(), Some("差し"));
    }

    #[test]
    fn test_clean_trainer_comment() {
        assert_eq!(clean_trainer_comment("良い\u{FFFD}@仕上がり"), "良い仕上がり");
        assert_eq!(clean_trainer_comment("\u{FFFD}"), "");
        assert_eq!(clean_trainer_comment("a\tb\r\nc"), "a\tb\nc");
    }
}
