//! Fragment shape adapters.
//!
//! Each fragment kind has arrived in more than one layout as its parser
//! evolved. The untagged enums below recognise every known layout; the adapter
//! for each variant turns its rows into one canonical block keyed by horse
//! number, using that variant's synonym table. Nothing past this module looks
//! at raw keys except the entry rows themselves.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::normalize::{first_non_empty, first_text, normalize_horse_number, Row};
use crate::types::{PaddockInfo, PreviousRaceInterview, RaceResult, StableComment, TrainingData};

/// Keys that may carry a horse number in sub-fragment rows
pub const HORSE_NUMBER_KEYS: [&str; 2] = ["horse_number", "馬番"];

/// Canonical blocks keyed by canonical horse number, in source order
#[derive(Debug, Clone)]
pub struct KeyedRows<T> {
    rows: Vec<(u32, T)>,
}

impl<T> KeyedRows<T> {
    /// First block for `horse_number`
    pub fn find(&self, horse_number: u32) -> Option<&T> {
        self.rows
            .iter()
            .find(|(n, _)| *n == horse_number)
            .map(|(_, block)| block)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T> Default for KeyedRows<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

/// Adapt raw rows, dropping those whose horse number cannot be resolved
fn keyed<T>(kind: &str, rows: &[Value], adapt: impl Fn(&Row) -> T) -> KeyedRows<T> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows.iter().filter_map(Value::as_object) {
        match first_non_empty(row, &HORSE_NUMBER_KEYS).and_then(normalize_horse_number) {
            Some(n) => out.push((n, adapt(row))),
            None => debug!("{} row without resolvable horse number dropped", kind),
        }
    }
    KeyedRows { rows: out }
}

fn object_field(raw: &Value, key: &str) -> Option<Row> {
    raw.get(key).and_then(Value::as_object).cloned()
}

fn present_field(raw: &Value, key: &str) -> Option<Value> {
    raw.get(key).filter(|v| !v.is_null()).cloned()
}

// ==================== Entries ====================

#[derive(Deserialize)]
#[serde(untagged)]
enum EntriesShape {
    Horses { horses: Vec<Value> },
    Entries { entries: Vec<Value> },
}

/// Entry list: the spine of assembly
#[derive(Debug, Clone, Default)]
pub struct EntriesFragment {
    pub rows: Vec<Row>,
    pub race_info: Option<Row>,
    pub race_comment: Option<Value>,
    pub tenkai_data: Option<Value>,
}

impl EntriesFragment {
    pub fn from_value(raw: &Value) -> Self {
        let rows = match EntriesShape::deserialize(raw) {
            Ok(EntriesShape::Horses { horses: rows }) | Ok(EntriesShape::Entries { entries: rows }) => rows
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            Err(_) => {
                debug!("entry list has neither horses nor entries");
                Vec::new()
            }
        };

        Self {
            rows,
            race_info: object_field(raw, "race_info"),
            race_comment: present_field(raw, "race_comment"),
            tenkai_data: present_field(raw, "tenkai_data"),
        }
    }
}

// ==================== Training ====================

#[derive(Deserialize)]
#[serde(untagged)]
enum TrainingShape {
    Legacy { horses: Vec<Value> },
    Parsed { training_data: Vec<Value> },
}

/// Synonym table for one training layout
struct TrainingKeys {
    last_training: &'static [&'static str],
    course: &'static [&'static str],
    evaluation: &'static [&'static str],
    comment: &'static [&'static str],
    load: &'static [&'static str],
    rank: &'static [&'static str],
}

const LEGACY_TRAINING: TrainingKeys = TrainingKeys {
    last_training: &["last_training"],
    course: &["training_course"],
    evaluation: &["evaluation"],
    comment: &["comment"],
    load: &["training_load"],
    rank: &["rank"],
};

const PARSED_TRAINING: TrainingKeys = TrainingKeys {
    last_training: &["last_training", "調教日"],
    course: &["training_course", "コース"],
    evaluation: &["evaluation", "評価"],
    comment: &["trainer_comment", "comment"],
    load: &["training_load", "負荷"],
    rank: &["training_rank", "順位"],
};

fn training_block(row: &Row, keys: &TrainingKeys) -> TrainingData {
    TrainingData {
        last_training: first_text(row, keys.last_training),
        training_times: row
            .get("training_times")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        training_course: first_text(row, keys.course),
        evaluation: first_text(row, keys.evaluation),
        trainer_comment: first_text(row, keys.comment),
        attack_explanation: first_text(row, &["attack_explanation"]),
        short_review: first_text(row, &["short_review"]),
        training_load: first_text(row, keys.load),
        training_rank: first_text(row, keys.rank),
        training_arrow: first_text(row, &["training_arrow"]),
    }
}

pub fn adapt_training(raw: &Value) -> KeyedRows<TrainingData> {
    match TrainingShape::deserialize(raw) {
        Ok(TrainingShape::Legacy { horses }) => {
            keyed("training", &horses, |r| training_block(r, &LEGACY_TRAINING))
        }
        Ok(TrainingShape::Parsed { training_data }) => {
            keyed("training", &training_data, |r| training_block(r, &PARSED_TRAINING))
        }
        Err(_) => {
            debug!("training fragment in unknown layout");
            KeyedRows::default()
        }
    }
}

// ==================== Stable comments ====================

#[derive(Deserialize)]
#[serde(untagged)]
enum StableShape {
    Comments { comments: Vec<Value> },
    Danwa { danwa_data: Vec<Value> },
}

struct StableKeys {
    comment: &'static [&'static str],
    condition: &'static [&'static str],
    trainer: &'static [&'static str],
}

const LEGACY_STABLE: StableKeys = StableKeys {
    comment: &["comment", "談話", "展望"],
    condition: &["condition"],
    trainer: &["trainer", "調教師"],
};

const DANWA_STABLE: StableKeys = StableKeys {
    comment: &["厩舎の話", "コメント", "談話", "展望"],
    condition: &["状態"],
    trainer: &["調教師"],
};

fn stable_block(row: &Row, keys: &StableKeys) -> StableComment {
    StableComment {
        date: first_text(row, &["date"]),
        comment: first_text(row, keys.comment),
        condition: first_text(row, keys.condition),
        target_race: first_text(row, &["target_race"]),
        trainer: first_text(row, keys.trainer),
    }
}

pub fn adapt_stable_comments(raw: &Value) -> KeyedRows<StableComment> {
    match StableShape::deserialize(raw) {
        Ok(StableShape::Comments { comments }) => {
            keyed("stable comment", &comments, |r| stable_block(r, &LEGACY_STABLE))
        }
        Ok(StableShape::Danwa { danwa_data }) => {
            keyed("stable comment", &danwa_data, |r| stable_block(r, &DANWA_STABLE))
        }
        Err(_) => {
            debug!("stable comment fragment in unknown layout");
            KeyedRows::default()
        }
    }
}

// ==================== Results ====================

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultShape {
    Results { results: Vec<Value> },
    Horses { horses: Vec<Value> },
}

/// Result rows plus race-level siblings
#[derive(Debug, Clone, Default)]
pub struct ResultFragment {
    pub rows: KeyedRows<RaceResult>,
    pub race_details: Option<Row>,
    pub payouts: Option<Value>,
    pub laps: Option<Value>,
}

fn result_block(row: &Row) -> RaceResult {
    RaceResult {
        finish_position: first_text(row, &["着順", "finish_position"]),
        time: first_text(row, &["タイム", "time"]),
        margin: first_text(row, &["着差", "margin"]),
        last_3f: first_text(row, &["上り3F", "上り", "last_3f"]),
        passing_orders: first_text(
            row,
            &["通過順位", "コーナー通過順", "corner_positions", "passing_orders"],
        ),
        last_corner_position: first_text(row, &["4角位置", "last_corner_position"]),
        first_3f: first_text(row, &["前半3F", "first_3f"]),
        sunpyo: first_text(row, &["寸評", "sunpyo"]),
        prize_money: first_non_empty(row, &["prize_money", "賞金"])
            .cloned()
            .unwrap_or(Value::Null),
        horse_weight: first_text(row, &["馬体重", "horse_weight"]),
        horse_weight_diff: first_text(row, &["増減", "horse_weight_diff"]),
        raw_data: Value::Object(row.clone()),
    }
}

impl ResultFragment {
    pub fn from_value(raw: &Value) -> Self {
        let rows = match ResultShape::deserialize(raw) {
            Ok(ResultShape::Results { results: rows }) | Ok(ResultShape::Horses { horses: rows }) => {
                keyed("result", &rows, result_block)
            }
            Err(_) => {
                debug!("result fragment without result rows");
                KeyedRows::default()
            }
        };

        Self {
            rows,
            race_details: object_field(raw, "race_details"),
            payouts: present_field(raw, "payouts"),
            laps: present_field(raw, "laps"),
        }
    }
}

// ==================== Interviews ====================

#[derive(Deserialize)]
struct InterviewShape {
    interviews: Vec<Value>,
}

fn interview_block(row: &Row) -> PreviousRaceInterview {
    PreviousRaceInterview {
        jockey: first_text(row, &["jockey", "騎手"]),
        comment: first_text(row, &["comment"]),
        interview: first_text(row, &["interview", "インタビュー"]),
        next_race_memo: first_text(row, &["next_race_memo", "次走へのメモ"]),
        finish_position: first_text(row, &["finish_position", "着順"]),
        previous_race_mention: first_text(row, &["previous_race_mention"]),
    }
}

pub fn adapt_interviews(raw: &Value) -> KeyedRows<PreviousRaceInterview> {
    match InterviewShape::deserialize(raw) {
        Ok(shape) => keyed("interview", &shape.interviews, interview_block),
        Err(_) => {
            debug!("interview fragment without interviews");
            KeyedRows::default()
        }
    }
}

// ==================== Paddock ====================

#[derive(Deserialize)]
struct PaddockShape {
    paddock_evaluations: Vec<Value>,
}

fn paddock_block(row: &Row) -> PaddockInfo {
    PaddockInfo {
        mark: first_text(row, &["mark"]),
        mark_score: first_non_empty(row, &["mark_score"])
            .cloned()
            .unwrap_or_else(|| Value::from(0)),
        comment: first_text(row, &["comment"]),
        condition: first_text(row, &["condition"]),
        temperament: first_text(row, &["temperament"]),
        gait: first_text(row, &["gait"]),
        horse_weight: first_text(row, &["horse_weight"]),
        weight_change: first_text(row, &["weight_change"]),
        evaluator: first_text(row, &["evaluator"]),
    }
}

pub fn adapt_paddock(raw: &Value) -> KeyedRows<PaddockInfo> {
    match PaddockShape::deserialize(raw) {
        Ok(shape) => keyed("paddock", &shape.paddock_evaluations, paddock_block),
        Err(_) => {
            debug!("paddock fragment without evaluations");
            KeyedRows::default()
        }
    }
}
