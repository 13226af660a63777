//! Integrated race record types.
//!
//! Field names here are the persisted JSON contract; downstream renderers read
//! them directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Availability of one fragment kind for a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Present,
    #[default]
    Absent,
}

impl SourceState {
    pub fn from_present(present: bool) -> Self {
        if present {
            SourceState::Present
        } else {
            SourceState::Absent
        }
    }
}

/// Per-fragment completion flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceStatus {
    pub shutsuba: SourceState,
    pub cyokyo: SourceState,
    pub danwa: SourceState,
    pub seiseki: SourceState,
    pub syoin: SourceState,
    pub paddok: SourceState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceMetadata {
    pub race_id: String,
    pub data_version: String,
    pub created_at: String,
    pub updated_at: String,
    pub data_sources: SourceStatus,
}

/// Race-level details; each field filled by whichever source has it first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaceInfo {
    pub date: String,
    pub venue: String,
    pub race_number: u8,
    pub race_name: Option<String>,
    pub grade: Option<String>,
    pub distance: Option<u32>,
    pub track: Option<String>,
    pub direction: Option<String>,
    pub weather: Option<String>,
    pub track_condition: Option<String>,
    pub race_condition: Option<String>,
    pub post_time: Option<String>,
    pub start_at: Option<String>,
}

/// Entry-list fields for one horse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntryData {
    pub weight: String,
    pub weight_diff: String,
    pub jockey: String,
    pub trainer: String,
    pub trainer_id: Option<String>,
    pub trainer_link: Option<String>,
    /// Affiliation resolved through the trainer index
    pub trainer_tozai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer_comment: Option<String>,
    pub owner: String,
    pub short_comment: String,
    pub odds: String,
    pub odds_rank: Option<u32>,
    pub ai_index: String,
    pub ai_rank: String,
    pub popularity_index: String,
    pub age: String,
    pub sex: String,
    pub waku: String,
    pub rating: String,
    pub horse_weight: String,
    pub father: String,
    pub mother: String,
    pub mother_father: String,
    pub honshi_mark: String,
    pub mark_point: u32,
    pub marks_by_person: BTreeMap<String, String>,
    pub aggregate_mark_point: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainingData {
    pub last_training: String,
    pub training_times: Vec<Value>,
    pub training_course: String,
    pub evaluation: String,
    pub trainer_comment: String,
    pub attack_explanation: String,
    pub short_review: String,
    pub training_load: String,
    pub training_rank: String,
    pub training_arrow: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StableComment {
    pub date: String,
    pub comment: String,
    pub condition: String,
    pub target_race: String,
    pub trainer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaceResult {
    pub finish_position: String,
    pub time: String,
    pub margin: String,
    pub last_3f: String,
    pub passing_orders: String,
    pub last_corner_position: String,
    pub first_3f: String,
    pub sunpyo: String,
    pub prize_money: Value,
    pub horse_weight: String,
    pub horse_weight_diff: String,
    /// Source row, kept verbatim
    pub raw_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PreviousRaceInterview {
    pub jockey: String,
    pub comment: String,
    pub interview: String,
    pub next_race_memo: String,
    pub finish_position: String,
    pub previous_race_mention: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaddockInfo {
    pub mark: String,
    pub mark_score: Value,
    pub comment: String,
    pub condition: String,
    pub temperament: String,
    pub gait: String,
    pub horse_weight: String,
    pub weight_change: String,
    pub evaluator: String,
}

/// Accumulated per-horse features from the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryFeatures {
    #[serde(default)]
    pub passing_style: Option<String>,
    #[serde(default)]
    pub last3f_mean_3: Option<f64>,
    #[serde(default)]
    pub value_flag: Option<String>,
    #[serde(default)]
    pub course_distance_perf: Option<Value>,
    #[serde(default)]
    pub recency_days: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Merged record for one horse in one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseRecord {
    pub horse_number: u32,
    pub horse_name: String,
    pub horse_id: Option<String>,
    pub entry_data: EntryData,
    pub training_data: Option<TrainingData>,
    pub stable_comment: Option<StableComment>,
    pub result: Option<RaceResult>,
    pub previous_race_interview: Option<PreviousRaceInterview>,
    pub paddock_info: Option<PaddockInfo>,
    pub history_features: Option<HistoryFeatures>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub horse_number: u32,
    pub horse_name: String,
    pub odds_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaceAnalysis {
    pub favorites: Vec<Favorite>,
    pub training_highlights: Vec<String>,
    pub entry_count: usize,
}

/// Integrated record for one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub meta: RaceMetadata,
    pub race_info: RaceInfo,
    pub entries: Vec<HorseRecord>,
    pub analysis: RaceAnalysis,
    pub payouts: Option<Value>,
    pub laps: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenkai_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_comment: Option<Value>,
}

/// Summary of one batch run
#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchSummary {
    pub date: String,
    pub total_races: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub success_rate: f64,
}

impl BatchSummary {
    pub fn new(date: &str, total: usize, success: usize) -> Self {
        let success_rate = if total > 0 {
            success as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            date: date.to_string(),
            total_races: total,
            success_count: success,
            failed_count: total - success,
            success_rate,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Integrated race ids available for one date
#[derive(Debug, Serialize)]
pub struct DateRacesResponse {
    pub date: String,
    pub race_ids: Vec<String>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
