//! Race assembly: race-info derivation, horse merge, analytics post-pass.

use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::merger::HorseMerger;
use crate::fragments::{FragmentSet, ScheduleEntry};
use crate::normalize::{first_non_empty, first_text, normalize_horse_number, Row};
use crate::race_id::RaceId;
use crate::types::{Favorite, HorseRecord, RaceAnalysis, RaceInfo, RaceMetadata, RaceRecord};

pub const DATA_VERSION: &str = "2.0";

/// Keys that may carry the horse number on an entry-list row
const ENTRY_NUMBER_KEYS: [&str; 3] = ["馬番", "horse_number", "umaban"];

/// Grade label → race-name patterns, checked in order
const GRADE_PATTERNS: [(&str, &[&str]); 9] = [
    ("G3", &["GIII", "G3", "Ｇ３"]),
    ("G2", &["GII", "G2", "Ｇ２"]),
    ("G1", &["GI", "G1", "Ｇ１"]),
    ("OP", &["オープン", "OP", "リステッド", "(L)"]),
    ("新馬", &["新馬"]),
    ("未勝利", &["未勝利"]),
    ("1勝", &["1勝", "１勝"]),
    ("2勝", &["2勝", "２勝"]),
    ("3勝", &["3勝", "３勝"]),
];

/// Short grade label from a race name; first matching pattern wins
pub fn infer_grade(race_name: &str) -> Option<String> {
    GRADE_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| race_name.contains(p)))
        .map(|(grade, _)| grade.to_string())
}

/// `YYYYMMDD` → `YYYY/MM/DD`
pub fn display_date(compact: &str) -> String {
    match NaiveDate::parse_from_str(compact, "%Y%m%d") {
        Ok(date) => date.format("%Y/%m/%d").to_string(),
        Err(_) if compact.len() == 8 && compact.is_ascii() => {
            format!("{}/{}/{}", &compact[..4], &compact[4..6], &compact[6..])
        }
        Err(_) => compact.to_string(),
    }
}

fn non_empty(text: String) -> Option<String> {
    Some(text).filter(|s| !s.is_empty())
}

fn row_text(row: Option<&Row>, keys: &[&str]) -> Option<String> {
    row.and_then(|r| non_empty(first_text(r, keys)))
}

/// Distance in metres from `1600`, `"1600"` or `"芝1600m"`
fn row_distance(row: Option<&Row>) -> Option<u32> {
    row.and_then(|r| first_non_empty(r, &["distance", "距離"]))
        .and_then(normalize_horse_number)
        .filter(|d| *d > 0)
}

/// Race-level block from the entry list, schedule and result details
fn derive_race_info(
    race_id: &RaceId,
    fragments: &FragmentSet,
    schedule: Option<&ScheduleEntry>,
) -> RaceInfo {
    let info = fragments.entries.as_ref().and_then(|e| e.race_info.as_ref());
    let details = fragments.results.as_ref().and_then(|r| r.race_details.as_ref());

    let compact_date = schedule.map(|s| s.date.as_str()).unwrap_or(race_id.date_str());
    let venue = schedule
        .and_then(|s| s.venue_name.clone())
        .unwrap_or_else(|| race_id.venue_name().to_string());

    let race_name = row_text(info, &["race_name", "レース名"]);

    let mut race_info = RaceInfo {
        date: display_date(compact_date),
        venue,
        race_number: race_id.race_number(),
        grade: race_name.as_deref().and_then(infer_grade),
        race_name,
        distance: row_distance(info),
        track: row_text(info, &["track", "track_type"]),
        direction: row_text(info, &["direction"]),
        weather: row_text(info, &["weather"]),
        track_condition: row_text(info, &["track_condition"]),
        race_condition: row_text(info, &["race_condition"]),
        post_time: schedule.and_then(|s| s.post_time.clone()),
        start_at: schedule.and_then(|s| s.start_at.clone()),
    };

    if details.is_some() {
        race_info.distance = race_info.distance.or_else(|| row_distance(details));
        race_info.track_condition = race_info
            .track_condition
            .or_else(|| row_text(details, &["track_condition"]));
        race_info.weather = race_info.weather.or_else(|| row_text(details, &["weather"]));
        race_info.post_time = race_info.post_time.or_else(|| row_text(details, &["start_time"]));
        race_info.grade = race_info.grade.or_else(|| row_text(details, &["grade"]));
        race_info.track = race_info.track.or_else(|| {
            row_text(details, &["track_type"]).map(|t| if t == "芝" { t } else { "ダ".to_string() })
        });
    }

    race_info
}

/// Favorites and training highlights over the finished horse list
pub fn analyze(entries: &[HorseRecord]) -> RaceAnalysis {
    let mut favorites: Vec<Favorite> = entries
        .iter()
        .filter_map(|h| {
            let rank = h.entry_data.odds_rank.filter(|r| (1..=3).contains(r))?;
            Some(Favorite {
                horse_number: h.horse_number,
                horse_name: h.horse_name.clone(),
                odds_rank: rank,
            })
        })
        .collect();
    favorites.sort_by_key(|f| f.odds_rank);

    let training_highlights = entries
        .iter()
        .filter_map(|h| {
            let evaluation = h.training_data.as_ref()?.evaluation.trim();
            matches!(evaluation, "A" | "B")
                .then(|| format!("{} {} - {}", h.horse_number, h.horse_name, evaluation))
        })
        .collect();

    RaceAnalysis {
        favorites,
        training_highlights,
        entry_count: entries.len(),
    }
}

/// Build the integrated record for one race.
///
/// Returns `None` when the entry list is absent; every other fragment is optional.
pub fn assemble_race(
    race_id: &RaceId,
    fragments: &FragmentSet,
    schedule: Option<&ScheduleEntry>,
    merger: &HorseMerger<'_>,
) -> Option<RaceRecord> {
    let entries_fragment = fragments.entries.as_ref()?;

    let race_info = derive_race_info(race_id, fragments, schedule);

    let mut seen = BTreeSet::new();
    let mut entries = Vec::with_capacity(entries_fragment.rows.len());
    for row in &entries_fragment.rows {
        let Some(horse_number) = first_non_empty(row, &ENTRY_NUMBER_KEYS)
            .and_then(normalize_horse_number)
            .filter(|n| *n > 0)
        else {
            debug!("{}: entry row without horse number skipped", race_id);
            continue;
        };
        if !seen.insert(horse_number) {
            debug!("{}: duplicate entry row for horse {} ignored", race_id, horse_number);
            continue;
        }
        entries.push(merger.merge_horse(horse_number, row, fragments));
    }
    entries.sort_by_key(|h| h.horse_number);

    let analysis = analyze(&entries);
    let now = Local::now().to_rfc3339();

    Some(RaceRecord {
        meta: RaceMetadata {
            race_id: race_id.to_string(),
            data_version: DATA_VERSION.to_string(),
            created_at: now.clone(),
            updated_at: now,
            data_sources: fragments.status(),
        },
        race_info,
        entries,
        analysis,
        payouts: fragments.results.as_ref().and_then(|r| r.payouts.clone()),
        laps: fragments.results.as_ref().and_then(|r| r.laps.clone()),
        tenkai_data: entries_fragment.tenkai_data.clone(),
        race_comment: entries_fragment
            .race_comment
            .clone()
            .filter(|c| !matches!(c, Value::String(s) if s.trim().is_empty())),
    })
}

/// One-line description for logs and CLI output
pub fn summary_line(record: &RaceRecord) -> String {
    format!(
        "{} {} {}R {} ({} horses)",
        record.race_info.date,
        record.race_info.venue,
        record.race_info.race_number,
        record.race_info.race_name.as_deref().unwrap_or("-"),
        record.entries.len()
    )
}
