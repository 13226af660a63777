//! Race schedule context (`race_ids/{date}_info.json`).
//!
//! The schedule groups races by meeting (`kaisai_data`). It is the
//! authoritative source for the venue name and post time of each race.

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::race_id::RaceId;

fn venue_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(札幌|函館|福島|新潟|東京|中山|中京|京都|阪神|小倉)").expect("static venue pattern")
    })
}

/// Venue name embedded in a meeting name such as `"1回東京2日"`
pub fn venue_from_meeting(meeting: &str) -> Option<String> {
    venue_regex()
        .captures(meeting)
        .map(|caps| caps[1].to_string())
}

/// One scheduled race
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub race_id: RaceId,
    /// Meeting date (`YYYYMMDD`) the race actually runs on
    pub date: String,
    pub venue_name: Option<String>,
    pub post_time: Option<String>,
    pub start_at: Option<String>,
}

/// All scheduled races for one date, in file order
#[derive(Debug, Clone, Default)]
pub struct ScheduleContext {
    pub date: String,
    pub entries: Vec<ScheduleEntry>,
}

/// Schedule file path for `date` (`YYYYMMDD`)
pub fn schedule_path(data_root: &Path, date: &str) -> PathBuf {
    data_root.join("race_ids").join(format!("{}_info.json", date))
}

fn text_field(race: &Value, key: &str) -> Option<String> {
    race.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ScheduleContext {
    /// Build from a parsed schedule document
    pub fn from_value(date: &str, raw: &Value) -> Self {
        let mut entries = Vec::new();

        if let Some(meetings) = raw.get("kaisai_data").and_then(Value::as_object) {
            for (meeting, races) in meetings {
                let venue_name = venue_from_meeting(meeting);
                for race in races.as_array().into_iter().flatten() {
                    let (id, post_time, start_at) = match race {
                        Value::String(id) => (id.as_str(), None, None),
                        Value::Object(_) => match race.get("race_id").and_then(Value::as_str) {
                            Some(id) => (id, text_field(race, "start_time"), text_field(race, "start_at")),
                            None => continue,
                        },
                        _ => continue,
                    };
                    match id.parse::<RaceId>() {
                        Ok(race_id) => entries.push(ScheduleEntry {
                            race_id,
                            date: date.to_string(),
                            venue_name: venue_name.clone(),
                            post_time,
                            start_at,
                        }),
                        Err(e) => debug!("Skipping schedule row: {}", e),
                    }
                }
            }
        }

        Self {
            date: date.to_string(),
            entries,
        }
    }

    /// Load the schedule file for `date`
    pub fn load(data_root: &Path, date: &str) -> Result<Self> {
        let path = schedule_path(data_root, date);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read schedule {}", path.display()))?;
        let raw: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse schedule {}", path.display()))?;
        Ok(Self::from_value(date, &raw))
    }

    /// Load the schedule when present; `None` otherwise
    pub fn load_optional(data_root: &Path, date: &str) -> Option<Self> {
        if !schedule_path(data_root, date).exists() {
            return None;
        }
        match Self::load(data_root, date) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                tracing::warn!("{:#}", e);
                None
            }
        }
    }

    pub fn entry(&self, race_id: &RaceId) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| &e.race_id == race_id)
    }

    pub fn race_ids(&self) -> Vec<RaceId> {
        self.entries.iter().map(|e| e.race_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "kaisai_data": {
                "1回東京2日": [
                    {"race_id": "202505010201", "start_time": "10:05"},
                    {"race_id": "202505010211", "start_time": "15:45", "start_at": "2025-02-02T15:45:00+09:00"}
                ],
                "1回京都4日": ["202508010401", 12345, {"no_id": true}]
            }
        })
    }

    #[test]
    fn test_from_value() {
        let ctx = ScheduleContext::from_value("20250202", &sample());
        assert_eq!(ctx.entries.len(), 3);

        let id: RaceId = "202505010211".parse().unwrap();
        let e = ctx.entry(&id).unwrap();
        assert_eq!(e.venue_name.as_deref(), Some("東京"));
        assert_eq!(e.post_time.as_deref(), Some("15:45"));
        assert!(e.start_at.is_some());
        assert_eq!(e.date, "20250202");

        let id: RaceId = "202508010401".parse().unwrap();
        let e = ctx.entry(&id).unwrap();
        assert_eq!(e.venue_name.as_deref(), Some("京都"));
        assert!(e.post_time.is_none());
    }

    #[test]
    fn test_venue_from_meeting() {
        assert_eq!(venue_from_meeting("3回中京1日").as_deref(), Some("中京"));
        assert_eq!(venue_from_meeting("大井"), None);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("race_ids")).unwrap();
        std::fs::write(
            schedule_path(dir.path(), "20250202"),
            serde_json::to_string(&sample()).unwrap(),
        )
        .unwrap();

        let ctx = ScheduleContext::load(dir.path(), "20250202").unwrap();
        assert_eq!(ctx.race_ids().len(), 3);
        assert!(ScheduleContext::load_optional(dir.path(), "20250203").is_none());
    }
}
