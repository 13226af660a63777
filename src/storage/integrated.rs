//! Integrated race files on disk.
//!
//! Layout: `{data_root}/races/YYYY/MM/DD/{venue}/integrated_{race_id}.json`.

use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::merge::merge_records;
use crate::error::Result;
use crate::race_id::RaceId;
use crate::types::RaceRecord;

const FILE_PREFIX: &str = "integrated_";

/// Recursively collect `integrated_*.json` files under `dir`
pub fn collect_integrated_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_integrated_files(&path, out);
        } else if race_id_of_file(&path).is_some() {
            out.push(path);
        }
    }
}

/// Race id encoded in an integrated file name
fn race_id_of_file(path: &Path) -> Option<String> {
    path.file_name()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(".json")
        .map(str::to_string)
}

/// Store of integrated race records
#[derive(Debug, Clone)]
pub struct IntegratedStore {
    base_dir: PathBuf,
}

impl IntegratedStore {
    pub fn new(data_root: &Path) -> Self {
        Self {
            base_dir: data_root.join("races"),
        }
    }

    pub fn races_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `races/YYYY/MM/DD` for a compact `YYYYMMDD` date
    fn day_dir(&self, date: &str) -> PathBuf {
        if date.len() == 8 && date.is_ascii() {
            self.base_dir.join(&date[..4]).join(&date[4..6]).join(&date[6..])
        } else {
            self.base_dir.join(date)
        }
    }

    /// Output path for a record, from its race-info date and venue
    pub fn path_for(&self, record: &RaceRecord) -> PathBuf {
        let parts: Vec<&str> = record.race_info.date.split('/').collect();
        let day_dir = match parts.as_slice() {
            [y, m, d] if !y.is_empty() && !m.is_empty() && !d.is_empty() => {
                self.base_dir.join(y).join(m).join(d)
            }
            _ => self.day_dir(record.meta.race_id.get(..8).unwrap_or("00000000")),
        };
        day_dir
            .join(&record.race_info.venue)
            .join(format!("{}{}.json", FILE_PREFIX, record.meta.race_id))
    }

    fn read_value(path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Existing record at `path`; an unparsable file is moved aside as `*.corrupt`
    fn read_existing(path: &Path) -> Result<Option<Value>> {
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&content) {
            Ok(value) if value.is_object() => Ok(Some(value)),
            Ok(_) => Self::quarantine(path, "not a JSON object"),
            Err(e) => Self::quarantine(path, &e.to_string()),
        }
    }

    fn quarantine(path: &Path, reason: &str) -> Result<Option<Value>> {
        let mut aside = path.as_os_str().to_owned();
        aside.push(".corrupt");
        warn!("Unreadable integrated file {} ({}), moving aside", path.display(), reason);
        std::fs::rename(path, &aside)?;
        Ok(None)
    }

    /// Write through a temp file in the same directory, then rename into place
    fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Merge `record` into the race's existing file, wherever it lives, and write it.
    ///
    /// A new file is placed by [`Self::path_for`]; an existing one keeps its location
    /// even if the schedule now puts the race on another date or venue.
    pub fn save(&self, record: &RaceRecord) -> Result<PathBuf> {
        let fresh_path = self.path_for(record);
        let existing_path = if fresh_path.exists() {
            Some(fresh_path.clone())
        } else {
            record
                .meta
                .race_id
                .parse::<RaceId>()
                .ok()
                .and_then(|race_id| self.find(&race_id))
        };

        let (path, existing) = match existing_path {
            Some(path) => {
                debug!("Merging into existing {}", path.display());
                let existing = Self::read_existing(&path)?;
                (path, existing)
            }
            None => (fresh_path, None),
        };

        let merged = merge_records(existing, record)?;

        let mut content = serde_json::to_string_pretty(&merged)?;
        content.push('\n');
        Self::write_atomic(&path, &content)?;

        info!("Saved {}", path.display());
        Ok(path)
    }

    /// Locate a race's file: the race-id date first, then anywhere
    pub fn find(&self, race_id: &RaceId) -> Option<PathBuf> {
        let file_name = format!("{}{}.json", FILE_PREFIX, race_id);

        let mut candidates = Vec::new();
        collect_integrated_files(&self.day_dir(race_id.date_str()), &mut candidates);
        if let Some(path) = candidates.into_iter().find(|p| p.ends_with(&file_name)) {
            return Some(path);
        }

        let mut all = Vec::new();
        collect_integrated_files(&self.base_dir, &mut all);
        all.sort();
        all.into_iter().find(|p| p.ends_with(&file_name))
    }

    pub fn load(&self, race_id: &RaceId) -> Result<Option<Value>> {
        match self.find(race_id) {
            Some(path) => Ok(Some(Self::read_value(&path)?)),
            None => Ok(None),
        }
    }

    /// Race ids with an integrated file for a `YYYYMMDD` date, sorted
    pub fn race_ids_for_date(&self, date: &str) -> Vec<String> {
        let mut files = Vec::new();
        collect_integrated_files(&self.day_dir(date), &mut files);

        let mut ids: Vec<String> = files.iter().filter_map(|p| race_id_of_file(p)).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::{FragmentKind, FragmentSet, MemoryFragments, ScheduleEntry};
    use crate::history::NoHistory;
    use crate::integrator::{assemble_race, HorseMerger};
    use serde_json::json;

    const RACE: &str = "202505040511";

    fn assemble(mem: &MemoryFragments) -> RaceRecord {
        assemble_scheduled(mem, None)
    }

    fn assemble_scheduled(mem: &MemoryFragments, schedule: Option<&ScheduleEntry>) -> RaceRecord {
        let race: RaceId = RACE.parse().unwrap();
        let fragments = FragmentSet::load(mem, &race);
        assemble_race(&race, &fragments, schedule, &HorseMerger::new(None, &NoHistory)).unwrap()
    }

    fn entries_only() -> MemoryFragments {
        let mut mem = MemoryFragments::default();
        mem.insert(
            RACE,
            FragmentKind::Entries,
            json!({"horses": [
                {"馬番": "1", "馬名": "イチ", "騎手": "武豊", "人気": "2"},
                {"馬番": "2", "馬名": "ニ", "騎手": "戸崎", "人気": "1"}
            ]}),
        );
        mem
    }

    fn strip_timestamps(mut value: Value) -> Value {
        if let Some(meta) = value.get_mut("meta").and_then(Value::as_object_mut) {
            meta.remove("created_at");
            meta.remove("updated_at");
        }
        value
    }

    #[test]
    fn test_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let path = store.save(&assemble(&entries_only())).unwrap();
        assert!(path.ends_with("races/2025/05/04/東京/integrated_202505040511.json"));
        assert_eq!(store.race_ids_for_date("20250504"), vec![RACE.to_string()]);
        assert!(store.race_ids_for_date("20250505").is_empty());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let mem = entries_only();

        let path = store.save(&assemble(&mem)).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        store.save(&assemble(&mem)).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        let first: Value = serde_json::from_str(&first).unwrap();
        let second: Value = serde_json::from_str(&second).unwrap();
        assert_eq!(first["meta"]["created_at"], second["meta"]["created_at"]);
        assert_eq!(
            serde_json::to_string_pretty(&strip_timestamps(first)).unwrap(),
            serde_json::to_string_pretty(&strip_timestamps(second)).unwrap()
        );
    }

    #[test]
    fn test_results_enrich_without_losing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let mut mem = entries_only();
        let race: RaceId = RACE.parse().unwrap();

        store.save(&assemble(&mem)).unwrap();
        let before = store.load(&race).unwrap().unwrap();

        mem.insert(
            RACE,
            FragmentKind::Result,
            json!({"results": [{"馬番": "1", "着順": "1"}, {"馬番": "2", "着順": "2"}]}),
        );
        store.save(&assemble(&mem)).unwrap();
        let after = store.load(&race).unwrap().unwrap();

        for (old, new) in before["entries"]
            .as_array()
            .unwrap()
            .iter()
            .zip(after["entries"].as_array().unwrap())
        {
            assert_eq!(old["entry_data"], new["entry_data"]);
            assert_eq!(old["horse_name"], new["horse_name"]);
        }
        assert_eq!(before["race_info"], after["race_info"]);
        assert_eq!(after["entries"][0]["result"]["finish_position"], json!("1"));
        assert_eq!(after["meta"]["data_sources"]["seiseki"], json!("present"));
    }

    #[test]
    fn test_annotations_survive_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let mem = entries_only();

        let path = store.save(&assemble(&mem)).unwrap();
        let mut value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["user_memo"] = json!("雨なら2番");
        value["entries"][1]["my_mark"] = json!("◎");
        std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();

        store.save(&assemble(&mem)).unwrap();
        let after: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(after["user_memo"], json!("雨なら2番"));
        assert_eq!(after["entries"][1]["my_mark"], json!("◎"));
    }

    #[test]
    fn test_rerun_without_schedule_merges_into_scheduled_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let mut mem = entries_only();
        let schedule = ScheduleEntry {
            race_id: RACE.parse().unwrap(),
            date: "20250505".to_string(),
            venue_name: Some("京都".to_string()),
            post_time: None,
            start_at: None,
        };

        let first = store.save(&assemble_scheduled(&mem, Some(&schedule))).unwrap();
        assert!(first.ends_with("races/2025/05/05/京都/integrated_202505040511.json"));
        let mut value: Value = serde_json::from_str(&std::fs::read_to_string(&first).unwrap()).unwrap();
        value["user_memo"] = json!("重馬場向き");
        std::fs::write(&first, serde_json::to_string_pretty(&value).unwrap()).unwrap();

        mem.insert(RACE, FragmentKind::Result, json!({"results": [{"馬番": "1", "着順": "1"}]}));
        let second = store.save(&assemble(&mem)).unwrap();
        assert_eq!(first, second);

        let mut all = Vec::new();
        collect_integrated_files(store.races_dir(), &mut all);
        assert_eq!(all.len(), 1);

        let loaded = store.load(&RACE.parse().unwrap()).unwrap().unwrap();
        assert_eq!(loaded["user_memo"], json!("重馬場向き"));
        assert_eq!(loaded["entries"][0]["result"]["finish_position"], json!("1"));
    }

    #[test]
    fn test_corrupt_existing_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let record = assemble(&entries_only());
        let path = store.path_for(&record);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{oops").unwrap();

        let saved = store.save(&record).unwrap();
        assert_eq!(saved, path);
        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);

        let aside = path.with_file_name("integrated_202505040511.json.corrupt");
        assert_eq!(std::fs::read_to_string(aside).unwrap(), "{oops");
        assert_eq!(store.race_ids_for_date("20250504"), vec![RACE.to_string()]);
    }

    #[test]
    fn test_find_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntegratedStore::new(dir.path());
        let race: RaceId = RACE.parse().unwrap();
        assert!(store.load(&race).unwrap().is_none());
    }
}
