//! Official trainer table loaded from the trainer CSV.
//!
//! The CSV is exported by a desktop tool in Shift_JIS; it is read as lossy
//! UTF-8 and every column is kept as a string. Column roles are detected from
//! header text, so the export's exact column order does not matter.

use anyhow::{Context, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{normalize_affiliation, TrainerIndexEntry};

/// Column positions detected from the header row
#[derive(Debug, Default, PartialEq)]
struct HeaderMap {
    name: Option<usize>,
    code: Option<usize>,
    affiliation: Option<usize>,
    comment: Option<usize>,
}

impl HeaderMap {
    fn detect<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut map = HeaderMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.as_ref().trim();
            let lower = header.to_lowercase();
            let slot = if header.contains("コード") || lower.contains("code") {
                &mut map.code
            } else if header.contains("調教師") || header.contains("名前") || lower.contains("name") {
                &mut map.name
            } else if header.contains("所属")
                || lower.contains("tozai")
                || header.contains("美浦")
                || header.contains("栗東")
            {
                &mut map.affiliation
            } else if header.contains("コメント")
                || lower.contains("comment")
                || header.contains("勝負")
                || header.contains("調教")
            {
                &mut map.comment
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        map
    }
}

fn is_official_code(s: &str) -> bool {
    s.len() == 5 && s.chars().all(|c| c.is_ascii_digit())
}

/// Official trainers keyed by 5-digit code
#[derive(Debug, Clone, Default)]
pub struct TrainerDirectory {
    by_code: BTreeMap<String, TrainerIndexEntry>,
}

impl TrainerDirectory {
    /// Build from already-split rows (header first)
    pub fn from_rows(headers: &[String], rows: &[Vec<String>]) -> Self {
        let map = HeaderMap::detect(headers);
        debug!("Trainer CSV columns: {:?}", map);

        let cell = |row: &Vec<String>, idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let mut by_code = BTreeMap::new();
        for row in rows {
            if row.len() < 2 {
                continue;
            }

            let name = cell(row, map.name);
            let code = Some(cell(row, map.code))
                .filter(|c| is_official_code(c))
                .or_else(|| {
                    row.iter()
                        .map(|c| c.trim())
                        .find(|c| is_official_code(c))
                        .map(str::to_string)
                });

            let Some(code) = code else { continue };
            if name.is_empty() {
                continue;
            }

            let comment = cell(row, map.comment);
            by_code.insert(
                code.clone(),
                TrainerIndexEntry {
                    official_code: code,
                    name,
                    affiliation: normalize_affiliation(&cell(row, map.affiliation)),
                    comment: Some(comment).filter(|c| !c.is_empty()),
                },
            );
        }

        Self { by_code }
    }

    /// Load the trainer CSV; a missing file yields an empty directory
    pub fn load_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Trainer CSV not found: {}", path.display());
            return Ok(Self::default());
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .map_parse_options(|opts| {
                opts.with_encoding(CsvEncoding::LossyUtf8)
                    .with_truncate_ragged_lines(true)
            })
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .with_context(|| format!("Failed to read trainer CSV {}", path.display()))?;

        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            columns.push(column.str()?);
        }

        let rows: Vec<Vec<String>> = (0..df.height())
            .map(|i| {
                columns
                    .iter()
                    .map(|col| col.get(i).unwrap_or("").to_string())
                    .collect()
            })
            .collect();

        let directory = Self::from_rows(&headers, &rows);
        info!("Loaded {} trainers from CSV", directory.len());
        Ok(directory)
    }

    pub fn get(&self, code: &str) -> Option<&TrainerIndexEntry> {
        self.by_code.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainerIndexEntry> {
        self.by_code.values()
    }

    /// Lookup table keyed by code and by name, for [`super::find_trainer`].
    ///
    /// When two trainers share a name the first code wins.
    pub fn lookup_table(&self) -> BTreeMap<String, TrainerIndexEntry> {
        let mut table = self.by_code.clone();
        for entry in self.by_code.values() {
            table
                .entry(entry.name.clone())
                .or_insert_with(|| entry.clone());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
