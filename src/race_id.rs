//! Race identifier: `YYYYMMDD` + venue code + race number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IntegrateError;

/// Venue code → venue name
pub const VENUES: [(&str, &str); 10] = [
    ("01", "札幌"),
    ("02", "函館"),
    ("03", "福島"),
    ("04", "新潟"),
    ("05", "東京"),
    ("06", "中山"),
    ("07", "中京"),
    ("08", "京都"),
    ("09", "阪神"),
    ("10", "小倉"),
];

/// Returned for venue codes outside the table
pub const UNKNOWN_VENUE: &str = "unknown";

/// Look up a venue name by its 2-digit code
pub fn venue_name_for_code(code: &str) -> &'static str {
    VENUES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_VENUE)
}

/// Validated 12-digit race identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RaceId(String);

impl RaceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `YYYYMMDD` portion
    pub fn date_str(&self) -> &str {
        &self.0[..8]
    }

    pub fn venue_code(&self) -> &str {
        &self.0[8..10]
    }

    pub fn race_number(&self) -> u8 {
        self.0[10..12].parse().unwrap_or(0)
    }

    /// Venue name from the code table; `"unknown"` for unrecognized codes
    pub fn venue_name(&self) -> &'static str {
        venue_name_for_code(self.venue_code())
    }
}

impl FromStr for RaceId {
    type Err = IntegrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IntegrateError::InvalidRaceId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RaceId {
    type Error = IntegrateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RaceId> for String {
    fn from(id: RaceId) -> Self {
        id.0
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
