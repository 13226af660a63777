//! Identity normalization and synonym-key helpers.
//!
//! Fragment producers disagree on how they write horse numbers (`3`, `"3"`,
//! `"０３"`, `"3番"`) and on which key carries a given field. Everything in
//! this module is pure.

use serde_json::{Map, Value};

/// One loosely-typed fragment row
pub type Row = Map<String, Value>;

/// Regional training-base prefixes (美浦 / 栗東)
pub const REGION_PREFIXES: [char; 2] = ['美', '栗'];

/// Translate full-width digits to ASCII, leaving other characters alone
pub fn to_half_width_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Canonical horse number from a string in any width.
///
/// All non-digit characters are dropped after width translation; `None` if
/// nothing numeric remains.
pub fn parse_horse_number(raw: &str) -> Option<u32> {
    let digits: String = to_half_width_digits(raw)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Canonical horse number from a JSON value (integer, float, or string)
pub fn normalize_horse_number(raw: &Value) -> Option<u32> {
    match raw {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                    .map(|f| f as u32)
            }
        }
        Value::String(s) => parse_horse_number(s),
        _ => None,
    }
}

/// Strip a leading regional prefix from a trainer or person name.
///
/// Names without a prefix are returned unchanged.
pub fn normalize_person_name(raw: &str) -> String {
    match raw.trim_start().strip_prefix(REGION_PREFIXES) {
        Some(rest) => rest.trim().to_string(),
        None => raw.to_string(),
    }
}

/// Whether a value carries no information
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// First non-empty value among `keys`, tried in order
pub fn first_non_empty<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !is_empty_value(v))
}

/// Render a value as text; arrays of scalars (corner orders) join with `-`
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-"),
        _ => String::new(),
    }
}

/// Text of the first non-empty synonym, or an empty string
pub fn first_text(row: &Row, keys: &[&str]) -> String {
    first_non_empty(row, keys).map(text_of).unwrap_or_default()
}

/// Unsigned number from the first non-empty synonym, width-tolerant
pub fn first_u32(row: &Row, keys: &[&str]) -> Option<u32> {
    first_non_empty(row, keys).and_then(|v| match v {
        Value::String(s) => to_half_width_digits(s).trim().parse().ok(),
        other => normalize_horse_number(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_width_matches_half_width() {
        let fw = ['０', '１', '２', '３', '４', '５', '６', '７', '８', '９'];
        for (i, a) in fw.iter().enumerate() {
            let single = a.to_string();
            assert_eq!(parse_horse_number(&single), Some(i as u32));
            for (j, b) in fw.iter().enumerate() {
                let full = format!("{}{}", a, b);
                let half = format!("{}{}", i, j);
                assert_eq!(parse_horse_number(&full), parse_horse_number(&half));
            }
        }
    }

    #[test]
    fn test_normalize_horse_number_variants() {
        assert_eq!(normalize_horse_number(&json!(7)), Some(7));
        assert_eq!(normalize_horse_number(&json!("7")), Some(7));
        assert_eq!(normalize_horse_number(&json!("07")), Some(7));
        assert_eq!(normalize_horse_number(&json!("１２")), Some(12));
        assert_eq!(normalize_horse_number(&json!("12番")), Some(12));
        assert_eq!(normalize_horse_number(&json!(3.0)), Some(3));
        assert_eq!(normalize_horse_number(&json!(3.5)), None);
        assert_eq!(normalize_horse_number(&json!("取消")), None);
        assert_eq!(normalize_horse_number(&json!("")), None);
        assert_eq!(normalize_horse_number(&json!(null)), None);
    }

    #[test]
    fn test_normalize_person_name() {
        assert_eq!(normalize_person_name("美堀内"), "堀内");
        assert_eq!(normalize_person_name("栗 友道"), "友道");
        assert_eq!(normalize_person_name("堀内岳志"), "堀内岳志");
        assert_eq!(normalize_person_name(""), "");
    }

    #[test]
    fn test_first_non_empty_priority() {
        let row = json!({"重量": "", "weight": 57.0, "斤量": "55"});
        let row = row.as_object().unwrap();
        assert_eq!(first_non_empty(row, &["重量", "weight", "斤量"]), Some(&json!(57.0)));
        assert_eq!(first_text(row, &["斤量", "weight"]), "55");
        assert_eq!(first_text(row, &["missing"]), "");
    }

    #[test]
    fn test_text_of_passing_orders() {
        assert_eq!(text_of(&json!([2, 2, 3, 1])), "2-2-3-1");
        assert_eq!(text_of(&json!(" 1:34.5 ")), "1:34.5");
        assert_eq!(text_of(&json!({"a": 1})), "");
    }

    #[test]
    fn test_zero_is_a_value() {
        let row = json!({"人気": 0, "odds_rank": 4});
        let row = row.as_object().unwrap();
        assert_eq!(first_u32(row, &["人気", "odds_rank"]), Some(0));
    }
}
