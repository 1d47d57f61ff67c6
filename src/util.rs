// Small helpers shared by the importer, the report and the CLI

use crate::error::{HunterError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Formats epoch seconds as `YYYY-MM-DD HH:MM:SS +0000` (UTC)
pub fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S %z").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Parses a date/time into epoch seconds
///
/// Accepted forms: integer epoch seconds, RFC 3339,
/// `YYYY-MM-DD HH:MM:SS +zzzz`, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`.
/// Values without an offset are taken as UTC.
pub fn parse_datetime(value: &str) -> Result<i64> {
    let value = value.trim();

    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    if let Some(dt) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt.and_utc().timestamp());
    }

    Err(HunterError::InvalidDate(value.to_string()))
}

/// Strips the leading `sep`-separated components shared by all names
///
/// At least one component of every name is kept:
/// `["foo.bar.a", "foo.bar.b"]` becomes `["a", "b"]`.
pub fn remove_common_prefix(names: &[String], sep: &str) -> Vec<String> {
    let split: Vec<Vec<&str>> = names.iter().map(|n| n.split(sep).collect()).collect();
    let Some(min_len) = split.iter().map(Vec::len).min() else {
        return Vec::new();
    };

    let mut prefix_len = 0;
    while prefix_len + 1 < min_len && split.iter().all(|c| c[prefix_len] == split[0][prefix_len]) {
        prefix_len += 1;
    }

    split
        .iter()
        .map(|components| components[prefix_len..].join(sep))
        .collect()
}

/// Inserts `new_items`, in order, before the elements of `items` at the
/// given positions. `positions` must be sorted ascending. Positions past
/// the end and surplus items are ignored.
pub fn insert_multiple<T: Clone>(items: &[T], new_items: &[T], positions: &[usize]) -> Vec<T> {
    let mut pending = positions.iter().zip(new_items).peekable();
    let mut result = Vec::with_capacity(items.len() + new_items.len());
    for (i, item) in items.iter().enumerate() {
        while let Some((_, new_item)) = pending.next_if(|(pos, _)| **pos == i) {
            result.push(new_item.clone());
        }
        result.push(item.clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 +0000");
        assert_eq!(format_timestamp(1_600_000_000), "2020-09-13 12:26:40 +0000");
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("1600000000").unwrap(), 1_600_000_000);
        assert_eq!(parse_datetime("2020-09-13T12:26:40Z").unwrap(), 1_600_000_000);
        assert_eq!(parse_datetime("2020-09-13 14:26:40 +0200").unwrap(), 1_600_000_000);
        assert_eq!(parse_datetime("2020-09-13 12:26:40").unwrap(), 1_600_000_000);
        assert_eq!(parse_datetime("1970-01-02").unwrap(), 86_400);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        let err = parse_datetime("yesterday-ish").unwrap_err();
        assert!(matches!(err, HunterError::InvalidDate(_)));
    }

    #[test]
    fn test_remove_common_prefix() {
        let names: Vec<String> = ["foo.bar.a", "foo.bar.b"].map(String::from).to_vec();
        assert_eq!(remove_common_prefix(&names, "."), vec!["a", "b"]);

        let names: Vec<String> = ["foo.a.x", "foo.b.x"].map(String::from).to_vec();
        assert_eq!(remove_common_prefix(&names, "."), vec!["a.x", "b.x"]);

        let names: Vec<String> = ["same.name"].map(String::from).to_vec();
        assert_eq!(remove_common_prefix(&names, "."), vec!["name"]);

        assert!(remove_common_prefix(&[], ".").is_empty());
    }

    #[test]
    fn test_insert_multiple() {
        let items = ["a", "b", "c", "d"];
        assert_eq!(
            insert_multiple(&items, &["x", "y"], &[1, 3]),
            vec!["a", "x", "b", "c", "y", "d"]
        );
        assert_eq!(insert_multiple(&items, &[], &[]), items.to_vec());
        assert_eq!(
            insert_multiple(&items, &["x", "y", "z"], &[0, 9]),
            vec!["x", "a", "b", "c", "d"]
        );
    }

    #[test]
    fn test_insert_multiple_many_positions() {
        let items: Vec<usize> = (0..1000).collect();
        let positions: Vec<usize> = (0..1000).step_by(10).collect();
        let markers = vec![usize::MAX; positions.len()];
        let result = insert_multiple(&items, &markers, &positions);
        assert_eq!(result.len(), 1100);
        assert_eq!(&result[..3], &[usize::MAX, 0, 1]);
        assert_eq!(result[11], usize::MAX);
        assert_eq!(result[12], 10);
    }
}
