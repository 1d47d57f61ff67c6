// CSV importer producing a `Series`
//
// Expected layout: a header row, then one row per test run. One column holds
// the run time (epoch seconds or a date/time string, see
// `util::parse_datetime`). Columns listed as attributes are kept as strings;
// every other column whose cells are all numeric (or empty) is a metric.
// Quoted fields may contain the delimiter but not line breaks.

use crate::error::{HunterError, Result};
use crate::series::{Metric, Series};
use crate::util::parse_datetime;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Dialect of the CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub delimiter: char,
    pub quote_char: char,
    pub time_column: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            time_column: "time".to_string(),
        }
    }
}

/// Restricts which part of the data is imported
#[derive(Debug, Clone, Default)]
pub struct DataSelector {
    /// Earliest time to import (inclusive)
    pub since: Option<i64>,
    /// Latest time to import (inclusive)
    pub until: Option<i64>,
    /// Keep only the most recent N runs
    pub last_n: Option<usize>,
    /// Keep only metrics whose name matches
    pub metrics: Option<Regex>,
}

impl DataSelector {
    fn accepts_time(&self, time: i64) -> bool {
        self.since.map_or(true, |since| time >= since) && self.until.map_or(true, |until| time <= until)
    }

    fn accepts_metric(&self, name: &str) -> bool {
        self.metrics.as_ref().map_or(true, |re| re.is_match(name))
    }
}

/// Reads one test's results from CSV
#[derive(Debug, Clone)]
pub struct CsvImporter {
    pub test_name: String,
    pub branch: Option<String>,
    pub options: CsvOptions,
    /// Metric definitions; unlisted numeric columns get `Metric::default()`
    pub metrics: BTreeMap<String, Metric>,
    /// Columns imported as attributes
    pub attributes: Vec<String>,
}

struct Row {
    line: usize,
    time: i64,
    cells: Vec<String>,
}

enum ColumnKind {
    Time,
    Attribute,
    Metric(Metric),
    Ignored,
}

impl CsvImporter {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            branch: None,
            options: CsvOptions::default(),
            metrics: BTreeMap::new(),
            attributes: Vec::new(),
        }
    }

    pub fn load<P: AsRef<Path>>(&self, path: P, selector: &DataSelector) -> Result<Series> {
        let path = path.as_ref();
        tracing::debug!("importing {} from {}", self.test_name, path.display());
        let content = fs::read_to_string(path)?;
        self.parse(&content, selector)
    }

    /// Names of the metric columns, without selecting or parsing any rows
    pub fn metric_names(&self, content: &str) -> Result<Vec<String>> {
        let (header, rows) = self.read_rows(content)?;
        let kinds = self.classify(&header, &rows)?;
        Ok(header
            .into_iter()
            .zip(kinds)
            .filter(|(_, kind)| matches!(kind, ColumnKind::Metric(_)))
            .map(|(name, _)| name)
            .collect())
    }

    pub fn parse(&self, content: &str, selector: &DataSelector) -> Result<Series> {
        let (header, mut rows) = self.read_rows(content)?;
        let kinds = self.classify(&header, &rows)?;

        rows.retain(|row| selector.accepts_time(row.time));
        if let Some(n) = selector.last_n {
            let skip = rows.len().saturating_sub(n);
            rows.drain(..skip);
        }

        let time: Vec<i64> = rows.iter().map(|r| r.time).collect();
        let mut metrics = BTreeMap::new();
        let mut data = BTreeMap::new();
        let mut attributes = BTreeMap::new();

        for (col, (name, kind)) in header.iter().zip(&kinds).enumerate() {
            match kind {
                ColumnKind::Metric(metric) if selector.accepts_metric(name) => {
                    let values = rows
                        .iter()
                        .map(|row| parse_number(&row.cells[col], row.line))
                        .map(|v| v.map(|v| v.map(|v| v * metric.scale)))
                        .collect::<Result<Vec<_>>>()?;
                    metrics.insert(name.clone(), metric.clone());
                    data.insert(name.clone(), values);
                }
                ColumnKind::Attribute => {
                    let values = rows.iter().map(|row| row.cells[col].clone()).collect();
                    attributes.insert(name.clone(), values);
                }
                _ => {}
            }
        }

        tracing::debug!(
            "{}: imported {} runs, {} metrics",
            self.test_name,
            time.len(),
            data.len()
        );
        Series::new(
            self.test_name.clone(),
            self.branch.clone(),
            time,
            metrics,
            data,
            attributes,
        )
    }

    /// Splits `content` into the header and time-sorted rows
    fn read_rows(&self, content: &str) -> Result<(Vec<String>, Vec<Row>)> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((header_line, header)) = lines.next() else {
            return Err(HunterError::import(1, "missing header row"));
        };
        let header = split_record(header, self.options.delimiter, self.options.quote_char);
        let time_col = header
            .iter()
            .position(|name| *name == self.options.time_column)
            .ok_or_else(|| {
                HunterError::import(
                    header_line,
                    format!("time column '{}' not found", self.options.time_column),
                )
            })?;

        let mut rows = Vec::new();
        for (line, text) in lines {
            let cells = split_record(text, self.options.delimiter, self.options.quote_char);
            if cells.len() != header.len() {
                return Err(HunterError::import(
                    line,
                    format!("expected {} fields, found {}", header.len(), cells.len()),
                ));
            }
            let time = parse_datetime(&cells[time_col])
                .map_err(|e| HunterError::import(line, e.to_string()))?;
            rows.push(Row { line, time, cells });
        }

        rows.sort_by_key(|r| r.time);
        if let Some(pair) = rows.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(HunterError::import(
                pair[1].line,
                format!("duplicate time {} (also on line {})", pair[1].time, pair[0].line),
            ));
        }

        Ok((header, rows))
    }

    fn classify(&self, header: &[String], rows: &[Row]) -> Result<Vec<ColumnKind>> {
        let attributes: BTreeSet<&str> = self.attributes.iter().map(String::as_str).collect();
        let mut seen = BTreeSet::new();

        header
            .iter()
            .enumerate()
            .map(|(col, name)| {
                if !seen.insert(name.as_str()) {
                    return Err(HunterError::import(1, format!("duplicate column '{}'", name)));
                }
                if *name == self.options.time_column {
                    return Ok(ColumnKind::Time);
                }
                if attributes.contains(name.as_str()) {
                    return Ok(ColumnKind::Attribute);
                }
                if let Some(metric) = self.metrics.get(name) {
                    return Ok(ColumnKind::Metric(metric.clone()));
                }
                let numeric = rows
                    .iter()
                    .all(|row| parse_number(&row.cells[col], row.line).is_ok());
                Ok(if numeric {
                    ColumnKind::Metric(Metric::default())
                } else {
                    tracing::debug!("{}: ignoring non-numeric column {}", self.test_name, name);
                    ColumnKind::Ignored
                })
            })
            .collect()
    }
}

/// Empty cells are gaps; NaN and infinities are rejected
fn parse_number(cell: &str, line: usize) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(HunterError::import(line, format!("invalid number '{}'", cell))),
    }
}

/// Splits one record; a doubled quote inside quotes is a literal quote
fn split_record(line: &str, delimiter: char, quote: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == quote {
                if chars.peek() == Some(&quote) {
                    field.push(quote);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == quote {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(field.trim().to_string());
            field.clear();
        } else {
            field.push(c);
        }
    }
    fields.push(field.trim().to_string());
    fields
}
