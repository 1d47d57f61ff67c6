// Human and machine readable output of an analysis
//
// - Log: table of all runs, change points marked by dotted lines carrying
//   the signed percent change of each affected metric
// - Json: {"<test>": [{"time": .., "changes": [..]}, ..]}
// - RegressionsOnly: only change points going in the wrong direction

use crate::analysis::ComparativeStats;
use crate::analyzed::{AnalyzedSeries, ChangePointGroup};
use crate::compare::Regression;
use crate::util::{format_timestamp, insert_multiple, remove_common_prefix};
use serde_json::{Map, Value};

/// Output format of `Report::produce_report`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportType {
    #[default]
    Log,
    Json,
    RegressionsOnly,
}

const COLUMN_GAP: &str = "  ";

struct Column {
    header: String,
    cells: Vec<String>,
    right_aligned: bool,
    /// Metric name, for matching change points
    metric: Option<String>,
}

impl Column {
    fn width(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.chars().count())
            .chain(std::iter::once(self.header.chars().count()))
            .max()
            .unwrap_or(0)
    }
}

/// Report over one analyzed series
pub struct Report<'a> {
    series: &'a AnalyzedSeries,
}

impl<'a> Report<'a> {
    pub fn new(series: &'a AnalyzedSeries) -> Self {
        Self { series }
    }

    fn change_points(&self) -> &'a [ChangePointGroup] {
        self.series.change_points_by_time()
    }

    pub fn produce_report(&self, report_type: ReportType) -> String {
        match report_type {
            ReportType::Log => self.format_log_annotated(),
            ReportType::Json => self.format_json(),
            ReportType::RegressionsOnly => self.format_regressions_only(),
        }
    }

    fn columns(&self) -> Vec<Column> {
        let mut columns = vec![Column {
            header: "time".to_string(),
            cells: self.series.time().iter().map(|&t| format_timestamp(t)).collect(),
            right_aligned: false,
            metric: None,
        }];

        for name in self.series.attribute_names() {
            columns.push(Column {
                header: name.to_string(),
                cells: self
                    .series
                    .attribute_values(name)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default(),
                right_aligned: false,
                metric: None,
            });
        }

        let metrics: Vec<String> = self.series.metric_names().map(String::from).collect();
        let headers = remove_common_prefix(&metrics, ".");
        for (metric, header) in metrics.into_iter().zip(headers) {
            let cells = self
                .series
                .data(&metric)
                .map(|values| values.iter().map(|v| format_value(*v)).collect())
                .unwrap_or_default();
            columns.push(Column {
                header,
                cells,
                right_aligned: true,
                metric: Some(metric),
            });
        }
        columns
    }

    /// Test log with change points marked as horizontal lines
    fn format_log_annotated(&self) -> String {
        let columns = self.columns();
        let widths: Vec<usize> = columns.iter().map(Column::width).collect();

        let row = |cells: Vec<String>| -> String {
            cells.join(COLUMN_GAP).trim_end().to_string()
        };
        let pad = |text: &str, col: usize| -> String {
            let fill = widths[col].saturating_sub(text.chars().count());
            if columns[col].right_aligned {
                format!("{}{}", " ".repeat(fill), text)
            } else {
                format!("{}{}", text, " ".repeat(fill))
            }
        };

        let header = row((0..columns.len()).map(|c| pad(&columns[c].header, c)).collect());
        let rule = row(widths.iter().map(|&w| "-".repeat(w)).collect());
        let lines: Vec<String> = (0..self.series.len())
            .map(|i| row((0..columns.len()).map(|c| pad(&columns[c].cells[i], c)).collect()))
            .collect();

        let mut separators = Vec::new();
        let mut indexes = Vec::new();
        for group in self.change_points() {
            let mut dots = Vec::with_capacity(columns.len());
            let mut info = Vec::with_capacity(columns.len());
            for (col, column) in columns.iter().enumerate() {
                let change = column
                    .metric
                    .as_deref()
                    .and_then(|m| group.changes.iter().find(|c| c.metric == m));
                match change {
                    Some(change) => {
                        let percent = format!("{:+.1}%", change.forward_change_percent());
                        dots.push("·".repeat(widths[col]));
                        info.push(format!("{:>width$}", percent, width = widths[col]));
                    }
                    None => {
                        dots.push(" ".repeat(widths[col]));
                        info.push(" ".repeat(widths[col]));
                    }
                }
            }
            let dots = row(dots);
            separators.push(format!("{}\n{}\n{}", dots, row(info), dots));
            indexes.push(group.index);
        }

        let mut output = vec![header, rule];
        output.extend(insert_multiple(&lines, &separators, &indexes));
        output.join("\n")
    }

    fn format_json(&self) -> String {
        let groups: Vec<Value> = self
            .change_points()
            .iter()
            .map(ChangePointGroup::to_json)
            .collect();
        let mut report = Map::new();
        report.insert(self.series.test_name().to_string(), Value::Array(groups));
        Value::Object(report).to_string()
    }

    fn format_regressions_only(&self) -> String {
        let test_name = self.series.test_name();
        let mut output = Vec::new();

        for group in self.change_points() {
            let regressions: Vec<String> = group
                .changes
                .iter()
                .filter(|cp| {
                    self.series.metric(&cp.metric).is_some_and(|m| {
                        f64::from(m.direction) * cp.forward_change_percent() < 0.0
                    })
                })
                .map(|cp| regression_line(&cp.metric, &cp.stats))
                .collect();

            if !regressions.is_empty() {
                output.push(format_timestamp(group.time));
                output.extend(regressions);
            }
        }

        regressions_summary(test_name, &output)
    }
}

fn regression_line(metric: &str, stats: &ComparativeStats) -> String {
    format!(
        "    {:16}:\t{:>8.3}\t--> {:>8.3}\t({:+6.1}%)",
        metric,
        stats.mean_1,
        stats.mean_2,
        stats.forward_rel_change() * 100.0
    )
}

fn regressions_summary(test_name: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        format!("No regressions found in {}.", test_name)
    } else {
        format!("Regressions in {}:\n{}", test_name, lines.join("\n"))
    }
}

/// Lists the regressions found by `compare`, in the same layout as
/// `ReportType::RegressionsOnly`
pub fn format_regressions(test_name: &str, regressions: &[Regression]) -> String {
    let lines: Vec<String> = regressions
        .iter()
        .map(|r| regression_line(&r.metric, &r.stats))
        .collect();
    regressions_summary(test_name, &lines)
}

/// Gaps are blank; trailing zeros are dropped
fn format_value(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) => {
            let text = format!("{:.6}", v);
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    }
}
