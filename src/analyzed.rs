// Series with computed change points
//
// `AnalyzedSeries` is built once from a `Series` and `AnalysisOptions`:
// every metric is gap-filled and searched independently (in parallel with
// rayon), then the per-metric change points are grouped by index.

use crate::analysis::{compute_change_points, fill_missing, AnalysisOptions, ComparativeStats};
use crate::error::{HunterError, Result};
use crate::series::{Metric, Series};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A change point of a single metric
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePoint {
    pub metric: String,
    pub index: usize,
    pub time: i64,
    pub stats: ComparativeStats,
}

impl ChangePoint {
    pub fn forward_change_percent(&self) -> f64 {
        self.stats.forward_rel_change() * 100.0
    }

    pub fn backward_change_percent(&self) -> f64 {
        self.stats.backward_rel_change() * 100.0
    }

    pub fn magnitude(&self) -> f64 {
        self.stats.change_magnitude()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "metric": self.metric,
            "forward_change_percent": format!("{:.0}", self.forward_change_percent()),
        })
    }
}

/// Change points of several metrics at the same index
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePointGroup {
    pub index: usize,
    pub time: i64,
    pub prev_time: i64,
    pub attributes: BTreeMap<String, String>,
    pub prev_attributes: BTreeMap<String, String>,
    pub changes: Vec<ChangePoint>,
}

impl ChangePointGroup {
    pub fn to_json(&self) -> Value {
        json!({
            "time": self.time,
            "changes": self.changes.iter().map(ChangePoint::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Time series data with computed change points
#[derive(Debug, Clone)]
pub struct AnalyzedSeries {
    series: Series,
    options: AnalysisOptions,
    change_points: BTreeMap<String, Vec<ChangePoint>>,
    change_points_by_time: Vec<ChangePointGroup>,
}

impl AnalyzedSeries {
    pub(crate) fn new(series: Series, options: AnalysisOptions) -> Result<Self> {
        options.validate()?;
        let change_points = Self::compute_change_points(&series, &options)?;
        let change_points_by_time = Self::group_change_points_by_time(&series, &change_points);
        Ok(Self {
            series,
            options,
            change_points,
            change_points_by_time,
        })
    }

    fn compute_change_points(
        series: &Series,
        options: &AnalysisOptions,
    ) -> Result<BTreeMap<String, Vec<ChangePoint>>> {
        if series.is_empty() {
            return Ok(series
                .data()
                .keys()
                .map(|metric| (metric.clone(), Vec::new()))
                .collect());
        }

        let tester = options.tester.build(options.seed);
        let time = series.time();

        series
            .data()
            .par_iter()
            .map(|(metric, raw)| -> Result<(String, Vec<ChangePoint>)> {
                let values: Vec<f64> = fill_missing(raw).into_iter().flatten().collect();
                if values.len() != raw.len() {
                    tracing::debug!("metric {} has no values, skipping", metric);
                    return Ok((metric.clone(), Vec::new()));
                }

                let found = compute_change_points(&values, options, tester.as_ref())?;
                tracing::debug!("metric {}: {} change points", metric, found.len());
                let points = found
                    .into_iter()
                    .map(|c| ChangePoint {
                        metric: metric.clone(),
                        index: c.index,
                        time: time[c.index],
                        stats: c.stats,
                    })
                    .collect();
                Ok((metric.clone(), points))
            })
            .collect()
    }

    fn group_change_points_by_time(
        series: &Series,
        change_points: &BTreeMap<String, Vec<ChangePoint>>,
    ) -> Vec<ChangePointGroup> {
        let mut changes: Vec<&ChangePoint> = change_points.values().flatten().collect();
        changes.sort_by_key(|c| c.index);

        let time = series.time();
        let mut groups: Vec<ChangePointGroup> = Vec::new();
        for change in changes {
            match groups.last_mut() {
                Some(group) if group.index == change.index => group.changes.push(change.clone()),
                _ => {
                    let index = change.index;
                    let prev = index.saturating_sub(1);
                    groups.push(ChangePointGroup {
                        index,
                        time: time[index],
                        prev_time: time[prev],
                        attributes: series.attributes_at(index),
                        prev_attributes: series.attributes_at(prev),
                        changes: vec![change.clone()],
                    });
                }
            }
        }
        groups
    }

    /// Returns `(begin, end)` such that no change point of `metric` lies
    /// strictly between them and `begin <= index < end`.
    ///
    /// `begin` is the nearest change point at or before `index` (or 0),
    /// `end` is the nearest change point after `index` (or the series length).
    pub fn get_stable_range(&self, metric: &str, index: usize) -> Result<(usize, usize)> {
        let points = self
            .change_points
            .get(metric)
            .ok_or_else(|| HunterError::UnknownMetric(metric.to_string()))?;

        let begin = points
            .iter()
            .take_while(|cp| cp.index <= index)
            .last()
            .map_or(0, |cp| cp.index);
        let end = points
            .iter()
            .find(|cp| cp.index > index)
            .map_or(self.len(), |cp| cp.index);
        Ok((begin, end))
    }

    pub fn test_name(&self) -> &str {
        self.series.test_name()
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.series.branch()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn time(&self) -> &[i64] {
        self.series.time()
    }

    /// Raw (unfilled) values of `metric`
    pub fn data(&self, metric: &str) -> Option<&[Option<f64>]> {
        self.series.data().get(metric).map(Vec::as_slice)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.series.attributes().keys().map(String::as_str)
    }

    pub fn attributes_at(&self, index: usize) -> BTreeMap<String, String> {
        self.series.attributes_at(index)
    }

    pub fn attribute_values(&self, attribute: &str) -> Option<&[String]> {
        self.series.attributes().get(attribute).map(Vec::as_slice)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.series.metrics().keys().map(String::as_str)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.series.metrics().get(name)
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Change points of `metric`, sorted by index
    pub fn change_points(&self, metric: &str) -> &[ChangePoint] {
        self.change_points
            .get(metric)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Change points of all metrics grouped by index, sorted by index
    pub fn change_points_by_time(&self) -> &[ChangePointGroup] {
        &self.change_points_by_time
    }
}
