// Time series of test results
//
// A `Series` holds every run of one performance test: the run times, the
// values of each metric (with gaps where a run did not report the metric)
// and string attributes such as commit hashes. It is validated once on
// construction and never modified afterwards; `analyze` consumes it and
// produces an `AnalyzedSeries`.

use crate::analysis::{AnalysisOptions, ComparativeStats};
use crate::analyzed::AnalyzedSeries;
use crate::error::{HunterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Properties of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metric {
    /// 1 if higher values are better, -1 if lower values are better
    pub direction: i8,
    /// Factor applied to raw values on import
    pub scale: f64,
    pub unit: String,
}

impl Default for Metric {
    fn default() -> Self {
        Self {
            direction: 1,
            scale: 1.0,
            unit: String::new(),
        }
    }
}

impl Metric {
    pub fn new(direction: i8, scale: f64, unit: impl Into<String>) -> Self {
        Self {
            direction,
            scale,
            unit: unit.into(),
        }
    }

    /// True if going from `mean_1` to `mean_2` is a significant change in
    /// the wrong direction
    pub fn is_regression(&self, stats: &ComparativeStats, max_pvalue: f64) -> bool {
        let direction = f64::from(self.direction);
        stats.mean_2 * direction < stats.mean_1 * direction && stats.pvalue < max_pvalue
    }
}

/// Runs of a single test, indexed by time
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    test_name: String,
    branch: Option<String>,
    time: Vec<i64>,
    metrics: BTreeMap<String, Metric>,
    data: BTreeMap<String, Vec<Option<f64>>>,
    attributes: BTreeMap<String, Vec<String>>,
}

impl Series {
    /// Builds a series, checking its invariants
    ///
    /// Every `data` and `attributes` sequence must have one entry per
    /// `time` entry, and `time` must be strictly increasing. Metrics with
    /// data but no entry in `metrics` get `Metric::default()`.
    pub fn new(
        test_name: impl Into<String>,
        branch: Option<String>,
        time: Vec<i64>,
        mut metrics: BTreeMap<String, Metric>,
        data: BTreeMap<String, Vec<Option<f64>>>,
        attributes: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let test_name = test_name.into();
        let len = time.len();

        if let Some(pos) = time.windows(2).position(|w| w[0] >= w[1]) {
            return Err(HunterError::invalid_series(format!(
                "{}: time must be strictly increasing (index {}: {} >= {})",
                test_name,
                pos,
                time[pos],
                time[pos + 1]
            )));
        }

        for (name, values) in &data {
            if values.len() != len {
                return Err(HunterError::invalid_series(format!(
                    "{}: metric {} has {} values, expected {}",
                    test_name,
                    name,
                    values.len(),
                    len
                )));
            }
        }

        for (name, values) in &attributes {
            if values.len() != len {
                return Err(HunterError::invalid_series(format!(
                    "{}: attribute {} has {} values, expected {}",
                    test_name,
                    name,
                    values.len(),
                    len
                )));
            }
        }

        if let Some(name) = metrics.keys().find(|name| !data.contains_key(*name)) {
            return Err(HunterError::invalid_series(format!(
                "{}: metric {} has no data",
                test_name, name
            )));
        }

        if let Some((name, metric)) = metrics.iter().find(|(_, m)| m.direction.abs() != 1) {
            return Err(HunterError::invalid_series(format!(
                "{}: metric {} has direction {}, expected 1 or -1",
                test_name, name, metric.direction
            )));
        }

        for name in data.keys() {
            metrics.entry(name.clone()).or_default();
        }

        Ok(Self {
            test_name,
            branch,
            time,
            metrics,
            data,
            attributes,
        })
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn time(&self) -> &[i64] {
        &self.time
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn metrics(&self) -> &BTreeMap<String, Metric> {
        &self.metrics
    }

    pub fn data(&self) -> &BTreeMap<String, Vec<Option<f64>>> {
        &self.data
    }

    pub fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// Attribute snapshot of the run at `index`
    pub fn attributes_at(&self, index: usize) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter_map(|(name, values)| values.get(index).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Index of the first run at or after `time`
    pub fn find_first_not_earlier_than(&self, time: i64) -> Option<usize> {
        self.time.iter().position(|&t| t >= time)
    }

    /// Indexes of the runs whose attribute `name` equals `value`
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Vec<usize> {
        self.attributes
            .get(name)
            .map(|values| {
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.as_str() == value)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Computes the change points of every metric
    pub fn analyze(self, options: &AnalysisOptions) -> Result<AnalyzedSeries> {
        tracing::info!("Computing change points for test {}...", self.test_name);
        AnalyzedSeries::new(self, options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Series {
        let data = BTreeMap::from([(
            "throughput".to_string(),
            vec![Some(1.0), None, Some(1.2), Some(1.1)],
        )]);
        let attributes = BTreeMap::from([(
            "commit".to_string(),
            vec!["a1".into(), "b2".into(), "a1".into(), "c3".into()],
        )]);
        Series::new(
            "sample",
            Some("main".into()),
            vec![10, 20, 30, 40],
            BTreeMap::new(),
            data,
            attributes,
        )
        .unwrap()
    }

    #[test]
    fn test_new_fills_in_default_metrics() {
        let series = sample();
        assert_eq!(series.len(), 4);
        assert_eq!(series.branch(), Some("main"));
        assert_eq!(series.metrics()["throughput"], Metric::default());
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let data = BTreeMap::from([("m".to_string(), vec![Some(1.0)])]);
        let err = Series::new("t", None, vec![1, 2], BTreeMap::new(), data, BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, HunterError::InvalidSeries(_)));

        let attributes = BTreeMap::from([("commit".to_string(), vec!["x".to_string()])]);
        assert!(Series::new("t", None, vec![1, 2], BTreeMap::new(), BTreeMap::new(), attributes)
            .is_err());
    }

    #[test]
    fn test_new_rejects_unordered_time() {
        let err = Series::new(
            "t",
            None,
            vec![1, 3, 3],
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_new_rejects_metric_without_data() {
        let metrics = BTreeMap::from([("latency".to_string(), Metric::new(-1, 1.0, "ms"))]);
        assert!(Series::new("t", None, vec![1], metrics, BTreeMap::new(), BTreeMap::new()).is_err());
    }

    #[test]
    fn test_new_rejects_bad_direction() {
        let metrics = BTreeMap::from([("m".to_string(), Metric::new(0, 1.0, ""))]);
        let data = BTreeMap::from([("m".to_string(), vec![Some(1.0)])]);
        assert!(Series::new("t", None, vec![1], metrics, data, BTreeMap::new()).is_err());
    }

    #[test]
    fn test_attributes_at() {
        let series = sample();
        assert_eq!(series.attributes_at(1)["commit"], "b2");
        assert!(series.attributes_at(10).is_empty());
    }

    #[test]
    fn test_find_first_not_earlier_than() {
        let series = sample();
        assert_eq!(series.find_first_not_earlier_than(0), Some(0));
        assert_eq!(series.find_first_not_earlier_than(25), Some(2));
        assert_eq!(series.find_first_not_earlier_than(40), Some(3));
        assert_eq!(series.find_first_not_earlier_than(41), None);
    }

    #[test]
    fn test_find_by_attribute() {
        let series = sample();
        assert_eq!(series.find_by_attribute("commit", "a1"), vec![0, 2]);
        assert!(series.find_by_attribute("commit", "zz").is_empty());
        assert!(series.find_by_attribute("version", "a1").is_empty());
    }

    #[test]
    fn test_is_regression_respects_direction() {
        let drop = ComparativeStats {
            mean_1: 10.0,
            mean_2: 8.0,
            std_1: 0.1,
            std_2: 0.1,
            pvalue: 0.0001,
        };
        assert!(Metric::new(1, 1.0, "ops/s").is_regression(&drop, 0.001));
        assert!(!Metric::new(-1, 1.0, "ms").is_regression(&drop, 0.001));

        let noisy = ComparativeStats { pvalue: 0.5, ..drop };
        assert!(!Metric::default().is_regression(&noisy, 0.001));
    }
}
