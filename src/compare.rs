// Comparison of two points of (possibly different) analyzed series
//
// For every metric present in both series, the values of the stable range
// around each index are compared with the significance tester of the first
// series. Typical use: baseline run vs latest run.

use crate::analysis::ComparativeStats;
use crate::analyzed::AnalyzedSeries;
use crate::error::{HunterError, Result};
use std::collections::BTreeMap;

/// Outcome of `compare`
#[derive(Debug, Clone)]
pub struct SeriesComparison<'a> {
    pub series_1: &'a AnalyzedSeries,
    pub series_2: &'a AnalyzedSeries,
    pub index_1: usize,
    pub index_2: usize,
    /// Keyed by metric name
    pub stats: BTreeMap<String, ComparativeStats>,
}

/// A metric that got significantly worse from `series_1` to `series_2`
#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub metric: String,
    pub stats: ComparativeStats,
}

impl Regression {
    pub fn change_percent(&self) -> f64 {
        self.stats.forward_rel_change() * 100.0
    }
}

impl SeriesComparison<'_> {
    /// Metrics whose mean moved in the wrong direction with
    /// `pvalue < max_pvalue` of the first series' options
    pub fn regressions(&self) -> Vec<Regression> {
        let max_pvalue = self.series_1.options().max_pvalue;
        self.stats
            .iter()
            .filter(|(name, stats)| {
                self.series_1
                    .metric(name)
                    .is_some_and(|m| m.is_regression(stats, max_pvalue))
            })
            .map(|(name, stats)| Regression {
                metric: name.clone(),
                stats: *stats,
            })
            .collect()
    }
}

fn resolve_index(series: &AnalyzedSeries, index: Option<usize>) -> Result<usize> {
    let last = series.len().saturating_sub(1);
    match index {
        None => Ok(last),
        Some(i) if i < series.len() || (series.is_empty() && i == 0) => Ok(i),
        Some(i) => Err(HunterError::invalid_options(format!(
            "index {} out of range for test {} with {} points",
            i,
            series.test_name(),
            series.len()
        ))),
    }
}

/// Values of `metric` in the stable range around `index`, gaps dropped
fn stable_values(series: &AnalyzedSeries, metric: &str, index: usize) -> Result<Vec<f64>> {
    let (begin, end) = series.get_stable_range(metric, index)?;
    Ok(series
        .data(metric)
        .map(|data| data[begin..end].iter().flatten().copied().collect())
        .unwrap_or_default())
}

/// Compares the point `index_1` of `series_1` with the point `index_2` of
/// `series_2`. Omitted indexes default to the last point.
///
/// Metrics without values on either side are skipped.
pub fn compare<'a>(
    series_1: &'a AnalyzedSeries,
    index_1: Option<usize>,
    series_2: &'a AnalyzedSeries,
    index_2: Option<usize>,
) -> Result<SeriesComparison<'a>> {
    let index_1 = resolve_index(series_1, index_1)?;
    let index_2 = resolve_index(series_2, index_2)?;

    let options = series_1.options();
    let tester = options.tester.build(options.seed);
    let mut stats = BTreeMap::new();

    for metric in series_1.metric_names() {
        if series_2.metric(metric).is_none() {
            continue;
        }

        let data_1 = stable_values(series_1, metric, index_1)?;
        let data_2 = stable_values(series_2, metric, index_2)?;
        if data_1.is_empty() || data_2.is_empty() {
            tracing::warn!(
                "metric {} has no values around the compared points, skipping",
                metric
            );
            continue;
        }

        stats.insert(metric.to_string(), tester.compare(&data_1, &data_2)?);
    }

    Ok(SeriesComparison {
        series_1,
        series_2,
        index_1,
        index_2,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisOptions;
    use crate::series::{Metric, Series};

    fn analyzed(name: &str, values: &[f64], direction: i8) -> AnalyzedSeries {
        let time = (0..values.len() as i64).collect();
        let metrics = BTreeMap::from([("m".to_string(), Metric::new(direction, 1.0, ""))]);
        let data = BTreeMap::from([("m".to_string(), values.iter().copied().map(Some).collect())]);
        Series::new(name, None, time, metrics, data, BTreeMap::new())
            .unwrap()
            .analyze(&AnalysisOptions::default())
            .unwrap()
    }

    fn series_a() -> AnalyzedSeries {
        analyzed(
            "a",
            &[1.02, 0.95, 0.99, 1.00, 1.04, 1.02, 0.50, 0.51, 0.48, 0.48, 0.53],
            1,
        )
    }

    fn series_b() -> AnalyzedSeries {
        analyzed(
            "b",
            &[2.02, 2.03, 2.01, 2.04, 0.51, 0.49, 0.51, 0.49, 0.48, 0.52, 0.50],
            1,
        )
    }

    #[test]
    fn test_compare_latest_points() {
        let (a, b) = (series_a(), series_b());
        assert_eq!(a.change_points("m")[0].index, 6);
        assert_eq!(b.change_points("m")[0].index, 4);

        let cmp = compare(&a, None, &b, None).unwrap();
        assert_eq!((cmp.index_1, cmp.index_2), (10, 10));
        let stats = cmp.stats["m"];
        assert!((stats.mean_1 - 0.5).abs() < 1e-9);
        assert!((stats.mean_2 - 0.5).abs() < 1e-9);
        assert_eq!(stats.pvalue, 1.0);
        assert!(cmp.regressions().is_empty());
    }

    #[test]
    fn test_compare_first_points() {
        let (a, b) = (series_a(), series_b());
        let stats = compare(&a, Some(0), &b, Some(0)).unwrap().stats["m"];
        assert!((stats.mean_1 - 1.003333).abs() < 1e-5);
        assert!((stats.mean_2 - 2.025).abs() < 1e-9);
        assert!(stats.pvalue < 1e-10);
    }

    #[test]
    fn test_compare_same_series_detects_regression() {
        let a = series_a();
        let cmp = compare(&a, Some(5), &a, None).unwrap();
        let regressions = cmp.regressions();
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].metric, "m");
        assert!((regressions[0].change_percent() + 50.17).abs() < 0.1);
    }

    #[test]
    fn test_compare_with_single_point() {
        let a = series_a();
        let close = analyzed("single", &[0.51], 1);
        let stats = compare(&a, Some(10), &close, None).unwrap().stats["m"];
        assert!(stats.pvalue > 0.5);
        assert_eq!(stats.std_2, 0.0);

        let far = analyzed("single", &[0.99], 1);
        let cmp = compare(&a, Some(10), &far, None).unwrap();
        assert!(cmp.stats["m"].pvalue < 0.001);
        // Higher is better, so this is an improvement.
        assert!(cmp.regressions().is_empty());
    }

    #[test]
    fn test_lower_is_better_direction() {
        let a = series_a();
        let b = analyzed(
            "b",
            &[2.02, 2.03, 2.01, 2.04, 0.51, 0.49, 0.51, 0.49, 0.48, 0.52, 0.50],
            -1,
        );
        // The metric definition of the first series decides.
        let cmp = compare(&a, Some(10), &b, Some(0)).unwrap();
        assert!(cmp.regressions().is_empty());

        // 0.5 -> 1.0 on a lower-is-better metric
        let cmp = compare(&b, Some(10), &a, Some(0)).unwrap();
        assert_eq!(cmp.regressions().len(), 1);
    }

    #[test]
    fn test_compare_skips_missing_and_empty_metrics() {
        let a = series_a();
        let other = Series::new(
            "other",
            None,
            vec![1, 2],
            BTreeMap::new(),
            BTreeMap::from([
                ("m".to_string(), vec![None, None]),
                ("x".to_string(), vec![Some(1.0), Some(2.0)]),
            ]),
            BTreeMap::new(),
        )
        .unwrap()
        .analyze(&AnalysisOptions::default())
        .unwrap();
        let cmp = compare(&a, None, &other, None).unwrap();
        assert!(cmp.stats.is_empty());
    }

    #[test]
    fn test_compare_rejects_out_of_range_index() {
        let a = series_a();
        assert!(compare(&a, Some(11), &a, None).is_err());
    }
}
