//! End-to-end analysis scenarios on small hand-made series
//!
//! Series -> AnalyzedSeries -> grouped change points, plus comparison of
//! points within and across series.

use hunter::analysis::{is_significant, SignificanceTester, TTestTester};
use hunter::{compare, AnalysisOptions, Series, TesterKind};
use std::collections::BTreeMap;

const SERIES_1: [f64; 11] = [1.02, 0.95, 0.99, 1.00, 1.12, 0.90, 0.50, 0.51, 0.48, 0.48, 0.55];
const SERIES_2: [f64; 11] = [2.02, 2.03, 2.01, 2.04, 1.82, 1.85, 1.79, 1.81, 1.80, 1.76, 1.78];

fn to_data(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

fn two_metric_series() -> Series {
    let time = (0..SERIES_1.len() as i64).collect();
    let data = BTreeMap::from([
        ("series1".to_string(), to_data(&SERIES_1)),
        ("series2".to_string(), to_data(&SERIES_2)),
    ]);
    Series::new("test", None, time, BTreeMap::new(), data, BTreeMap::new()).unwrap()
}

#[test]
fn test_change_points_grouped_across_metrics() {
    let analyzed = two_metric_series()
        .analyze(&AnalysisOptions::default())
        .unwrap();
    let groups = analyzed.change_points_by_time();
    assert_eq!(groups.len(), 2);

    assert_eq!(groups[0].index, 4);
    assert_eq!(groups[0].changes.len(), 1);
    assert_eq!(groups[0].changes[0].metric, "series2");
    assert!((groups[0].changes[0].forward_change_percent() + 11.0).abs() < 0.5);

    assert_eq!(groups[1].index, 6);
    assert_eq!(groups[1].changes.len(), 1);
    assert_eq!(groups[1].changes[0].metric, "series1");
    assert!((groups[1].changes[0].forward_change_percent() + 49.4).abs() < 0.1);
}

#[test]
fn test_min_magnitude_keeps_only_large_change() {
    let options = AnalysisOptions::default().with_min_magnitude(0.2);
    let analyzed = two_metric_series().analyze(&options).unwrap();
    let groups = analyzed.change_points_by_time();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].index, 6);
    assert_eq!(groups[0].changes[0].metric, "series1");
    for group in groups {
        for change in &group.changes {
            assert!(change.magnitude() >= 0.2);
        }
    }
}

#[test]
fn test_single_window_detection() {
    let values = [
        1.02, 0.95, 0.99, 1.00, 1.12, 1.00, 1.01, 0.98, 1.01, 0.96, 0.50, 0.51, 0.48, 0.48, 0.55,
        0.50, 0.49, 0.51, 0.50, 0.49,
    ];
    let time = (0..values.len() as i64).collect();
    let data = BTreeMap::from([("series".to_string(), to_data(&values))]);
    let series = Series::new("test", None, time, BTreeMap::new(), data, BTreeMap::new()).unwrap();

    let options = AnalysisOptions::default()
        .with_window_len(10)
        .with_max_pvalue(0.0001);
    let analyzed = series.analyze(&options).unwrap();
    let indexes: Vec<usize> = analyzed
        .change_points("series")
        .iter()
        .map(|c| c.index)
        .collect();
    assert_eq!(indexes, vec![10]);
}

#[test]
fn test_analysis_is_repeatable() {
    let options = AnalysisOptions::default();
    let first = two_metric_series().analyze(&options).unwrap();
    let second = two_metric_series().analyze(&options).unwrap();
    assert_eq!(first.change_points_by_time(), second.change_points_by_time());
}

#[test]
fn test_significance_boundary() {
    let same_1 = [1.0, 1.1, 0.9, 1.05, 0.95];
    let same_2 = [1.02, 0.97, 1.0, 1.08, 0.93];
    let stats = TTestTester.compare(&same_1, &same_2).unwrap();
    assert!(stats.pvalue > 0.9);
    assert!(!is_significant(stats.pvalue, 0.001));

    let far = [2.0, 2.1, 1.9, 2.05, 1.95];
    let stats = TTestTester.compare(&same_1, &far).unwrap();
    assert!(stats.pvalue < 1e-6);
    assert!(is_significant(stats.pvalue, 0.001));
}

#[test]
fn test_stable_range_between_change_points() {
    let values = [1.0, 1.01, 0.99, 1.0, 5.0, 5.02, 10.0, 10.01, 9.99, 10.0, 10.02, 10.0];
    let time = (0..values.len() as i64).collect();
    let data = BTreeMap::from([("m".to_string(), to_data(&values))]);
    let analyzed = Series::new("test", None, time, BTreeMap::new(), data, BTreeMap::new())
        .unwrap()
        .analyze(&AnalysisOptions::default())
        .unwrap();

    let indexes: Vec<usize> = analyzed.change_points("m").iter().map(|c| c.index).collect();
    assert_eq!(indexes, vec![4, 6]);

    for index in 0..4 {
        assert_eq!(analyzed.get_stable_range("m", index).unwrap(), (0, 4));
    }
    for index in 4..6 {
        assert_eq!(analyzed.get_stable_range("m", index).unwrap(), (4, 6));
    }
    for index in 6..12 {
        assert_eq!(analyzed.get_stable_range("m", index).unwrap(), (6, 12));
    }
}

#[test]
fn test_gaps_are_filled_before_analysis() {
    let mut data = to_data(&SERIES_1);
    data[0] = None;
    data[7] = None;
    let time = (0..data.len() as i64).collect();
    let analyzed = Series::new(
        "gaps",
        None,
        time,
        BTreeMap::new(),
        BTreeMap::from([("series1".to_string(), data)]),
        BTreeMap::new(),
    )
    .unwrap()
    .analyze(&AnalysisOptions::default())
    .unwrap();

    let indexes: Vec<usize> = analyzed
        .change_points("series1")
        .iter()
        .map(|c| c.index)
        .collect();
    assert_eq!(indexes, vec![6]);
    // The raw data keeps its gaps.
    assert_eq!(analyzed.data("series1").unwrap()[7], None);
}

#[test]
fn test_compare_baseline_with_latest() {
    let analyzed = two_metric_series()
        .analyze(&AnalysisOptions::default())
        .unwrap();
    let comparison = compare(&analyzed, Some(0), &analyzed, None).unwrap();
    assert_eq!(comparison.index_2, SERIES_1.len() - 1);
    assert_eq!(comparison.stats.len(), 2);

    let regressions = comparison.regressions();
    let metrics: Vec<&str> = regressions.iter().map(|r| r.metric.as_str()).collect();
    assert_eq!(metrics, vec!["series1", "series2"]);
}

#[test]
fn test_seeded_permutation_analysis() {
    let values: Vec<f64> = (0..60).map(|i| if i < 30 { 1.0 } else { 100.0 }).collect();
    let series = || {
        let time = (0..values.len() as i64).collect();
        let data = BTreeMap::from([("m".to_string(), to_data(&values))]);
        Series::new("perm", None, time, BTreeMap::new(), data, BTreeMap::new()).unwrap()
    };
    let mut options = AnalysisOptions::default().with_tester(TesterKind::Permutation);
    options.seed = Some(42);

    let first = series().analyze(&options).unwrap();
    let groups = first.change_points_by_time();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].index, 30);
    assert_eq!(groups[0].changes[0].metric, "m");

    let second = series().analyze(&options).unwrap();
    assert_eq!(first.change_points_by_time(), second.change_points_by_time());
}
