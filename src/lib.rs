//! Hunter - change point detection for performance test results
//!
//! This library finds statistically significant, sustained shifts in
//! metric time series (windowed E-Divisive search followed by bottom-up
//! pruning), groups them across metrics and compares arbitrary points of
//! two series to classify regressions.
//!
//! ```
//! use hunter::analysis::AnalysisOptions;
//! use hunter::series::Series;
//! use std::collections::BTreeMap;
//!
//! let values = [1.02, 0.95, 0.99, 1.00, 1.12, 0.90, 0.50, 0.51, 0.48, 0.48, 0.55];
//! let data = BTreeMap::from([(
//!     "throughput".to_string(),
//!     values.iter().copied().map(Some).collect::<Vec<_>>(),
//! )]);
//! let time = (0..values.len() as i64).collect();
//! let series = Series::new("demo", None, time, BTreeMap::new(), data, BTreeMap::new()).unwrap();
//!
//! let analyzed = series.analyze(&AnalysisOptions::default()).unwrap();
//! let groups = analyzed.change_points_by_time();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].index, 6);
//! ```

pub mod analysis;
pub mod analyzed;
pub mod cli;
pub mod compare;
pub mod config;
pub mod csv_import;
pub mod error;
pub mod report;
pub mod series;
pub mod util;

pub use analysis::{AnalysisOptions, ComparativeStats, TesterKind};
pub use analyzed::{AnalyzedSeries, ChangePoint, ChangePointGroup};
pub use compare::{compare, Regression, SeriesComparison};
pub use error::{HunterError, Result};
pub use series::{Metric, Series};
