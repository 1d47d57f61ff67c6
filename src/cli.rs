//! CLI argument parsing for Hunter

use crate::analysis::{AnalysisOptions, TesterKind};
use crate::csv_import::DataSelector;
use crate::error::{HunterError, Result};
use crate::report::ReportType;
use crate::util::parse_datetime;
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hunter")]
#[command(version)]
#[command(about = "Finds change points and regressions in performance test results", long_about = None)]
pub struct Cli {
    /// Configuration file (default: hunter.toml in the working directory)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the tests defined in the configuration
    ListTests,

    /// List the metrics of a test
    ListMetrics {
        /// Test name
        test: String,
    },

    /// Find change points in the results of one or more tests
    Analyze(AnalyzeArgs),

    /// Compare a baseline run with the latest run and report regressions
    Regressions(RegressionsArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Test names
    #[arg(required = true)]
    pub tests: Vec<String>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "log")]
    pub format: ReportType,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args, Debug)]
pub struct RegressionsArgs {
    /// Test names
    #[arg(required = true)]
    pub tests: Vec<String>,

    /// Baseline is the first run at or after this time
    #[arg(long = "baseline-since", value_name = "TIME", conflicts_with = "baseline_index")]
    pub baseline_since: Option<String>,

    /// Baseline is the run at this index (default: 0)
    #[arg(long = "baseline-index", value_name = "INDEX")]
    pub baseline_index: Option<usize>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Overrides of the configured `AnalysisOptions`
#[derive(Args, Debug, Default)]
pub struct AnalysisArgs {
    /// Number of points searched at once
    #[arg(long = "window", value_name = "N")]
    pub window: Option<usize>,

    /// Maximum p-value of a reported change point
    #[arg(long = "max-pvalue", value_name = "P")]
    pub max_pvalue: Option<f64>,

    /// Minimum relative change of a reported change point (0.05 = 5%)
    #[arg(long = "min-magnitude", value_name = "M")]
    pub min_magnitude: Option<f64>,

    /// Significance test
    #[arg(long = "tester", value_enum)]
    pub tester: Option<TesterKind>,

    /// Seed of the permutation tester
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

impl AnalysisArgs {
    /// `base` with every given flag applied, validated
    pub fn apply(&self, base: &AnalysisOptions) -> Result<AnalysisOptions> {
        let mut options = base.clone();
        if let Some(window) = self.window {
            options.window_len = window;
        }
        if let Some(max_pvalue) = self.max_pvalue {
            options.max_pvalue = max_pvalue;
        }
        if let Some(min_magnitude) = self.min_magnitude {
            options.min_magnitude = min_magnitude;
        }
        if let Some(tester) = self.tester {
            options.tester = tester;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options.validate()?;
        Ok(options)
    }
}

/// Restricts the imported runs and metrics
#[derive(Args, Debug, Default)]
pub struct SelectionArgs {
    /// Ignore runs before this time (epoch seconds or YYYY-MM-DD[ HH:MM:SS])
    #[arg(long = "since", value_name = "TIME")]
    pub since: Option<String>,

    /// Ignore runs after this time
    #[arg(long = "until", value_name = "TIME")]
    pub until: Option<String>,

    /// Analyze only the most recent N runs
    #[arg(long = "last", value_name = "N")]
    pub last: Option<usize>,

    /// Analyze only metrics matching this regular expression
    #[arg(long = "metrics", value_name = "REGEX")]
    pub metrics: Option<String>,
}

impl SelectionArgs {
    pub fn selector(&self) -> Result<DataSelector> {
        let metrics = self
            .metrics
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| HunterError::invalid_options(format!("invalid --metrics: {}", e)))?;
        Ok(DataSelector {
            since: self.since.as_deref().map(parse_datetime).transpose()?,
            until: self.until.as_deref().map(parse_datetime).transpose()?,
            last_n: self.last,
            metrics,
        })
    }
}
