//! Configuration file (`hunter.toml`)
//!
//! # Example hunter.toml
//!
//! ```toml
//! [analysis]
//! window_len = 30
//! max_pvalue = 0.001
//! min_magnitude = 0.05
//!
//! [[test]]
//! name = "local.sample"
//! file = "data/sample.csv"
//! attributes = ["commit"]
//! branch = "main"
//!
//! [test.metrics.throughput]
//! direction = 1
//! unit = "ops/s"
//!
//! [test.metrics.latency]
//! direction = -1
//! scale = 1000.0
//! unit = "us"
//! ```

use crate::analysis::AnalysisOptions;
use crate::csv_import::{CsvImporter, CsvOptions};
use crate::error::{HunterError, Result};
use crate::series::Metric;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hunter.toml";

/// Root of hunter.toml
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HunterConfig {
    #[serde(default)]
    pub analysis: AnalysisOptions,

    /// Tests backed by CSV files
    #[serde(default)]
    pub test: Vec<TestConfig>,
}

/// A performance test whose results live in a CSV file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TestConfig {
    pub name: String,

    /// CSV file; relative paths are resolved against the config file
    pub file: PathBuf,

    #[serde(default = "default_time_column")]
    pub time_column: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Columns imported as attributes instead of metrics
    #[serde(default)]
    pub attributes: Vec<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
}

fn default_time_column() -> String {
    "time".to_string()
}

fn default_delimiter() -> char {
    ','
}

impl TestConfig {
    /// CSV importer configured for this test
    pub fn importer(&self) -> CsvImporter {
        CsvImporter {
            test_name: self.name.clone(),
            branch: self.branch.clone(),
            options: CsvOptions {
                delimiter: self.delimiter,
                time_column: self.time_column.clone(),
                ..CsvOptions::default()
            },
            metrics: self.metrics.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl HunterConfig {
    /// Load and validate a config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HunterError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            for test in &mut config.test {
                if test.file.is_relative() {
                    test.file = dir.join(&test.file);
                }
            }
        }
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HunterError::Config(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis
            .validate()
            .map_err(|e| HunterError::Config(e.to_string()))?;

        let mut names = BTreeSet::new();
        for test in &self.test {
            if !names.insert(test.name.as_str()) {
                return Err(HunterError::Config(format!(
                    "duplicate test name '{}'",
                    test.name
                )));
            }
            for (metric, def) in &test.metrics {
                if def.direction.abs() != 1 {
                    return Err(HunterError::Config(format!(
                        "test '{}': metric '{}' has direction {}, expected 1 or -1",
                        test.name, metric, def.direction
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn find_test(&self, name: &str) -> Result<&TestConfig> {
        self.test
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| HunterError::Config(format!("test '{}' not found", name)))
    }
}
