use anyhow::{Context, Result};
use clap::Parser;
use hunter::cli::{AnalyzeArgs, Cli, Command, RegressionsArgs};
use hunter::compare::compare;
use hunter::config::{HunterConfig, TestConfig, DEFAULT_CONFIG_FILE};
use hunter::csv_import::DataSelector;
use hunter::report::{format_regressions, Report};
use hunter::series::Series;
use hunter::util::parse_datetime;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE level
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit `--config` must exist; a missing default file means no tests
fn load_config(path: Option<&Path>) -> Result<HunterConfig> {
    match path {
        Some(path) => Ok(HunterConfig::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Ok(HunterConfig::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => {
            tracing::debug!("{} not found, no tests configured", DEFAULT_CONFIG_FILE);
            Ok(HunterConfig::default())
        }
    }
}

fn load_series(test: &TestConfig, selector: &DataSelector) -> Result<Series> {
    test.importer()
        .load(&test.file, selector)
        .with_context(|| format!("Failed to import {} from {}", test.name, test.file.display()))
}

fn list_metrics(config: &HunterConfig, name: &str) -> Result<()> {
    let test = config.find_test(name)?;
    let content = fs::read_to_string(&test.file)
        .with_context(|| format!("Failed to read {}", test.file.display()))?;
    for metric in test.importer().metric_names(&content)? {
        println!("{}", metric);
    }
    Ok(())
}

fn analyze(config: &HunterConfig, args: &AnalyzeArgs) -> Result<()> {
    let options = args.analysis.apply(&config.analysis)?;
    let selector = args.selection.selector()?;

    for name in &args.tests {
        let test = config.find_test(name)?;
        let analyzed = load_series(test, &selector)?.analyze(&options)?;
        println!("{}", Report::new(&analyzed).produce_report(args.format));
    }
    Ok(())
}

/// Returns true if any test regressed
fn regressions(config: &HunterConfig, args: &RegressionsArgs) -> Result<bool> {
    let options = args.analysis.apply(&config.analysis)?;
    let selector = args.selection.selector()?;
    let baseline_since = args
        .baseline_since
        .as_deref()
        .map(parse_datetime)
        .transpose()?;

    let mut regressed = false;
    for name in &args.tests {
        let test = config.find_test(name)?;
        let analyzed = load_series(test, &selector)?.analyze(&options)?;
        if analyzed.is_empty() {
            println!("No data found for {}.", name);
            continue;
        }

        let baseline = match baseline_since {
            Some(since) => analyzed
                .series()
                .find_first_not_earlier_than(since)
                .with_context(|| format!("No runs of {} at or after the baseline time", name))?,
            None => args.baseline_index.unwrap_or(0),
        };

        let comparison = compare(&analyzed, Some(baseline), &analyzed, None)?;
        let found = comparison.regressions();
        regressed |= !found.is_empty();
        println!("{}", format_regressions(name, &found));
    }
    Ok(regressed)
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = load_config(args.config.as_deref())?;

    match &args.command {
        Command::ListTests => {
            for test in &config.test {
                println!("{}", test.name);
            }
        }
        Command::ListMetrics { test } => list_metrics(&config, test)?,
        Command::Analyze(analyze_args) => analyze(&config, analyze_args)?,
        Command::Regressions(regression_args) => {
            if regressions(&config, regression_args)? {
                return Ok(ExitCode::from(1));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
