//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::data_source;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::batch::{self, LOOKBACK_WEEKS, MAX_CONCURRENT_SYMBOLS};
use crate::domain::config_validation::{
    self, index_setting, validate_data_config, validate_simulation_config, DEFAULT_MAX_STOCKS,
    DEFAULT_REBALANCE_INTERVAL_WEEKS,
};
use crate::domain::error::TrendpickError;
use crate::domain::metrics::StockMetrics;
use crate::domain::ranking;
use crate::domain::rule_eval::{self, CompiledRule};
use crate::domain::simulation::{SimulationParams, SimulationResult, Simulator};
use crate::domain::universe::{parse_symbols, StockIndex};
use crate::ports::config_port::ConfigPort;
use crate::ports::index_port::IndexPort;
use crate::ports::result_port::ResultPort;

#[derive(Parser, Debug)]
#[command(name = "trendpick", about = "Trend-stability stock picker and rebalancing backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute trend metrics for index members
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// As-of date (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        index: Option<String>,
        /// Comma-separated symbols instead of index members
        #[arg(long)]
        symbols: Option<String>,
        /// JSON output file, default stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank index members with a rule and print the top picks
    Pick {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        rule: Option<String>,
        #[arg(long)]
        max_stocks: Option<usize>,
        #[arg(long)]
        index: Option<String>,
    },
    /// Run a periodic-rebalancing backtest
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        rule: Option<String>,
        #[arg(long)]
        max_stocks: Option<usize>,
        #[arg(long)]
        interval_weeks: Option<u32>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Check a rule, or a whole config file
    Validate {
        #[arg(long, conflicts_with = "config", required_unless_present = "config")]
        rule: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            date,
            index,
            symbols,
            output,
        } => run_analyze(&config, date.as_deref(), index.as_deref(), symbols.as_deref(), output.as_ref()),
        Command::Pick {
            config,
            date,
            rule,
            max_stocks,
            index,
        } => run_pick(&config, date.as_deref(), rule.as_deref(), max_stocks, index.as_deref()),
        Command::Simulate {
            config,
            output,
            rule,
            max_stocks,
            interval_weeks,
            dry_run,
        } => {
            let overrides = SimulationOverrides {
                rule,
                max_stocks,
                interval_weeks,
            };
            if dry_run {
                run_dry_run(&config)
            } else {
                run_simulate(&config, output.as_ref(), &overrides)
            }
        }
        Command::Validate { rule, config } => match (rule, config) {
            (Some(rule), _) => run_validate_rule(&rule),
            (None, Some(config)) => run_dry_run(&config),
            (None, None) => {
                eprintln!("error: --rule or --config is required");
                ExitCode::from(2)
            }
        },
    }
}

/// Print `err` and map it to its exit code. Rule parse errors are shown with
/// a caret under the offending position.
fn fail(err: &TrendpickError, rule_text: Option<&str>) -> ExitCode {
    match (err, rule_text) {
        (TrendpickError::RuleParse(parse), Some(text)) => {
            eprintln!("error: invalid rule:\n{}", parse.display_with_context(text));
        }
        _ => eprintln!("error: {err}"),
    }
    err.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e, None))
}

fn parse_as_of(date: Option<&str>) -> Result<NaiveDate, TrendpickError> {
    match date {
        None => Ok(Local::now().date_naive()),
        Some(s) => config_validation::parse_date(Some(s), "date"),
    }
}

fn resolve_index(flag: Option<&str>, config: &dyn ConfigPort) -> Result<StockIndex, TrendpickError> {
    match flag {
        Some(name) => name.parse().map_err(|e: crate::domain::universe::UniverseError| {
            TrendpickError::ConfigInvalid {
                section: "simulation".into(),
                key: "index".into(),
                reason: e.to_string(),
            }
        }),
        None => index_setting(config, "index"),
    }
}

pub fn resolve_rule(flag: Option<&str>, config: &dyn ConfigPort) -> Result<String, TrendpickError> {
    flag.map(str::to_string)
        .or_else(|| config.get_string("simulation", "rule"))
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| TrendpickError::ConfigMissing {
            section: "simulation".into(),
            key: "rule".into(),
        })
}

/// Command-line values that take precedence over `[simulation]`.
#[derive(Debug, Clone, Default)]
pub struct SimulationOverrides {
    pub rule: Option<String>,
    pub max_stocks: Option<usize>,
    pub interval_weeks: Option<u32>,
}

fn positive_setting<T: TryFrom<i64>>(
    config: &dyn ConfigPort,
    key: &str,
    default: i64,
) -> Result<T, TrendpickError> {
    let value = config.get_int("simulation", key, default);
    T::try_from(value)
        .ok()
        .filter(|_| value >= 1)
        .ok_or_else(|| TrendpickError::ConfigInvalid {
            section: "simulation".into(),
            key: key.into(),
            reason: format!("{} must be at least 1", key),
        })
}

/// Holding count from the flag or `[simulation] max_stocks`; zero is rejected
/// either way.
pub fn resolve_max_stocks(flag: Option<usize>, config: &dyn ConfigPort) -> Result<usize, TrendpickError> {
    match flag {
        Some(0) => Err(TrendpickError::ConfigInvalid {
            section: "simulation".into(),
            key: "max_stocks".into(),
            reason: "max_stocks must be at least 1".into(),
        }),
        Some(n) => Ok(n),
        None => positive_setting(config, "max_stocks", DEFAULT_MAX_STOCKS),
    }
}

pub fn build_simulation_params(
    config: &dyn ConfigPort,
    overrides: &SimulationOverrides,
) -> Result<SimulationParams, TrendpickError> {
    let date_start = config_validation::parse_date(
        config.get_string("simulation", "date_start").as_deref(),
        "date_start",
    )?;
    let date_end = config_validation::parse_date(
        config.get_string("simulation", "date_end").as_deref(),
        "date_end",
    )?;

    let max_stocks = resolve_max_stocks(overrides.max_stocks, config)?;
    let rebalance_interval_weeks = match overrides.interval_weeks {
        Some(n) => n,
        None => positive_setting(config, "rebalance_interval_weeks", DEFAULT_REBALANCE_INTERVAL_WEEKS)?,
    };

    let params = SimulationParams {
        date_start,
        date_end,
        max_stocks,
        rebalance_interval_weeks,
        index: index_setting(config, "index")?,
        baseline_index: index_setting(config, "baseline_index")?,
    };
    params.validate()?;
    Ok(params)
}

fn compile_rule(rule_text: &str) -> Result<CompiledRule, ExitCode> {
    rule_eval::compile(rule_text).map_err(|e| fail(&e, Some(rule_text)))
}

fn print_metrics_table(metrics: &[StockMetrics]) {
    println!(
        "{:<8} {:>6} {:>10} {:>8} {:>9} {:>9} {:>9}",
        "symbol", "weeks", "slope%/wk", "r2", "3m%", "1y%", "drop2w%"
    );
    for m in metrics {
        println!(
            "{:<8} {:>6} {:>10.3} {:>8.3} {:>9.2} {:>9.2} {:>9.2}",
            m.symbol,
            m.total_weeks,
            m.linear_slope_pct,
            m.linear_r_squared,
            m.change_3m_pct,
            m.change_1y_pct,
            m.max_drop_2w_pct
        );
    }
}

fn run_analyze(
    config_path: &PathBuf,
    date: Option<&str>,
    index_flag: Option<&str>,
    symbols_flag: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&config) {
        return fail(&e, None);
    }

    let as_of = match parse_as_of(date) {
        Ok(d) => d,
        Err(e) => return fail(&e, None),
    };
    let source = match data_source::open(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };

    let symbols = match symbols_flag {
        Some(list) => match parse_symbols(list) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: failed to parse symbols: {e}");
                return ExitCode::from(2);
            }
        },
        None => {
            let index = match resolve_index(index_flag, &config) {
                Ok(i) => i,
                Err(e) => return fail(&e, None),
            };
            match source.constituents_at(index, as_of) {
                Ok(s) => s,
                Err(e) => return fail(&e, None),
            }
        }
    };

    eprintln!("Analyzing {} symbols as of {}", symbols.len(), as_of);
    let pool = match batch::build_pool(MAX_CONCURRENT_SYMBOLS) {
        Ok(p) => p,
        Err(e) => return fail(&e, None),
    };
    let metrics = batch::compute_metrics_batch(&source, &symbols, as_of, LOOKBACK_WEEKS, &pool);
    eprintln!(
        "{} of {} symbols had enough data",
        metrics.len(),
        symbols.len()
    );

    let output = output_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    match JsonReportAdapter::new().write_metrics(&metrics, &output) {
        Ok(()) => {
            if output != "-" {
                eprintln!("Metrics written to: {}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e, None),
    }
}

fn run_pick(
    config_path: &PathBuf,
    date: Option<&str>,
    rule_flag: Option<&str>,
    max_stocks_flag: Option<usize>,
    index_flag: Option<&str>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&config) {
        return fail(&e, None);
    }

    let rule_text = match resolve_rule(rule_flag, &config) {
        Ok(r) => r,
        Err(e) => return fail(&e, None),
    };
    let rule = match compile_rule(&rule_text) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let max_stocks = match resolve_max_stocks(max_stocks_flag, &config) {
        Ok(n) => n,
        Err(e) => return fail(&e, None),
    };
    let index = match resolve_index(index_flag, &config) {
        Ok(i) => i,
        Err(e) => return fail(&e, None),
    };
    let as_of = match parse_as_of(date) {
        Ok(d) => d,
        Err(e) => return fail(&e, None),
    };

    let source = match data_source::open(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };
    let symbols = match source.constituents_at(index, as_of) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };
    let pool = match batch::build_pool(MAX_CONCURRENT_SYMBOLS) {
        Ok(p) => p,
        Err(e) => return fail(&e, None),
    };

    eprintln!("Picking from {} {} members as of {}", symbols.len(), index, as_of);
    let metrics = batch::compute_metrics_batch(&source, &symbols, as_of, LOOKBACK_WEEKS, &pool);
    let analyzed = metrics.len();
    let mut ranked = ranking::apply(metrics, |m| rule.matches(m));
    eprintln!("{} analyzed, {} passed the rule", analyzed, ranked.len());
    ranked.truncate(max_stocks);

    if ranked.is_empty() {
        eprintln!("No symbols matched: {}", rule.source());
    } else {
        print_metrics_table(&ranked);
    }
    ExitCode::SUCCESS
}

pub fn print_summary(result: &SimulationResult) {
    eprintln!("\n=== Rebalances ===");
    for h in &result.rebalance_history {
        let picks: Vec<&str> = h.investments.iter().map(|i| i.symbol.as_str()).collect();
        eprintln!(
            "  {}  balance {:>12.2}  profit {:>+10.2} ({:>+6.2}%)  baseline {:>+6.2}%  [{}]",
            h.date,
            h.balance,
            h.profit,
            h.profit_pct * 100.0,
            h.baseline_profit_pct,
            picks.join(", ")
        );
    }

    eprintln!("\n=== Results ===");
    eprintln!("Period:           {} to {}", result.date_start, result.date_end);
    eprintln!("Rebalances:       {}", result.rebalance_history.len());
    eprintln!("Initial Balance:  {:.2}", result.initial_balance);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!("Total Return:     {:.2}%", result.profit_pct * 100.0);
    eprintln!(
        "Baseline ({}):  {:.2} ({:.2}%)",
        result.baseline_index,
        result.baseline_balance,
        result.baseline_profit_pct * 100.0
    );
}

fn run_simulate(config_path: &PathBuf, output_path: Option<&PathBuf>, overrides: &SimulationOverrides) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&config) {
        return fail(&e, None);
    }

    let params = match build_simulation_params(&config, overrides) {
        Ok(p) => p,
        Err(e) => return fail(&e, None),
    };
    let rule_text = match resolve_rule(overrides.rule.as_deref(), &config) {
        Ok(r) => r,
        Err(e) => return fail(&e, None),
    };
    let rule = match compile_rule(&rule_text) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let source = match data_source::open(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };

    eprintln!(
        "Simulating {} to {}: top {} of {} every {} weeks",
        params.date_start, params.date_end, params.max_stocks, params.index, params.rebalance_interval_weeks
    );
    let simulator = match Simulator::new(params, rule, &source, &source) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };
    let result = match simulator.simulate() {
        Ok(r) => r,
        Err(e) => return fail(&e, None),
    };

    print_summary(&result);

    let output = output_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("simulation.json"));
    match JsonReportAdapter::new().write_simulation(&result, &output.display().to_string()) {
        Ok(()) => {
            eprintln!("\nResult written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e, None),
    }
}

pub fn run_dry_run(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_data_config(&config) {
        return fail(&e, None);
    }
    if let Err(e) = validate_simulation_config(&config) {
        let rule = config.get_string("simulation", "rule");
        return fail(&e, rule.as_deref());
    }
    eprintln!("Config validated successfully");

    let params = match build_simulation_params(&config, &SimulationOverrides::default()) {
        Ok(p) => p,
        Err(e) => return fail(&e, None),
    };
    let rule_text = config.get_string("simulation", "rule").unwrap_or_default();

    eprintln!("\nSimulation:");
    eprintln!("  period:    {} to {}", params.date_start, params.date_end);
    eprintln!("  index:     {} (baseline {})", params.index, params.baseline_index);
    eprintln!("  holdings:  {}", params.max_stocks);
    eprintln!("  interval:  {} weeks", params.rebalance_interval_weeks);
    eprintln!("  rule:      {}", rule_text);
    eprintln!(
        "  fields:    {}",
        rule_eval::extract_referenced_fields(&rule_text).join(", ")
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate_rule(rule_text: &str) -> ExitCode {
    let rule = match compile_rule(rule_text) {
        Ok(r) => r,
        Err(code) => return code,
    };
    eprintln!("Rule is valid: {}", rule.source());
    for field in rule.referenced_fields() {
        println!("{}", field);
    }
    ExitCode::SUCCESS
}
