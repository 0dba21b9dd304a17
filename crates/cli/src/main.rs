//! CLI for checking whether solvers are pennying.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Args, Parser, Subcommand};
use slippage_analysis::{AnalyzerConfig, CurvePoint, ScanRange, SlippageAnalyzer, SolverModeResult, Verdict};
use slippage_dune::config::DEFAULT_BASE_URL;
use slippage_dune::{get_slippage, DuneClient, DuneConfig, Network};
use slippage_models::{SlippageObservation, SlippageRow};
use slippage_query::SlippageQuery;
use slippage_telemetry::{init_logging, report, Metrics};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pennying")]
#[command(about = "Check if solvers are pennying")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch solver slippage for a time window and classify every solver
    Check(CheckArgs),
    /// Print the slippage query without executing it
    PrintQuery {
        /// Minimum start time in the form of yyyy-mm-dd HH:MM
        min_start_time: String,

        /// Maximum start time in the form of yyyy-mm-dd HH:MM
        max_start_time: String,

        /// Only include batches settled by this solver address
        #[arg(long)]
        solver: Option<Address>,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Minimum start time in the form of yyyy-mm-dd HH:MM
    min_start_time: String,

    /// Maximum start time in the form of yyyy-mm-dd HH:MM
    max_start_time: String,

    /// Only include batches settled by this solver address
    #[arg(long)]
    solver: Option<Address>,

    /// Network whose tables are queried
    #[arg(long, default_value = "mainnet")]
    network: Network,

    /// Dune API base URL
    #[arg(long, env = "DUNE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    dune_base_url: String,

    /// Dune API key
    #[arg(long, env = "DUNE_API_KEY", hide_env_values = true)]
    dune_api_key: String,

    /// Delay between execution status checks in milliseconds
    #[arg(long, default_value = "2000")]
    poll_interval_ms: u64,

    /// Gaussian kernel bandwidth in USD
    #[arg(long, default_value = "1.0")]
    bandwidth: f64,

    /// Solvers whose slippage mode is at or below this value are pennying
    #[arg(long, default_value = "-0.2", allow_hyphen_values = true)]
    threshold: f64,

    /// Minimum observations required to classify a solver
    #[arg(long, default_value = "2")]
    min_observations: usize,

    /// Lower end of the mode search grid
    #[arg(long, default_value = "-15.0", allow_hyphen_values = true)]
    scan_start: f64,

    /// Upper end (exclusive) of the mode search grid
    #[arg(long, default_value = "15.0", allow_hyphen_values = true)]
    scan_end: f64,

    /// Mode search grid spacing
    #[arg(long, default_value = "0.01")]
    scan_step: f64,

    /// Write per-solver results as JSON lines
    #[arg(long)]
    results_output: Option<PathBuf>,

    /// Write density curves as CSV for plotting
    #[arg(long)]
    curves_output: Option<PathBuf>,

    /// Write Prometheus metrics after the run
    #[arg(long)]
    metrics_output: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => {
            init_logging(args.log_level.as_deref(), args.json_logs)?;
            run_check(args).await?;
        }
        Commands::PrintQuery {
            min_start_time,
            max_start_time,
            solver,
        } => {
            let query = SlippageQuery::new(min_start_time, max_start_time).with_solver(solver);
            println!("{}", query.render());
        }
    }

    Ok(())
}

async fn run_check(args: CheckArgs) -> anyhow::Result<()> {
    let analyzer = SlippageAnalyzer::new(AnalyzerConfig {
        bandwidth: args.bandwidth,
        scan: ScanRange::new(args.scan_start, args.scan_end, args.scan_step)?,
        threshold: args.threshold,
        min_observations: args.min_observations,
    })?;

    let metrics = Metrics::new()?;
    let client = DuneClient::new(
        DuneConfig {
            base_url: args.dune_base_url,
            api_key: args.dune_api_key,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            ..DuneConfig::default()
        },
        metrics.clone(),
    )?;

    info!(
        "Checking solver slippage between {} and {}",
        args.min_start_time, args.max_start_time
    );
    let query =
        SlippageQuery::new(args.min_start_time, args.max_start_time).with_solver(args.solver);
    let rows = get_slippage(&client, &query, args.network).await?;
    if rows.is_empty() {
        warn!("No priced settlements in the requested window");
    }

    let observations: Vec<SlippageObservation> = rows.iter().map(SlippageRow::observation).collect();
    let results = analyzer.analyze(&observations);
    for result in results.values() {
        print_result(result);
    }

    let flagged = results.values().filter(|r| r.is_pennying()).count();
    metrics.inc_solvers_flagged(flagged as u64);
    info!("{} of {} solvers flagged as pennying", flagged, results.len());

    if let Some(path) = args.results_output {
        let records: Vec<&SolverModeResult> = results.values().collect();
        report::write_json_lines(path, &records)?;
    }

    if let Some(path) = args.curves_output {
        let points: Vec<CurvePoint> = analyzer
            .density_curves(&observations)
            .iter()
            .flat_map(|curve| curve.to_rows())
            .collect();
        report::write_csv(path, &points)?;
    }

    if let Some(path) = args.metrics_output {
        report::write_text(path, &metrics.gather()?)?;
    }

    Ok(())
}

fn print_result(result: &SolverModeResult) {
    match (result.verdict, result.mode) {
        (Verdict::OutOfRange, _) => {
            println!(
                "{} slippage outside the scan range ({} observations)",
                result.solver, result.observations
            );
        }
        (Verdict::InsufficientData, _) | (_, None) => {
            println!(
                "{} insufficient data ({} observations)",
                result.solver, result.observations
            );
        }
        (verdict, Some(mode)) => {
            println!("{} mode : {:.2}", result.solver, mode);
            if verdict == Verdict::Pennying {
                println!("\tis pennying!");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_defaults() {
        let cli = Cli::try_parse_from([
            "pennying",
            "check",
            "2022-03-01 00:00",
            "2022-03-08 00:00",
            "--dune-api-key",
            "secret",
        ])
        .unwrap();

        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.threshold, -0.2);
        assert_eq!(args.bandwidth, 1.0);
        assert_eq!(args.min_observations, 2);
        assert_eq!(args.network, Network::Mainnet);
        assert_eq!(args.solver, None);
    }

    #[test]
    fn test_negative_threshold_and_solver() {
        let cli = Cli::try_parse_from([
            "pennying",
            "check",
            "2022-03-01 00:00",
            "2022-03-08 00:00",
            "--dune-api-key",
            "secret",
            "--threshold",
            "-0.5",
            "--solver",
            "0xe92f359e6f05564849afa933ce8f62b8007a1d5d",
            "--network",
            "gnosis",
        ])
        .unwrap();

        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.threshold, -0.5);
        assert_eq!(args.network, Network::Gnosis);
        assert!(args.solver.is_some());
    }
}
