mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::accruals::AccrualsArgs;
use commands::convert::ConvertArgs;
use commands::metrics::MetricsArgs;
use commands::occurrences::OccurrencesArgs;
use commands::projection::ProjectArgs;
use commands::schedule::ScheduleArgs;

/// Payment schedules, expense accruals and business metrics
#[derive(Parser)]
#[command(
    name = "bizfin",
    version,
    about = "Payment schedules, expense accruals and business metrics",
    long_about = "Generates payment schedules from payment plans, accrues recurring \
                  expenses, and computes MRR, burn, runway and scenario projections \
                  over COP/USD ledgers with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (.yaml, .yml or .json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Date treated as today (YYYY-MM-DD); defaults to the config or the system date
    #[arg(long, global = true)]
    as_of: Option<chrono::NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the payment schedule of a project's payment plan
    Schedule(ScheduleArgs),
    /// Accrue recurring expenses up to the horizon
    Accruals(AccrualsArgs),
    /// Compute MRR, ARR, burn rate, runway, margin and concentration
    Metrics(MetricsArgs),
    /// Project cash flow under optimistic, conservative and pessimistic scenarios
    Project(ProjectArgs),
    /// Convert an amount between COP and USD
    Convert(ConvertArgs),
    /// List occurrence dates of a frequency
    Occurrences(OccurrencesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("BIZFIN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(
    command: Commands,
    config_path: Option<&str>,
    as_of: Option<chrono::NaiveDate>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let engine_config = config::load(config_path, as_of)?;
    match command {
        Commands::Schedule(args) => commands::schedule::run_schedule(args, &engine_config),
        Commands::Accruals(args) => commands::accruals::run_accruals(args, &engine_config),
        Commands::Metrics(args) => commands::metrics::run_metrics(args, &engine_config),
        Commands::Project(args) => commands::projection::run_project(args, &engine_config),
        Commands::Convert(args) => commands::convert::run_convert(args, &engine_config),
        Commands::Occurrences(args) => {
            commands::occurrences::run_occurrences(args, &engine_config)
        }
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Version => {
            println!("bizfin {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        command => run(command, cli.config.as_deref(), cli.as_of),
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
