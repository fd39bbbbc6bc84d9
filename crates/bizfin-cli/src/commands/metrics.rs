use clap::Args;
use serde_json::Value;

use bizfin_core::metrics::{compute_metrics, MetricsInput};
use bizfin_core::EngineConfig;

use crate::input;

/// Arguments for business metrics
#[derive(Args)]
pub struct MetricsArgs {
    /// Path to JSON input file ({"aggregates": [...], "cash_balance": ...})
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_metrics(
    args: MetricsArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let metrics_input: MetricsInput = input::read_input(args.input.as_deref(), "metrics")?;
    let result = compute_metrics(&metrics_input, config)?;
    Ok(serde_json::to_value(result)?)
}
