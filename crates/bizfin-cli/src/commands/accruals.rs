use clap::Args;
use serde_json::Value;

use bizfin_core::accruals::{build_accruals, AccrualInput};
use bizfin_core::EngineConfig;

use crate::input;

/// Arguments for recurring expense accrual
#[derive(Args)]
pub struct AccrualsArgs {
    /// Path to JSON input file ({"expenses": [...], "existing": {...}})
    #[arg(long)]
    pub input: Option<String>,

    /// Months past the as-of date to accrue (overrides the input and the config)
    #[arg(long)]
    pub horizon: Option<u32>,
}

pub fn run_accruals(
    args: AccrualsArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut accrual_input: AccrualInput =
        input::read_input(args.input.as_deref(), "expense accrual")?;
    if args.horizon.is_some() {
        accrual_input.horizon_months = args.horizon;
    }
    let result = build_accruals(&accrual_input, config)?;
    Ok(serde_json::to_value(result)?)
}
