use clap::Args;
use serde_json::Value;

use bizfin_core::payments::{build_schedule, ScheduleInput};
use bizfin_core::EngineConfig;

use crate::input;

/// Arguments for payment schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file ({"plan": ..., "project": ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Recurring periods to generate (overrides the input and the config)
    #[arg(long)]
    pub horizon: Option<u32>,
}

pub fn run_schedule(
    args: ScheduleArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut schedule_input: ScheduleInput =
        input::read_input(args.input.as_deref(), "schedule generation")?;
    if args.horizon.is_some() {
        schedule_input.horizon_periods = args.horizon;
    }
    let result = build_schedule(&schedule_input, config)?;
    Ok(serde_json::to_value(result)?)
}
