use clap::Args;
use serde_json::Value;

use bizfin_core::metrics::{build_projection, ProjectionInput, Scenario};
use bizfin_core::EngineConfig;

use crate::input;

/// Arguments for cash-flow projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Path to JSON input file ({"aggregates": [...], "horizon_months": 12})
    #[arg(long)]
    pub input: Option<String>,

    /// Project a single scenario (optimistic, conservative, pessimistic)
    #[arg(long)]
    pub scenario: Option<Scenario>,

    /// Months to project (1-120)
    #[arg(long)]
    pub horizon: Option<u32>,
}

pub fn run_project(
    args: ProjectArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut raw: Value = input::read_input(args.input.as_deref(), "projection")?;
    // Flags fill in for fields the input may leave out.
    if let Some(obj) = raw.as_object_mut() {
        if let Some(horizon) = args.horizon {
            obj.insert("horizon_months".into(), horizon.into());
        }
        if let Some(scenario) = args.scenario {
            obj.insert("scenario".into(), serde_json::to_value(scenario)?);
        }
    }
    let projection_input: ProjectionInput = serde_json::from_value(raw)
        .map_err(|e| format!("Invalid projection input: {e}"))?;
    let result = build_projection(&projection_input, config)?;
    Ok(serde_json::to_value(result)?)
}
