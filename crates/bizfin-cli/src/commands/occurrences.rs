use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use bizfin_core::types::with_metadata;
use bizfin_core::{nth_occurrence, EngineConfig, Frequency};

/// Arguments for listing occurrence dates
#[derive(Args)]
pub struct OccurrencesArgs {
    /// First occurrence (YYYY-MM-DD)
    #[arg(long)]
    pub anchor: NaiveDate,

    /// Frequency (weekly, biweekly, monthly, bimonthly, quarterly, semiannual, annual)
    #[arg(long)]
    pub frequency: Frequency,

    /// Day of month for month-based frequencies, clipped to the month's length
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=31))]
    pub day_of_charge: Option<u32>,

    /// Number of occurrences to list
    #[arg(long, default_value = "12")]
    pub count: u32,
}

#[derive(Debug, Serialize)]
struct Occurrence {
    index: u32,
    date: NaiveDate,
}

pub fn run_occurrences(
    args: OccurrencesArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let occurrences: Vec<Occurrence> = (0..args.count)
        .map(|index| Occurrence {
            index,
            date: nth_occurrence(args.anchor, args.frequency, args.day_of_charge, index),
        })
        .collect();

    let mut warnings = Vec::new();
    if args.day_of_charge.is_some() && !args.frequency.is_month_based() {
        warnings.push(format!(
            "day_of_charge is ignored for {} occurrences",
            args.frequency
        ));
    }

    let result = with_metadata(
        "Occurrences computed from the anchor, day clipped to month length",
        &serde_json::json!({
            "anchor": args.anchor,
            "frequency": args.frequency,
            "day_of_charge": args.day_of_charge,
        }),
        warnings,
        config.as_of,
        occurrences,
    );
    Ok(serde_json::to_value(result)?)
}
