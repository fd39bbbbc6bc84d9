use bizfin_core::currency::round_to_unit;
use bizfin_core::types::{with_metadata, Currency, Money};
use bizfin_core::{CurrencyConverter, EngineConfig, Frequency};
use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Engine configuration from optional JSON. A missing `as_of` means today.
fn engine_config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    let raw: serde_json::Value = match config_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => serde_json::Value::Object(Default::default()),
    };
    let has_as_of = raw.get("as_of").is_some_and(|v| !v.is_null());
    let mut config: EngineConfig = serde_json::from_value(raw).map_err(to_napi_error)?;
    if !has_as_of {
        config.as_of = chrono::Local::now().date_naive();
    }
    config.validate().map_err(to_napi_error)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_payment_schedule(
    input_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let config = engine_config(config_json)?;
    let input: bizfin_core::payments::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        bizfin_core::payments::build_schedule(&input, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Accruals
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_accruals(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = engine_config(config_json)?;
    let input: bizfin_core::accruals::AccrualInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        bizfin_core::accruals::build_accruals(&input, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Metrics and projections
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_metrics(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = engine_config(config_json)?;
    let input: bizfin_core::metrics::MetricsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        bizfin_core::metrics::compute_metrics(&input, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn project_scenario(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = engine_config(config_json)?;
    let input: bizfin_core::metrics::ProjectionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        bizfin_core::metrics::build_projection(&input, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Currency and calendar
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ConvertInput {
    amount: Money,
    from: Currency,
    to: Currency,
}

#[derive(Serialize)]
struct Conversion {
    amount: Money,
    from: Currency,
    to: Currency,
    rate: Decimal,
    exact: Money,
    rounded: Money,
}

#[napi]
pub fn convert_currency(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = engine_config(config_json)?;
    let input: ConvertInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let converter = CurrencyConverter::from_config(&config).map_err(to_napi_error)?;
    let exact = converter
        .convert(input.amount, input.from, input.to)
        .map_err(to_napi_error)?;
    let output = with_metadata(
        "Single-rate COP/USD conversion, rounded half-up to the target unit",
        &serde_json::json!({ "cop_per_usd": converter.rate() }),
        Vec::new(),
        config.as_of,
        Conversion {
            amount: input.amount,
            from: input.from,
            to: input.to,
            rate: converter.rate(),
            exact,
            rounded: round_to_unit(exact, input.to),
        },
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct OccurrencesInput {
    anchor: NaiveDate,
    frequency: String,
    #[serde(default)]
    day_of_charge: Option<u32>,
    count: u32,
}

#[napi]
pub fn list_occurrences(input_json: String) -> NapiResult<String> {
    let input: OccurrencesInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let frequency: Frequency = input.frequency.parse().map_err(to_napi_error)?;
    let dates: Vec<NaiveDate> = (0..input.count)
        .map(|n| bizfin_core::nth_occurrence(input.anchor, frequency, input.day_of_charge, n))
        .collect();
    serde_json::to_string(&dates).map_err(to_napi_error)
}
