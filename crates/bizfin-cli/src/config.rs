use bizfin_core::EngineConfig;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::input;

/// Builds the engine configuration from an optional YAML/JSON file and the
/// `--as-of` flag. The flag wins over the file; with neither, today's local
/// date is used.
pub fn load(
    path: Option<&str>,
    as_of: Option<NaiveDate>,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let raw: Value = match path {
        Some(p) => input::file::read_structured(p)?,
        None => Value::Object(Default::default()),
    };
    let file_has_as_of = raw.get("as_of").is_some_and(|v| !v.is_null());

    let mut config: EngineConfig = serde_json::from_value(raw)
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    config.as_of = match as_of {
        Some(date) => date,
        None if file_has_as_of => config.as_of,
        None => chrono::Local::now().date_naive(),
    };
    config.validate()?;

    debug!(
        as_of = %config.as_of,
        rate = %config.cop_per_usd,
        currency = %config.reporting_currency,
        "engine configuration loaded"
    );
    Ok(config)
}
