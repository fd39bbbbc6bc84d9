use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use bizfin_core::currency::round_to_unit;
use bizfin_core::types::{with_metadata, Currency, Money};
use bizfin_core::{CurrencyConverter, EngineConfig};

/// Arguments for currency conversion
#[derive(Args)]
pub struct ConvertArgs {
    /// Amount to convert
    #[arg(long, allow_hyphen_values = true)]
    pub amount: Decimal,

    /// Source currency (COP or USD)
    #[arg(long)]
    pub from: Currency,

    /// Target currency (COP or USD)
    #[arg(long)]
    pub to: Currency,

    /// COP per USD (overrides the config)
    #[arg(long)]
    pub rate: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct Conversion {
    amount: Money,
    from: Currency,
    to: Currency,
    rate: Decimal,
    exact: Money,
    rounded: Money,
}

pub fn run_convert(
    args: ConvertArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let converter = CurrencyConverter::new(args.rate.unwrap_or(config.cop_per_usd))?;
    let exact = converter.convert(args.amount, args.from, args.to)?;
    let conversion = Conversion {
        amount: args.amount,
        from: args.from,
        to: args.to,
        rate: converter.rate(),
        exact,
        rounded: round_to_unit(exact, args.to),
    };
    let result = with_metadata(
        "Single-rate COP/USD conversion, rounded half-up to the target unit",
        &serde_json::json!({ "cop_per_usd": converter.rate() }),
        Vec::new(),
        config.as_of,
        conversion,
    );
    Ok(serde_json::to_value(result)?)
}
