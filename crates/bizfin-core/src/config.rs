//! Engine configuration.
//!
//! Every value a computation depends on besides its inputs lives here and is
//! passed explicitly: the exchange rate, the reporting currency and the
//! `as_of` date used as "today".

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BizFinError;
use crate::types::{Currency, Percent};
use crate::BizFinResult;

/// Default COP-per-USD rate used when no configuration is supplied.
pub const DEFAULT_COP_PER_USD: Decimal = dec!(4000);

/// Default number of recurring periods generated for a payment plan.
pub const DEFAULT_SCHEDULE_HORIZON: u32 = 12;

/// Default accrual look-ahead in months.
pub const DEFAULT_ACCRUAL_HORIZON_MONTHS: u32 = 3;

/// Top-client share above which concentration risk is flagged.
pub const DEFAULT_CONCENTRATION_THRESHOLD: Percent = dec!(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pesos per US dollar.
    pub cop_per_usd: Decimal,
    /// Currency all aggregates and metrics are reported in.
    pub reporting_currency: Currency,
    /// The "today" every computation runs against.
    pub as_of: NaiveDate,
    /// Recurring periods generated per payment plan.
    pub schedule_horizon_periods: u32,
    /// How far past `as_of` accruals are materialized.
    pub accrual_horizon_months: u32,
    /// Top-client revenue share (0-100) that raises the concentration flag.
    pub concentration_threshold: Percent,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cop_per_usd: DEFAULT_COP_PER_USD,
            reporting_currency: Currency::COP,
            as_of: NaiveDate::default(),
            schedule_horizon_periods: DEFAULT_SCHEDULE_HORIZON,
            accrual_horizon_months: DEFAULT_ACCRUAL_HORIZON_MONTHS,
            concentration_threshold: DEFAULT_CONCENTRATION_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            ..Self::default()
        }
    }

    pub fn with_rate(mut self, cop_per_usd: Decimal) -> Self {
        self.cop_per_usd = cop_per_usd;
        self
    }

    pub fn with_reporting_currency(mut self, currency: Currency) -> Self {
        self.reporting_currency = currency;
        self
    }

    pub fn validate(&self) -> BizFinResult<()> {
        if self.cop_per_usd <= Decimal::ZERO {
            return Err(BizFinError::InvalidInput {
                field: "cop_per_usd".into(),
                reason: "Exchange rate must be positive".into(),
            });
        }
        if self.concentration_threshold < Decimal::ZERO
            || self.concentration_threshold > dec!(100)
        {
            return Err(BizFinError::InvalidInput {
                field: "concentration_threshold".into(),
                reason: "Threshold must be between 0 and 100".into(),
            });
        }
        Ok(())
    }
}
