//! Business KPIs from monthly aggregates.
//!
//! Provides, in the reporting currency of the engine configuration:
//! - MRR (latest month's recurring income) and ARR
//! - Burn rate over the trailing six months and cash runway
//! - Profit margin over the supplied window
//! - Client revenue concentration with a risk flag
//! - New / churned / net MRR from month-over-month client deltas
//!
//! Every aggregate is converted to the reporting currency before any
//! arithmetic. All calculations use `rust_decimal::Decimal`. No `f64`.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::currency::{round_to_unit, CurrencyConverter};
use crate::error::BizFinError;
use crate::metrics::aggregates::{month_index, trailing_window, MonthlyAggregate};
use crate::types::{with_metadata, Amount, ComputationOutput, Currency, Money, Percent};
use crate::BizFinResult;

/// Months averaged for the burn rate.
pub const BURN_RATE_WINDOW: usize = 6;

/// Runway below which a warning is raised.
const SHORT_RUNWAY_MONTHS: Decimal = dec!(6);

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRevenue {
    pub client_id: String,
    pub revenue: Money,
    pub currency: Currency,
}

/// Externally computed MRR movement, overriding the derived one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrrMovementInput {
    pub new_mrr: Money,
    pub churned_mrr: Money,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsInput {
    pub aggregates: Vec<MonthlyAggregate>,
    /// Cash on hand today.
    pub cash_balance: Amount,
    /// Revenue per client; summed from the aggregates when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_revenues: Option<Vec<ClientRevenue>>,
    /// Derived from the last two months when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrr_movement: Option<MrrMovementInput>,
}

/// Months of cash left. `Infinite` when recurring revenue covers the burn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "months")]
pub enum Runway {
    Months(Decimal),
    Infinite,
}

impl Runway {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Runway::Infinite)
    }

    pub fn months(&self) -> Option<Decimal> {
        match self {
            Runway::Months(m) => Some(*m),
            Runway::Infinite => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientShare {
    pub client_id: String,
    pub revenue: Money,
    /// Share of total revenue, 0-100.
    pub share_pct: Percent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MrrMovement {
    pub new_mrr: Money,
    pub churned_mrr: Money,
    pub net_mrr: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub currency: Currency,
    pub months_of_history: usize,
    pub mrr: Money,
    pub arr: Money,
    /// Mean monthly expense over the trailing window.
    pub burn_rate: Money,
    /// Burn not covered by MRR (negative when MRR exceeds burn).
    pub net_burn: Money,
    pub runway: Runway,
    pub cash_balance: Money,
    pub total_income: Money,
    pub total_expense: Money,
    pub net_income: Money,
    pub profit_margin: Percent,
    pub client_concentration: Vec<ClientShare>,
    pub top_client_share: Percent,
    pub concentration_risk: bool,
    pub mrr_movement: MrrMovement,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the KPI set for the configured reporting currency.
pub fn compute_metrics(
    input: &MetricsInput,
    config: &EngineConfig,
) -> BizFinResult<ComputationOutput<Metrics>> {
    config.validate()?;
    let converter = CurrencyConverter::from_config(config)?;
    let currency = config.reporting_currency;
    let mut warnings: Vec<String> = Vec::new();

    let history = normalize_history(&input.aggregates, &converter, currency)?;

    // MRR / ARR
    let mrr_exact = history
        .last()
        .map(|a| a.recurring_income)
        .unwrap_or(Decimal::ZERO);
    let arr_exact = mrr_exact * Decimal::from(12u32);

    // Burn rate
    let burn_exact = burn_rate(&history);
    let net_burn_exact = burn_exact - mrr_exact;

    // Runway
    let cash = converter.convert(input.cash_balance.value, input.cash_balance.currency, currency)?;
    let runway = compute_runway(cash, burn_exact, mrr_exact);
    if let Some(months) = runway.months() {
        if months < SHORT_RUNWAY_MONTHS {
            warnings.push(format!(
                "Runway is {months} months at the current net burn."
            ));
        }
    }

    // Profitability over the window
    let total_income: Money = history.iter().map(|a| a.total_income).sum();
    let total_expense: Money = history.iter().map(|a| a.total_expense).sum();
    let net_income = total_income - total_expense;
    let profit_margin = profit_margin(total_income, total_expense);

    // Concentration
    let revenues = match &input.client_revenues {
        Some(list) => client_revenues_from_input(list, &converter, currency)?,
        None => client_revenues_from_history(&history),
    };
    let client_concentration = concentration(&revenues, currency);
    let top_client_share = client_concentration
        .first()
        .map(|c| c.share_pct)
        .unwrap_or(Decimal::ZERO);
    let concentration_risk = top_client_share > config.concentration_threshold;
    if concentration_risk {
        if let Some(top) = client_concentration.first() {
            warnings.push(format!(
                "Client '{}' accounts for {}% of revenue (threshold {}%).",
                top.client_id, top.share_pct, config.concentration_threshold
            ));
        }
    }

    // MRR movement
    let mrr_movement = match &input.mrr_movement {
        Some(m) => {
            let new_mrr = converter.convert(m.new_mrr, m.currency, currency)?;
            let churned_mrr = converter.convert(m.churned_mrr, m.currency, currency)?;
            rounded_movement(new_mrr, churned_mrr, currency)
        }
        None => derive_mrr_movement(&history, currency),
    };

    let (_, burn_span) = trailing_window(&history, BURN_RATE_WINDOW);
    if history.is_empty() {
        warnings.push("No monthly history supplied; metrics default to zero.".into());
    } else if burn_span < BURN_RATE_WINDOW {
        warnings.push(format!(
            "Burn rate averages {burn_span} month(s), fewer than the {BURN_RATE_WINDOW}-month window."
        ));
    }

    let metrics = Metrics {
        currency,
        months_of_history: history.len(),
        mrr: round_to_unit(mrr_exact, currency),
        arr: round_to_unit(arr_exact, currency),
        burn_rate: round_to_unit(burn_exact, currency),
        net_burn: round_to_unit(net_burn_exact, currency),
        runway,
        cash_balance: round_to_unit(cash, currency),
        total_income: round_to_unit(total_income, currency),
        total_expense: round_to_unit(total_expense, currency),
        net_income: round_to_unit(net_income, currency),
        profit_margin,
        client_concentration,
        top_client_share,
        concentration_risk,
        mrr_movement,
    };

    Ok(with_metadata(
        "MRR/ARR, trailing burn rate, runway, margin, concentration",
        &serde_json::json!({
            "reporting_currency": currency,
            "cop_per_usd": converter.rate().to_string(),
            "burn_rate_window_months": BURN_RATE_WINDOW,
            "concentration_threshold_pct": config.concentration_threshold.to_string(),
        }),
        warnings,
        config.as_of,
        metrics,
    ))
}

/// Converts to `currency` (exactly) and orders by month. Two rows for the
/// same month are rejected.
pub fn normalize_history(
    aggregates: &[MonthlyAggregate],
    converter: &CurrencyConverter,
    currency: Currency,
) -> BizFinResult<Vec<MonthlyAggregate>> {
    let mut rows = aggregates
        .iter()
        .map(|a| a.converted(converter, currency))
        .collect::<BizFinResult<Vec<_>>>()?;
    rows.sort_by_key(|a| a.period());
    validate_months(&rows)?;
    Ok(rows)
}

/// Rejects months outside 1-12 and repeated months. `rows` must be sorted
/// by period.
pub fn validate_months(rows: &[MonthlyAggregate]) -> BizFinResult<()> {
    if let Some(row) = rows.iter().find(|a| !(1..=12).contains(&a.month)) {
        return Err(BizFinError::InvalidInput {
            field: "aggregates.month".into(),
            reason: format!("month must be 1-12 (got {} in {})", row.month, row.year),
        });
    }
    for pair in rows.windows(2) {
        if pair[0].period() == pair[1].period() {
            return Err(BizFinError::InvalidInput {
                field: "aggregates".into(),
                reason: format!("duplicate month {}-{:02}", pair[0].year, pair[0].month),
            });
        }
    }
    Ok(())
}

/// Mean monthly expense over the trailing `BURN_RATE_WINDOW` calendar
/// months; months without a row count as zero. Zero without history.
pub fn burn_rate(history: &[MonthlyAggregate]) -> Money {
    let (window, span) = trailing_window(history, BURN_RATE_WINDOW);
    if span == 0 {
        return Decimal::ZERO;
    }
    let total: Money = window.iter().map(|a| a.total_expense).sum();
    total / Decimal::from(span as u64)
}

/// `cash / (burn - mrr)` in months, or `Infinite` when MRR covers the burn.
/// A quotient past the decimal range is reported as `Infinite` too.
pub fn compute_runway(cash: Money, burn: Money, mrr: Money) -> Runway {
    if burn <= mrr {
        return Runway::Infinite;
    }
    if cash <= Decimal::ZERO {
        return Runway::Months(Decimal::ZERO);
    }
    burn.checked_sub(mrr)
        .and_then(|net_burn| cash.checked_div(net_burn))
        .map(|months| Runway::Months(months.round_dp(2)))
        .unwrap_or(Runway::Infinite)
}

/// `(income - expense) / income * 100`, zero when there is no income.
pub fn profit_margin(income: Money, expense: Money) -> Percent {
    if income.is_zero() {
        return Decimal::ZERO;
    }
    ((income - expense) / income * dec!(100)).round_dp(2)
}

/// Shares of total revenue, largest first.
pub fn concentration(revenues: &BTreeMap<String, Money>, currency: Currency) -> Vec<ClientShare> {
    let total: Money = revenues.values().copied().sum();
    let mut shares: Vec<ClientShare> = revenues
        .iter()
        .map(|(client_id, revenue)| ClientShare {
            client_id: client_id.clone(),
            revenue: round_to_unit(*revenue, currency),
            share_pct: if total.is_zero() {
                Decimal::ZERO
            } else {
                (*revenue / total * dec!(100)).round_dp(2)
            },
        })
        .collect();
    shares.sort_by(|a, b| {
        b.share_pct
            .cmp(&a.share_pct)
            .then_with(|| a.client_id.cmp(&b.client_id))
    });
    shares
}

/// New and churned MRR between the latest month and the calendar month
/// before it. A previous month without a row has no recurring revenue, so
/// everything in the latest month counts as new.
pub fn derive_mrr_movement(history: &[MonthlyAggregate], currency: Currency) -> MrrMovement {
    let Some(current) = history.iter().max_by_key(|a| a.period()) else {
        return MrrMovement::default();
    };
    let previous_index = month_index(current.period()) - 1;
    let none = BTreeMap::new();
    let previous = history
        .iter()
        .find(|a| month_index(a.period()) == previous_index)
        .map_or(&none, |a| &a.recurring_by_client);
    let current = &current.recurring_by_client;

    let clients: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();
    let mut new_mrr = Decimal::ZERO;
    let mut churned_mrr = Decimal::ZERO;
    for client in clients {
        let before = previous.get(client).copied().unwrap_or(Decimal::ZERO);
        let after = current.get(client).copied().unwrap_or(Decimal::ZERO);
        let delta = after - before;
        if delta > Decimal::ZERO {
            new_mrr += delta;
        } else {
            churned_mrr -= delta;
        }
    }
    rounded_movement(new_mrr, churned_mrr, currency)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn rounded_movement(new_mrr: Money, churned_mrr: Money, currency: Currency) -> MrrMovement {
    let new_mrr = round_to_unit(new_mrr, currency);
    let churned_mrr = round_to_unit(churned_mrr, currency);
    MrrMovement {
        new_mrr,
        churned_mrr,
        net_mrr: new_mrr - churned_mrr,
    }
}

fn client_revenues_from_history(history: &[MonthlyAggregate]) -> BTreeMap<String, Money> {
    let mut totals: BTreeMap<String, Money> = BTreeMap::new();
    for row in history {
        for (client, revenue) in &row.income_by_client {
            *totals.entry(client.clone()).or_default() += *revenue;
        }
    }
    totals
}

fn client_revenues_from_input(
    list: &[ClientRevenue],
    converter: &CurrencyConverter,
    currency: Currency,
) -> BizFinResult<BTreeMap<String, Money>> {
    let mut totals: BTreeMap<String, Money> = BTreeMap::new();
    for c in list {
        *totals.entry(c.client_id.clone()).or_default() +=
            converter.convert(c.revenue, c.currency, currency)?;
    }
    Ok(totals)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
