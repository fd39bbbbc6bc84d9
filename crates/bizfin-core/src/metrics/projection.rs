//! Multi-scenario cash-flow projection.
//!
//! The trailing trend (mean income and expense of the last three months) is
//! scaled by the scenario multipliers and extended month by month from the
//! cumulative historic balance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::currency::{round_to_unit, CurrencyConverter};
use crate::error::BizFinError;
use crate::metrics::aggregates::{trailing_window, MonthlyAggregate};
use crate::metrics::kpis::{normalize_history, validate_months};
use crate::types::{with_metadata, Amount, ComputationOutput, Currency, Money};
use crate::BizFinResult;

/// Months averaged into the trend.
pub const TREND_WINDOW: usize = 3;

/// Longest projection accepted.
pub const MAX_PROJECTION_MONTHS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Optimistic,
    Conservative,
    Pessimistic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::Optimistic,
        Scenario::Conservative,
        Scenario::Pessimistic,
    ];

    /// `(income, expense)` multipliers.
    pub fn multipliers(self) -> (Decimal, Decimal) {
        match self {
            Scenario::Optimistic => (dec!(1.15), dec!(0.95)),
            Scenario::Conservative => (dec!(1.00), dec!(1.00)),
            Scenario::Pessimistic => (dec!(0.85), dec!(1.10)),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scenario::Optimistic => "optimistic",
            Scenario::Conservative => "conservative",
            Scenario::Pessimistic => "pessimistic",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Scenario {
    type Err = BizFinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Scenario::Optimistic),
            "conservative" => Ok(Scenario::Conservative),
            "pessimistic" => Ok(Scenario::Pessimistic),
            other => Err(BizFinError::InvalidInput {
                field: "scenario".into(),
                reason: format!("unknown scenario '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    /// 1 for the first month after the history.
    pub month_offset: u32,
    pub year: i32,
    pub month: u32,
    pub projected_income: Money,
    pub projected_expense: Money,
    pub net: Money,
    pub projected_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub aggregates: Vec<MonthlyAggregate>,
    pub horizon_months: u32,
    /// Single scenario; all three when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    /// Starting balance; the sum of historic net income when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_balance: Option<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioProjection {
    pub scenario: Scenario,
    pub points: Vec<ProjectionPoint>,
    /// Balance after the last projected month.
    pub ending_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub currency: Currency,
    pub trend_income: Money,
    pub trend_expense: Money,
    pub opening_balance: Money,
    pub scenarios: Vec<ScenarioProjection>,
}

/// Trend and starting point shared by every scenario.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    income: Money,
    expense: Money,
    balance: Money,
    last_period: (i32, u32),
}

impl Baseline {
    fn from_history(history: &[MonthlyAggregate]) -> BizFinResult<Self> {
        let last = history.last().ok_or_else(|| {
            BizFinError::InsufficientData("projection needs at least one month of history".into())
        })?;
        // months without a row inside the window count as zero
        let (window, span) = trailing_window(history, TREND_WINDOW);
        let n = Decimal::from(span as u64);
        Ok(Self {
            income: window.iter().map(|a| a.total_income).sum::<Money>() / n,
            expense: window.iter().map(|a| a.total_expense).sum::<Money>() / n,
            balance: history.iter().map(MonthlyAggregate::net).sum(),
            last_period: last.period(),
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Projects `horizon_months` months under `scenario`.
///
/// `aggregates` must already be in a single currency; amounts are rounded to
/// that currency's unit. Each balance is accumulated from unrounded values
/// and rounded only for output, so the result depends on nothing but the
/// inputs.
pub fn project_scenario(
    aggregates: &[MonthlyAggregate],
    scenario: Scenario,
    horizon_months: u32,
) -> BizFinResult<Vec<ProjectionPoint>> {
    validate_horizon(horizon_months)?;
    let history = sorted_single_currency(aggregates)?;
    let baseline = Baseline::from_history(&history)?;
    let currency = history[0].currency;
    Ok(points_for(&baseline, scenario, horizon_months, currency))
}

/// All three scenarios over the same baseline.
pub fn project_all_scenarios(
    aggregates: &[MonthlyAggregate],
    horizon_months: u32,
) -> BizFinResult<Vec<ScenarioProjection>> {
    validate_horizon(horizon_months)?;
    let history = sorted_single_currency(aggregates)?;
    let baseline = Baseline::from_history(&history)?;
    let currency = history[0].currency;
    Ok(Scenario::ALL
        .iter()
        .map(|s| scenario_projection(&baseline, *s, horizon_months, currency))
        .collect())
}

/// Projection in the reporting currency, wrapped in the output envelope.
pub fn build_projection(
    input: &ProjectionInput,
    config: &EngineConfig,
) -> BizFinResult<ComputationOutput<ProjectionOutput>> {
    config.validate()?;
    validate_horizon(input.horizon_months)?;
    let converter = CurrencyConverter::from_config(config)?;
    let currency = config.reporting_currency;
    let mut warnings: Vec<String> = Vec::new();

    let history = normalize_history(&input.aggregates, &converter, currency)?;
    let mut baseline = Baseline::from_history(&history)?;
    if let Some(opening) = input.opening_balance {
        baseline.balance = converter.convert(opening.value, opening.currency, currency)?;
    }
    let (_, trend_span) = trailing_window(&history, TREND_WINDOW);
    if trend_span < TREND_WINDOW {
        warnings.push(format!(
            "Trend averages {trend_span} month(s), fewer than the {TREND_WINDOW}-month window."
        ));
    }

    let scenarios: Vec<ScenarioProjection> = match input.scenario {
        Some(s) => vec![scenario_projection(&baseline, s, input.horizon_months, currency)],
        None => Scenario::ALL
            .iter()
            .map(|s| scenario_projection(&baseline, *s, input.horizon_months, currency))
            .collect(),
    };
    for s in &scenarios {
        if s.points.iter().any(|p| p.projected_balance < Decimal::ZERO) {
            warnings.push(format!("Balance turns negative in the {} scenario.", s.scenario));
        }
    }

    let output = ProjectionOutput {
        currency,
        trend_income: round_to_unit(baseline.income, currency),
        trend_expense: round_to_unit(baseline.expense, currency),
        opening_balance: round_to_unit(baseline.balance, currency),
        scenarios,
    };

    Ok(with_metadata(
        "Trailing-trend cash-flow projection with scenario multipliers",
        &serde_json::json!({
            "trend_window_months": TREND_WINDOW,
            "horizon_months": input.horizon_months,
            "multipliers": Scenario::ALL
                .iter()
                .map(|s| {
                    let (i, e) = s.multipliers();
                    (s.to_string(), serde_json::json!({"income": i.to_string(), "expense": e.to_string()}))
                })
                .collect::<serde_json::Map<_, _>>(),
        }),
        warnings,
        config.as_of,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_horizon(horizon_months: u32) -> BizFinResult<()> {
    if horizon_months == 0 || horizon_months > MAX_PROJECTION_MONTHS {
        return Err(BizFinError::InvalidInput {
            field: "horizon_months".into(),
            reason: format!("must be between 1 and {MAX_PROJECTION_MONTHS}"),
        });
    }
    Ok(())
}

fn sorted_single_currency(aggregates: &[MonthlyAggregate]) -> BizFinResult<Vec<MonthlyAggregate>> {
    let mut history = aggregates.to_vec();
    if let Some(first) = history.first() {
        let currency = first.currency;
        if let Some(other) = history.iter().find(|a| a.currency != currency) {
            return Err(BizFinError::CurrencyMismatch {
                expected: currency,
                found: other.currency,
            });
        }
    }
    history.sort_by_key(|a| a.period());
    validate_months(&history)?;
    Ok(history)
}

fn scenario_projection(
    baseline: &Baseline,
    scenario: Scenario,
    horizon_months: u32,
    currency: Currency,
) -> ScenarioProjection {
    let points = points_for(baseline, scenario, horizon_months, currency);
    let ending_balance = points
        .last()
        .map(|p| p.projected_balance)
        .unwrap_or_else(|| round_to_unit(baseline.balance, currency));
    ScenarioProjection {
        scenario,
        points,
        ending_balance,
    }
}

fn points_for(
    baseline: &Baseline,
    scenario: Scenario,
    horizon_months: u32,
    currency: Currency,
) -> Vec<ProjectionPoint> {
    let (income_mult, expense_mult) = scenario.multipliers();
    let income = baseline.income * income_mult;
    let expense = baseline.expense * expense_mult;
    let net = income - expense;

    let mut balance = baseline.balance;
    let mut period = baseline.last_period;
    (1..=horizon_months)
        .map(|offset| {
            period = next_month(period);
            balance += net;
            ProjectionPoint {
                month_offset: offset,
                year: period.0,
                month: period.1,
                projected_income: round_to_unit(income, currency),
                projected_expense: round_to_unit(expense, currency),
                net: round_to_unit(net, currency),
                projected_balance: round_to_unit(balance, currency),
            }
        })
        .collect()
}

fn next_month((year, month): (i32, u32)) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn month(year: i32, month: u32, income: Money, expense: Money) -> MonthlyAggregate {
        let mut row = MonthlyAggregate::empty(year, month, Currency::COP);
        row.total_income = income;
        row.total_expense = expense;
        row
    }

    fn history() -> Vec<MonthlyAggregate> {
        vec![
            month(2024, 10, dec!(1000), dec!(800)),
            month(2024, 11, dec!(1000), dec!(800)),
            month(2024, 12, dec!(1000), dec!(800)),
        ]
    }

    #[test]
    fn test_conservative_extends_trend() {
        let points = project_scenario(&history(), Scenario::Conservative, 3).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].projected_income, dec!(1000));
        assert_eq!(points[0].projected_expense, dec!(800));
        // cumulative 600, then +200 a month
        assert_eq!(points[0].projected_balance, dec!(800));
        assert_eq!(points[2].projected_balance, dec!(1200));
        assert_eq!((points[0].year, points[0].month), (2025, 1));
        assert_eq!(points[2].month_offset, 3);
    }

    #[test]
    fn test_optimistic_and_pessimistic_multipliers() {
        let opt = project_scenario(&history(), Scenario::Optimistic, 1).unwrap();
        assert_eq!(opt[0].projected_income, dec!(1150));
        assert_eq!(opt[0].projected_expense, dec!(760));

        let pes = project_scenario(&history(), Scenario::Pessimistic, 1).unwrap();
        assert_eq!(pes[0].projected_income, dec!(850));
        assert_eq!(pes[0].projected_expense, dec!(880));
        assert_eq!(pes[0].net, dec!(-30));
    }

    #[test]
    fn test_scenarios_are_ordered() {
        let all = project_all_scenarios(&history(), 6).unwrap();
        let endings: Vec<_> = all.iter().map(|s| s.ending_balance).collect();
        assert!(endings[0] > endings[1]);
        assert!(endings[1] > endings[2]);
    }

    #[test]
    fn test_trend_uses_last_three_months_only() {
        let mut rows = history();
        rows.insert(0, month(2024, 9, dec!(99_000), dec!(0)));
        let points = project_scenario(&rows, Scenario::Conservative, 1).unwrap();
        assert_eq!(points[0].projected_income, dec!(1000));
        // the early month still counts toward the opening balance
        assert_eq!(points[0].projected_balance, dec!(99_000) + dec!(600) + dec!(200));
    }

    #[test]
    fn test_unsorted_history_is_sorted() {
        let mut rows = history();
        rows.reverse();
        let points = project_scenario(&rows, Scenario::Conservative, 1).unwrap();
        assert_eq!((points[0].year, points[0].month), (2025, 1));
    }

    #[test]
    fn test_empty_history_is_insufficient() {
        let err = project_scenario(&[], Scenario::Conservative, 3).unwrap_err();
        assert!(matches!(err, BizFinError::InsufficientData(_)));
    }

    #[test]
    fn test_repeated_and_invalid_months_rejected() {
        let rows = vec![
            month(2024, 12, dec!(1000), dec!(0)),
            month(2024, 12, dec!(0), dec!(0)),
        ];
        let err = project_scenario(&rows, Scenario::Conservative, 2).unwrap_err();
        assert!(matches!(err, BizFinError::InvalidInput { ref field, .. } if field == "aggregates"));

        let rows = vec![month(2024, 11, dec!(1000), dec!(0)), month(2024, 13, dec!(0), dec!(0))];
        assert!(project_scenario(&rows, Scenario::Conservative, 2).is_err());
        assert!(project_all_scenarios(&rows, 2).is_err());
    }

    #[test]
    fn test_horizon_bounds_apply_to_every_entry_point() {
        for horizon in [0, MAX_PROJECTION_MONTHS + 1, u32::MAX] {
            assert!(project_scenario(&history(), Scenario::Conservative, horizon).is_err());
            assert!(project_all_scenarios(&history(), horizon).is_err());
        }
        let points = project_scenario(&history(), Scenario::Conservative, MAX_PROJECTION_MONTHS).unwrap();
        assert_eq!(points.len(), MAX_PROJECTION_MONTHS as usize);
    }

    #[test]
    fn test_trend_counts_missing_months_as_zero() {
        let rows = vec![
            month(2024, 1, dec!(900), dec!(0)),
            month(2024, 12, dec!(300), dec!(600)),
        ];
        // Oct and Nov have no rows: (0 + 0 + 300) / 3 and (0 + 0 + 600) / 3
        let points = project_scenario(&rows, Scenario::Conservative, 1).unwrap();
        assert_eq!(points[0].projected_income, dec!(100));
        assert_eq!(points[0].projected_expense, dec!(200));
    }

    #[test]
    fn test_mixed_currency_rejected() {
        let mut rows = history();
        rows[1].currency = Currency::USD;
        assert!(project_scenario(&rows, Scenario::Optimistic, 1).is_err());
    }

    #[test]
    fn test_build_projection_opening_balance_override() {
        let input = ProjectionInput {
            aggregates: history(),
            horizon_months: 2,
            scenario: Some(Scenario::Conservative),
            opening_balance: Some(Amount::new(dec!(1), Currency::USD)),
        };
        let config = EngineConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let out = build_projection(&input, &config).unwrap();
        assert_eq!(out.result.opening_balance, dec!(4000));
        assert_eq!(out.result.scenarios.len(), 1);
        assert_eq!(out.result.scenarios[0].ending_balance, dec!(4400));
    }

    #[test]
    fn test_build_projection_rejects_zero_horizon() {
        let input = ProjectionInput {
            aggregates: history(),
            horizon_months: 0,
            scenario: None,
            opening_balance: None,
        };
        let config = EngineConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(build_projection(&input, &config).is_err());
    }

    #[test]
    fn test_negative_balance_warning() {
        let rows = vec![month(2024, 12, dec!(100), dec!(500))];
        let input = ProjectionInput {
            aggregates: rows,
            horizon_months: 2,
            scenario: None,
            opening_balance: None,
        };
        let config = EngineConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let out = build_projection(&input, &config).unwrap();
        assert_eq!(out.result.scenarios.len(), 3);
        assert!(out.warnings.iter().any(|w| w.contains("pessimistic")));
        assert!(out.warnings.iter().any(|w| w.contains("fewer than")));
    }

    #[test]
    fn test_projection_is_reproducible() {
        let a = serde_json::to_string(&project_all_scenarios(&history(), 12).unwrap()).unwrap();
        let b = serde_json::to_string(&project_all_scenarios(&history(), 12).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
