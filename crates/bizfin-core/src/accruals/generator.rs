//! Accrual generation for recurring expenses.
//!
//! Occurrence `p` of an expense is due on
//! `nth_occurrence(start_date, frequency, None, p)`. Generation walks
//! `p = 0, 1, 2, ...` up to `as_of + horizon_months` (and the expense's end
//! date), skipping every period already materialized. Calling it again with
//! the grown set of generated periods never yields the same period twice.

use std::collections::{BTreeMap, HashSet};

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::accruals::expense::{AccruedExpense, RecurringExpense, RecurringExpenseRecord};
use crate::config::EngineConfig;
use crate::recurrence::occurrences_until;
use crate::types::{with_metadata, ComputationOutput};
use crate::BizFinResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Input for a batch accrual run from the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualInput {
    pub expenses: Vec<RecurringExpenseRecord>,
    /// Months past `as_of` to materialize; defaults to the configured horizon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_months: Option<u32>,
    /// Period indices already materialized, per expense id.
    #[serde(default)]
    pub existing: BTreeMap<String, Vec<u32>>,
}

/// An expense the batch could not process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualFailure {
    pub expense_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccrualBatch {
    pub accruals: Vec<AccruedExpense>,
    pub failures: Vec<AccrualFailure>,
    /// Inactive expenses that generated nothing.
    pub skipped_inactive: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Last due date a run on `as_of` materializes.
pub fn horizon_limit(as_of: NaiveDate, horizon_months: u32) -> NaiveDate {
    as_of
        .checked_add_months(Months::new(horizon_months))
        .unwrap_or(NaiveDate::MAX)
}

/// Occurrences of `expense` due up to `as_of + horizon_months`, excluding the
/// periods in `already_generated`. Inactive expenses yield nothing.
pub fn generate_up_to(
    expense: &RecurringExpense,
    horizon_months: u32,
    already_generated: &HashSet<u32>,
    as_of: NaiveDate,
) -> Vec<AccruedExpense> {
    if !expense.is_active {
        return Vec::new();
    }

    let mut limit = horizon_limit(as_of, horizon_months);
    if let Some(end) = expense.end_date {
        limit = limit.min(end);
    }

    let accruals: Vec<AccruedExpense> =
        occurrences_until(expense.start_date, expense.frequency, None, limit)
            .filter(|(p, _)| !already_generated.contains(p))
            .map(|(p, date)| AccruedExpense::from_recurring(expense, p, date))
            .collect();

    debug!(
        expense_id = %expense.id,
        generated = accruals.len(),
        already = already_generated.len(),
        %limit,
        "accrued recurring expense"
    );
    accruals
}

/// Runs generation for many stored expenses. A record that fails to convert
/// (unknown frequency, bad dates) is reported in `failures` and the rest of
/// the batch still runs.
pub fn generate_accruals_batch<F>(
    records: &[RecurringExpenseRecord],
    horizon_months: u32,
    mut already_generated: F,
    as_of: NaiveDate,
) -> AccrualBatch
where
    F: FnMut(&str) -> HashSet<u32>,
{
    let mut batch = AccrualBatch::default();
    for record in records {
        let expense = match RecurringExpense::try_from(record.clone()) {
            Ok(expense) => expense,
            Err(e) => {
                warn!(expense_id = %record.id, error = %e, "skipping recurring expense");
                batch.failures.push(AccrualFailure {
                    expense_id: record.id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !expense.is_active {
            batch.skipped_inactive.push(expense.id.clone());
            continue;
        }
        let existing = already_generated(&expense.id);
        batch
            .accruals
            .extend(generate_up_to(&expense, horizon_months, &existing, as_of));
    }
    batch
}

/// Batch generation wrapped in the standard output envelope.
pub fn build_accruals(
    input: &AccrualInput,
    config: &EngineConfig,
) -> BizFinResult<ComputationOutput<AccrualBatch>> {
    let horizon = input.horizon_months.unwrap_or(config.accrual_horizon_months);
    let batch = generate_accruals_batch(
        &input.expenses,
        horizon,
        |id| {
            input
                .existing
                .get(id)
                .map(|periods| periods.iter().copied().collect())
                .unwrap_or_default()
        },
        config.as_of,
    );

    let warnings = batch
        .failures
        .iter()
        .map(|f| format!("Expense '{}' skipped: {}", f.expense_id, f.error))
        .collect();

    Ok(with_metadata(
        "Recurring expense accrual up to as_of + horizon",
        &serde_json::json!({
            "horizon_months": horizon,
            "horizon_limit": horizon_limit(config.as_of, horizon),
            "expenses": input.expenses.len(),
        }),
        warnings,
        config.as_of,
        batch,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Frequency;
    use crate::types::Currency;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn expense() -> RecurringExpense {
        RecurringExpense {
            id: "internet".into(),
            description: "Fiber internet".into(),
            amount: dec!(100_000),
            currency: Currency::COP,
            category: "utilities".into(),
            payment_method: "card".into(),
            frequency: Frequency::Monthly,
            start_date: d(2024, 1, 15),
            end_date: None,
            is_active: true,
            is_auto_debit: false,
        }
    }

    fn record(id: &str, frequency: &str) -> RecurringExpenseRecord {
        RecurringExpenseRecord {
            id: id.into(),
            description: id.into(),
            amount: dec!(50),
            currency: Currency::USD,
            category: "software".into(),
            payment_method: "card".into(),
            frequency: frequency.into(),
            start_date: d(2024, 1, 1),
            end_date: None,
            is_active: true,
            is_auto_debit: false,
        }
    }

    #[test]
    fn test_three_month_horizon_example() {
        let out = generate_up_to(&expense(), 3, &HashSet::new(), d(2024, 1, 1));
        let dates: Vec<_> = out.iter().map(|a| a.due_date).collect();
        assert_eq!(dates, vec![d(2024, 1, 15), d(2024, 2, 15), d(2024, 3, 15)]);
        assert!(out.iter().all(|a| a.amount == dec!(100_000)));
        assert!(out.iter().all(|a| a.currency == Currency::COP));
    }

    #[test]
    fn test_already_generated_periods_skipped() {
        let existing: HashSet<u32> = [0, 2].into_iter().collect();
        let out = generate_up_to(&expense(), 3, &existing, d(2024, 1, 1));
        let periods: Vec<_> = out.iter().map(|a| a.period_index).collect();
        assert_eq!(periods, vec![1]);
    }

    #[test]
    fn test_repeated_runs_never_duplicate() {
        let mut generated: HashSet<u32> = HashSet::new();
        let mut all = Vec::new();
        for month in 1..=6 {
            let run = generate_up_to(&expense(), 2, &generated, d(2024, month, 1));
            for a in &run {
                assert!(generated.insert(a.period_index), "duplicate {}", a.period_index);
            }
            all.extend(run);
        }
        let periods: Vec<_> = all.iter().map(|a| a.period_index).collect();
        assert_eq!(periods, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_end_date_stops_generation() {
        let mut e = expense();
        e.end_date = Some(d(2024, 2, 20));
        let out = generate_up_to(&e, 12, &HashSet::new(), d(2024, 1, 1));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_inactive_expense_generates_nothing() {
        let mut e = expense();
        e.is_active = false;
        assert!(generate_up_to(&e, 12, &HashSet::new(), d(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_start_beyond_horizon_generates_nothing() {
        let mut e = expense();
        e.start_date = d(2025, 1, 1);
        assert!(generate_up_to(&e, 3, &HashSet::new(), d(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_backfills_from_past_start() {
        let mut e = expense();
        e.frequency = Frequency::Quarterly;
        e.start_date = d(2023, 1, 15);
        let out = generate_up_to(&e, 0, &HashSet::new(), d(2024, 1, 1));
        assert_eq!(out.len(), 4);
        assert_eq!(out[3].due_date, d(2023, 10, 15));
    }

    #[test]
    fn test_batch_isolates_unknown_frequency() {
        let records = vec![
            record("good-1", "monthly"),
            record("broken", "whenever"),
            record("good-2", "weekly"),
        ];
        let batch = generate_accruals_batch(&records, 1, |_| HashSet::new(), d(2024, 1, 1));
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].expense_id, "broken");
        assert!(batch.accruals.iter().any(|a| a.source_id == "good-1"));
        assert!(batch.accruals.iter().any(|a| a.source_id == "good-2"));
    }

    #[test]
    fn test_batch_reports_inactive() {
        let mut inactive = record("paused", "monthly");
        inactive.is_active = false;
        let batch = generate_accruals_batch(&[inactive], 3, |_| HashSet::new(), d(2024, 1, 1));
        assert!(batch.accruals.is_empty());
        assert_eq!(batch.skipped_inactive, vec!["paused".to_string()]);
    }

    #[test]
    fn test_build_accruals_uses_existing_map() {
        let mut existing = BTreeMap::new();
        existing.insert("good-1".to_string(), vec![0, 1]);
        let input = AccrualInput {
            expenses: vec![record("good-1", "monthly")],
            horizon_months: Some(2),
            existing,
        };
        let out = build_accruals(&input, &EngineConfig::new(d(2024, 1, 1))).unwrap();
        let periods: Vec<_> = out.result.accruals.iter().map(|a| a.period_index).collect();
        assert_eq!(periods, vec![2]);
        assert!(out.warnings.is_empty());
    }
}
