//! Services that run the pure generators against a [`FinanceStore`].
//!
//! Accrual sync relies on the store's unique `(source_id, period_index)`
//! insert: two syncs racing over the same expense both try to insert the
//! same occurrence and exactly one succeeds. The loser's duplicate error is
//! discarded.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accruals::{generate_accruals_batch, AccrualFailure};
use crate::config::EngineConfig;
use crate::currency::CurrencyConverter;
use crate::metrics::{build_monthly_aggregates, MonthlyAggregate};
use crate::payments::{
    generate_payment_schedule, plan_schedule_replacement, PaymentPlan, Project,
    ScheduleReplacement,
};
use crate::storage::FinanceStore;
use crate::types::DateRange;
use crate::BizFinResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Occurrences written by this run.
    pub inserted: usize,
    /// Occurrences another run had already written.
    pub duplicates: usize,
    pub failures: Vec<AccrualFailure>,
}

/// Materializes every active recurring expense up to
/// `as_of + accrual_horizon_months`.
pub fn sync_recurring_expenses(
    store: &dyn FinanceStore,
    config: &EngineConfig,
) -> BizFinResult<SyncReport> {
    let records = store.list_expenses(None)?;
    let batch = generate_accruals_batch(
        &records,
        config.accrual_horizon_months,
        |id| match store.list_recurring_periods(id) {
            Ok(periods) => periods,
            Err(e) => {
                // the unique insert still rejects anything already stored
                warn!(expense_id = id, error = %e, "could not read generated periods");
                Default::default()
            }
        },
        config.as_of,
    );

    let mut report = SyncReport {
        failures: batch.failures,
        ..SyncReport::default()
    };
    for accrual in &batch.accruals {
        match store.insert_accrual(accrual) {
            Ok(()) => report.inserted += 1,
            Err(e) if e.is_duplicate() => {
                debug!(
                    source_id = %accrual.source_id,
                    period_index = accrual.period_index,
                    "occurrence already materialized"
                );
                report.duplicates += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        backend = store.backend_name(),
        inserted = report.inserted,
        duplicates = report.duplicates,
        failures = report.failures.len(),
        "recurring expense sync finished"
    );
    Ok(report)
}

/// Generates the schedule for `plan` and swaps it in for the project's
/// unpaid payments. Paid payments are never touched.
pub fn apply_payment_plan(
    store: &dyn FinanceStore,
    plan: &PaymentPlan,
    project: &Project,
    config: &EngineConfig,
) -> BizFinResult<ScheduleReplacement> {
    let generated = generate_payment_schedule(plan, project, config.schedule_horizon_periods)?;
    let existing = store.list_payments(Some(&project.id))?;
    let replacement = plan_schedule_replacement(&existing, generated);
    store.replace_pending_schedule(&project.id, &replacement)?;
    debug!(
        project_id = %project.id,
        retracted = replacement.retract.len(),
        inserted = replacement.insert.len(),
        kept_paid = replacement.kept_paid.len(),
        "applied payment plan"
    );
    Ok(replacement)
}

/// Monthly aggregates in the reporting currency, limited to the months
/// `range` touches.
pub fn load_monthly_aggregates(
    store: &dyn FinanceStore,
    range: Option<&DateRange>,
    config: &EngineConfig,
) -> BizFinResult<Vec<MonthlyAggregate>> {
    let converter = CurrencyConverter::from_config(config)?;
    // payments count on their paid date, so they are filtered after bucketing
    let payments = store.list_payments(None)?;
    let incomes = store.list_incomes(range)?;
    let expenses = match range {
        Some(r) => store.list_accruals_due(r)?,
        None => store.list_accrued_expenses(None)?,
    };
    let rows = build_monthly_aggregates(
        &payments,
        &incomes,
        &expenses,
        &converter,
        config.reporting_currency,
    )?;

    Ok(match range {
        Some(r) => {
            let (first, last) = (month_of(r.start), month_of(r.end));
            rows.into_iter()
                .filter(|row| row.period() >= first && row.period() <= last)
                .collect()
        }
        None => rows,
    })
}

fn month_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}
