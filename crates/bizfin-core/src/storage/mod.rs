//! Data-access boundary.
//!
//! The engine never talks to a database directly. Sync services go through
//! [`FinanceStore`], which any backend implements; [`InMemoryStore`] is the
//! reference implementation used by tests and the CLI.

mod memory;

pub use memory::InMemoryStore;

use std::collections::HashSet;

use crate::accruals::{AccruedExpense, RecurringExpenseRecord};
use crate::metrics::Income;
use crate::payments::{Payment, ScheduleReplacement};
use crate::types::DateRange;
use crate::BizFinResult;

/// Storage backend for ledgers the engine reads and writes.
///
/// Implementations must be safe to share across threads: accrual sync may
/// run from a periodic trigger and a manual request at the same time.
pub trait FinanceStore: Send + Sync {
    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;

    // =========================================================================
    // PAYMENTS
    // =========================================================================

    /// Payments of one project, or of every project when `project_id` is
    /// `None`, ordered by scheduled date.
    fn list_payments(&self, project_id: Option<&str>) -> BizFinResult<Vec<Payment>>;

    /// Overwrites the stored payment with the same project and key.
    fn update_payment(&self, payment: &Payment) -> BizFinResult<()>;

    /// Removes the retracted unpaid payments of `project_id` and inserts the
    /// new ones as a single unit. Either the whole replacement is applied or
    /// nothing is.
    fn replace_pending_schedule(
        &self,
        project_id: &str,
        replacement: &ScheduleReplacement,
    ) -> BizFinResult<()>;

    // =========================================================================
    // RECURRING EXPENSES AND ACCRUALS
    // =========================================================================

    /// Recurring expense definitions in effect at some point of `range`
    /// (all when `None`).
    fn list_expenses(&self, range: Option<&DateRange>) -> BizFinResult<Vec<RecurringExpenseRecord>>;

    /// Inserts or replaces a recurring expense definition by id.
    fn upsert_expense(&self, record: &RecurringExpenseRecord) -> BizFinResult<()>;

    /// Period indices already materialized for `source_id`.
    fn list_recurring_periods(&self, source_id: &str) -> BizFinResult<HashSet<u32>>;

    /// Inserts an occurrence. Fails with `DuplicateOccurrence` when
    /// `(source_id, period_index)` already exists.
    fn insert_accrual(&self, accrual: &AccruedExpense) -> BizFinResult<()>;

    /// Overwrites the stored occurrence with the same key.
    fn update_accrual(&self, accrual: &AccruedExpense) -> BizFinResult<()>;

    /// Occurrences of one source, or of every source when `source_id` is
    /// `None`, ordered by due date.
    fn list_accrued_expenses(&self, source_id: Option<&str>) -> BizFinResult<Vec<AccruedExpense>>;

    /// Occurrences due within `range`.
    fn list_accruals_due(&self, range: &DateRange) -> BizFinResult<Vec<AccruedExpense>>;

    // =========================================================================
    // INCOME
    // =========================================================================

    fn insert_income(&self, income: &Income) -> BizFinResult<()>;

    /// Incomes dated within `range` (all when `None`).
    fn list_incomes(&self, range: Option<&DateRange>) -> BizFinResult<Vec<Income>>;
}
