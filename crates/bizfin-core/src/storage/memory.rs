//! In-memory finance store.
//!
//! Each table sits behind its own `RwLock`. Writes that must be atomic
//! (unique accrual insert, schedule replacement) check and apply under a
//! single write guard. Data is not persisted.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::accruals::{AccruedExpense, RecurringExpenseRecord};
use crate::error::BizFinError;
use crate::metrics::Income;
use crate::payments::{Payment, PaymentKey, ScheduleReplacement};
use crate::storage::FinanceStore;
use crate::types::DateRange;
use crate::BizFinResult;

type AccrualKey = (String, u32);

/// Thread-safe in-memory [`FinanceStore`].
///
/// ```rust
/// use bizfin_core::storage::{FinanceStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// assert_eq!(store.backend_name(), "memory");
/// assert!(store.list_payments(None).unwrap().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    payments: RwLock<Vec<Payment>>,
    expenses: RwLock<BTreeMap<String, RecurringExpenseRecord>>,
    accruals: RwLock<BTreeMap<AccrualKey, AccruedExpense>>,
    incomes: RwLock<Vec<Income>>,
}

fn lock_error(e: impl std::fmt::Display) -> BizFinError {
    BizFinError::Storage(format!("Lock error: {e}"))
}

fn read<T>(lock: &RwLock<T>) -> BizFinResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(lock_error)
}

fn write<T>(lock: &RwLock<T>) -> BizFinResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(lock_error)
}

fn in_range(range: Option<&DateRange>, date: chrono::NaiveDate) -> bool {
    range.map_or(true, |r| r.contains(date))
}

fn sort_by_due_date(accruals: &mut [AccruedExpense]) {
    accruals.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.period_index.cmp(&b.period_index))
    });
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds payments directly, bypassing schedule replacement.
    /// Fails with [`BizFinError::Storage`] if the payments lock is poisoned.
    pub fn with_payments(self, payments: Vec<Payment>) -> BizFinResult<Self> {
        write(&self.payments)?.extend(payments);
        Ok(self)
    }

    /// Clears every table.
    pub fn clear(&self) -> BizFinResult<()> {
        write(&self.payments)?.clear();
        write(&self.expenses)?.clear();
        write(&self.accruals)?.clear();
        write(&self.incomes)?.clear();
        Ok(())
    }
}

impl FinanceStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    // =========================================================================
    // PAYMENTS
    // =========================================================================

    fn list_payments(&self, project_id: Option<&str>) -> BizFinResult<Vec<Payment>> {
        let payments = read(&self.payments)?;
        let mut out: Vec<Payment> = payments
            .iter()
            .filter(|p| project_id.map_or(true, |id| p.project_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.scheduled_date
                .cmp(&b.scheduled_date)
                .then_with(|| a.key().cmp(&b.key()))
        });
        Ok(out)
    }

    fn update_payment(&self, payment: &Payment) -> BizFinResult<()> {
        let mut payments = write(&self.payments)?;
        let key = payment.key();
        let slot = payments
            .iter_mut()
            .find(|p| p.project_id == payment.project_id && p.key() == key)
            .ok_or_else(|| {
                BizFinError::Storage(format!(
                    "no payment {:?} #{} for project '{}'",
                    key.kind, key.number, payment.project_id
                ))
            })?;
        *slot = payment.clone();
        Ok(())
    }

    fn replace_pending_schedule(
        &self,
        project_id: &str,
        replacement: &ScheduleReplacement,
    ) -> BizFinResult<()> {
        let mut payments = write(&self.payments)?;

        // Validate the whole replacement before touching anything.
        if let Some(foreign) = replacement
            .insert
            .iter()
            .find(|p| p.project_id != project_id)
        {
            return Err(BizFinError::InvalidInput {
                field: "insert".into(),
                reason: format!(
                    "payment for project '{}' in schedule of '{project_id}'",
                    foreign.project_id
                ),
            });
        }

        let retract: HashSet<PaymentKey> = replacement.retract.iter().copied().collect();
        for key in &retract {
            let current = payments
                .iter()
                .find(|p| p.project_id == project_id && p.key() == *key);
            match current {
                Some(p) if p.is_paid() => {
                    return Err(BizFinError::Storage(format!(
                        "stale schedule: {:?} #{} of '{project_id}' was paid",
                        key.kind, key.number
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(BizFinError::Storage(format!(
                        "stale schedule: {:?} #{} of '{project_id}' no longer exists",
                        key.kind, key.number
                    )));
                }
            }
        }

        let mut next: Vec<Payment> = payments
            .iter()
            .filter(|p| !(p.project_id == project_id && retract.contains(&p.key())))
            .cloned()
            .collect();
        let mut held: HashSet<PaymentKey> = next
            .iter()
            .filter(|p| p.project_id == project_id)
            .map(Payment::key)
            .collect();
        for p in &replacement.insert {
            if !held.insert(p.key()) {
                return Err(BizFinError::Storage(format!(
                    "payment {:?} #{} of '{project_id}' already exists",
                    p.kind,
                    p.key().number
                )));
            }
        }
        next.extend(replacement.insert.iter().cloned());

        debug!(
            project_id,
            retracted = retract.len(),
            inserted = replacement.insert.len(),
            "replaced pending schedule"
        );
        *payments = next;
        Ok(())
    }

    // =========================================================================
    // RECURRING EXPENSES AND ACCRUALS
    // =========================================================================

    fn list_expenses(&self, range: Option<&DateRange>) -> BizFinResult<Vec<RecurringExpenseRecord>> {
        Ok(read(&self.expenses)?
            .values()
            .filter(|e| {
                range.map_or(true, |r| {
                    e.start_date <= r.end && e.end_date.map_or(true, |end| end >= r.start)
                })
            })
            .cloned()
            .collect())
    }

    fn upsert_expense(&self, record: &RecurringExpenseRecord) -> BizFinResult<()> {
        write(&self.expenses)?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn list_recurring_periods(&self, source_id: &str) -> BizFinResult<HashSet<u32>> {
        Ok(read(&self.accruals)?
            .keys()
            .filter(|(id, _)| id == source_id)
            .map(|(_, p)| *p)
            .collect())
    }

    fn insert_accrual(&self, accrual: &AccruedExpense) -> BizFinResult<()> {
        let mut accruals = write(&self.accruals)?;
        let key = (accrual.source_id.clone(), accrual.period_index);
        if accruals.contains_key(&key) {
            return Err(BizFinError::DuplicateOccurrence {
                source_id: accrual.source_id.clone(),
                period_index: accrual.period_index,
            });
        }
        accruals.insert(key, accrual.clone());
        Ok(())
    }

    fn update_accrual(&self, accrual: &AccruedExpense) -> BizFinResult<()> {
        let mut accruals = write(&self.accruals)?;
        let key = (accrual.source_id.clone(), accrual.period_index);
        match accruals.get_mut(&key) {
            Some(slot) => {
                *slot = accrual.clone();
                Ok(())
            }
            None => Err(BizFinError::Storage(format!(
                "no occurrence {} of '{}'",
                accrual.period_index, accrual.source_id
            ))),
        }
    }

    fn list_accrued_expenses(&self, source_id: Option<&str>) -> BizFinResult<Vec<AccruedExpense>> {
        let mut out: Vec<AccruedExpense> = read(&self.accruals)?
            .values()
            .filter(|a| source_id.map_or(true, |id| a.source_id == id))
            .cloned()
            .collect();
        sort_by_due_date(&mut out);
        Ok(out)
    }

    fn list_accruals_due(&self, range: &DateRange) -> BizFinResult<Vec<AccruedExpense>> {
        let mut out: Vec<AccruedExpense> = read(&self.accruals)?
            .values()
            .filter(|a| range.contains(a.due_date))
            .cloned()
            .collect();
        sort_by_due_date(&mut out);
        Ok(out)
    }

    // =========================================================================
    // INCOME
    // =========================================================================

    fn insert_income(&self, income: &Income) -> BizFinResult<()> {
        write(&self.incomes)?.push(income.clone());
        Ok(())
    }

    fn list_incomes(&self, range: Option<&DateRange>) -> BizFinResult<Vec<Income>> {
        Ok(read(&self.incomes)?
            .iter()
            .filter(|i| in_range(range, i.date))
            .cloned()
            .collect())
    }
}
