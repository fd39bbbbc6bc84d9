use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BizFinError;
use crate::types::{Currency, Money};
use crate::BizFinResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Implementation,
    Recurring,
}

/// Stored values are `Pending` and `Paid`; `Overdue` only comes out of
/// `Payment::effective_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

/// Identity of a payment within its project's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentKey {
    pub kind: PaymentKind,
    /// Installment number for implementation payments, period index for
    /// recurring ones.
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub project_id: String,
    pub client_id: String,
    pub kind: PaymentKind,
    pub amount: Money,
    pub currency: Currency,
    pub scheduled_date: NaiveDate,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
    /// 1-based, implementation payments only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_number: Option<u32>,
    /// 0-based, recurring payments only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
}

impl Payment {
    pub fn key(&self) -> PaymentKey {
        let number = match self.kind {
            PaymentKind::Implementation => self.installment_number.unwrap_or(0),
            PaymentKind::Recurring => self.period_index.unwrap_or(0),
        };
        PaymentKey {
            kind: self.kind,
            number,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid || self.paid_date.is_some()
    }

    /// View-level status: an unpaid payment scheduled before `as_of` is overdue.
    pub fn effective_status(&self, as_of: NaiveDate) -> PaymentStatus {
        if self.is_paid() {
            PaymentStatus::Paid
        } else if self.scheduled_date < as_of {
            PaymentStatus::Overdue
        } else {
            PaymentStatus::Pending
        }
    }

    /// Records settlement. A payment can only be settled once.
    pub fn record_payment(
        &mut self,
        paid_date: NaiveDate,
        invoice_number: Option<String>,
    ) -> BizFinResult<()> {
        if self.is_paid() {
            return Err(BizFinError::InvalidInput {
                field: "status".into(),
                reason: format!(
                    "payment {:?} #{} of project '{}' is already paid",
                    self.kind,
                    self.key().number,
                    self.project_id
                ),
            });
        }
        self.status = PaymentStatus::Paid;
        self.paid_date = Some(paid_date);
        if invoice_number.is_some() {
            self.invoice_number = invoice_number;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Paid / pending / overdue totals for one currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub paid: Money,
    pub pending: Money,
    pub overdue: Money,
    pub count: usize,
}

/// Totals per currency, as of a date. Amounts are never mixed across
/// currencies here.
pub fn schedule_summary(
    payments: &[Payment],
    as_of: NaiveDate,
) -> BTreeMap<Currency, StatusTotals> {
    let mut totals: BTreeMap<Currency, StatusTotals> = BTreeMap::new();
    for p in payments {
        let entry = totals.entry(p.currency).or_default();
        entry.count += 1;
        match p.effective_status(as_of) {
            PaymentStatus::Paid => entry.paid += p.amount,
            PaymentStatus::Pending => entry.pending += p.amount,
            PaymentStatus::Overdue => entry.overdue += p.amount,
        }
    }
    for t in totals.values_mut() {
        t.paid = t.paid.normalize();
        t.pending = t.pending.normalize();
        t.overdue = t.overdue.normalize();
    }
    totals
}

/// Sum of the amounts still owed (pending or overdue) in `currency`.
pub fn outstanding(payments: &[Payment], currency: Currency) -> Money {
    payments
        .iter()
        .filter(|p| p.currency == currency && !p.is_paid())
        .map(|p| p.amount)
        .fold(Decimal::ZERO, |acc, a| acc + a)
}
