use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BizFinError;
use crate::recurrence::Frequency;
use crate::types::{Currency, Money};
use crate::BizFinResult;

/// Recurring expense as the dashboard stores it. `frequency` is free text
/// until it is converted into a `RecurringExpense`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringExpenseRecord {
    pub id: String,
    pub description: String,
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    #[serde(default)]
    pub payment_method: String,
    pub frequency: String,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_auto_debit: bool,
}

fn default_true() -> bool {
    true
}

/// Validated recurring expense definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub id: String,
    pub description: String,
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    pub payment_method: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub is_auto_debit: bool,
}

impl TryFrom<RecurringExpenseRecord> for RecurringExpense {
    type Error = BizFinError;

    fn try_from(record: RecurringExpenseRecord) -> BizFinResult<Self> {
        let frequency: Frequency = record.frequency.parse()?;
        if record.amount < Decimal::ZERO {
            return Err(BizFinError::InvalidInput {
                field: format!("recurring_expense:{} amount", record.id),
                reason: "Amount cannot be negative".into(),
            });
        }
        if let Some(end) = record.end_date {
            if end < record.start_date {
                return Err(BizFinError::DateError(format!(
                    "recurring expense '{}' ends ({end}) before it starts ({})",
                    record.id, record.start_date
                )));
            }
        }
        Ok(Self {
            id: record.id,
            description: record.description,
            amount: record.amount,
            currency: record.currency,
            category: record.category,
            payment_method: record.payment_method,
            frequency,
            start_date: record.start_date,
            end_date: record.end_date,
            is_active: record.is_active,
            is_auto_debit: record.is_auto_debit,
        })
    }
}

impl RecurringExpense {
    /// Amount normalized to a monthly commitment, unrounded.
    pub fn monthly_commitment(&self) -> Money {
        self.frequency.monthly_equivalent(self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Recurring,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualStatus {
    Pending,
    Paid,
    Voided,
}

/// One materialized expense occurrence. `(source_id, period_index)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccruedExpense {
    pub source_type: SourceType,
    pub source_id: String,
    pub period_index: u32,
    pub due_date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    pub payment_method: String,
    pub is_auto_debit: bool,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
}

impl AccruedExpense {
    /// Occurrence `period_index` of a recurring expense, due on `due_date`.
    pub fn from_recurring(expense: &RecurringExpense, period_index: u32, due_date: NaiveDate) -> Self {
        Self {
            source_type: SourceType::Recurring,
            source_id: expense.id.clone(),
            period_index,
            due_date,
            description: expense.description.clone(),
            amount: expense.amount,
            currency: expense.currency,
            category: expense.category.clone(),
            payment_method: expense.payment_method.clone(),
            is_auto_debit: expense.is_auto_debit,
            status: AccrualStatus::Pending,
            paid_date: None,
        }
    }

    /// A one-off expense. Its id is its source id; the period index is 0.
    #[allow(clippy::too_many_arguments)]
    pub fn variable(
        id: impl Into<String>,
        description: impl Into<String>,
        amount: Money,
        currency: Currency,
        category: impl Into<String>,
        payment_method: impl Into<String>,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            source_type: SourceType::Variable,
            source_id: id.into(),
            period_index: 0,
            due_date,
            description: description.into(),
            amount,
            currency,
            category: category.into(),
            payment_method: payment_method.into(),
            is_auto_debit: false,
            status: AccrualStatus::Pending,
            paid_date: None,
        }
    }

    pub fn mark_paid(&mut self, paid_date: NaiveDate) -> BizFinResult<()> {
        if self.status != AccrualStatus::Pending {
            return Err(self.transition_error("paid"));
        }
        self.status = AccrualStatus::Paid;
        self.paid_date = Some(paid_date);
        Ok(())
    }

    pub fn void(&mut self) -> BizFinResult<()> {
        if self.status != AccrualStatus::Pending {
            return Err(self.transition_error("voided"));
        }
        self.status = AccrualStatus::Voided;
        Ok(())
    }

    /// Voided occurrences keep their key but carry no cost.
    pub fn counts_as_expense(&self) -> bool {
        self.status != AccrualStatus::Voided
    }

    fn transition_error(&self, target: &str) -> BizFinError {
        BizFinError::InvalidInput {
            field: "status".into(),
            reason: format!(
                "occurrence {} of '{}' is {:?} and cannot be {target}",
                self.period_index, self.source_id, self.status
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(frequency: &str) -> RecurringExpenseRecord {
        RecurringExpenseRecord {
            id: "rent".into(),
            description: "Office rent".into(),
            amount: dec!(2_500_000),
            currency: Currency::COP,
            category: "rent".into(),
            payment_method: "transfer".into(),
            frequency: frequency.into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            end_date: None,
            is_active: true,
            is_auto_debit: true,
        }
    }

    #[test]
    fn test_record_converts_with_known_frequency() {
        let expense = RecurringExpense::try_from(record("Monthly")).unwrap();
        assert_eq!(expense.frequency, Frequency::Monthly);
        assert!(expense.is_auto_debit);
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        let err = RecurringExpense::try_from(record("sometimes")).unwrap_err();
        assert!(matches!(err, BizFinError::UnknownFrequency(ref f) if f == "sometimes"));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut r = record("monthly");
        r.end_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert!(RecurringExpense::try_from(r).is_err());
    }

    #[test]
    fn test_record_defaults_active() {
        let json = r#"{
            "id": "saas", "description": "Hosting", "amount": "45.50", "currency": "USD",
            "category": "software", "frequency": "monthly", "start_date": "2024-02-01"
        }"#;
        let r: RecurringExpenseRecord = serde_json::from_str(json).unwrap();
        assert!(r.is_active);
        assert!(!r.is_auto_debit);
    }

    #[test]
    fn test_status_transitions() {
        let expense = RecurringExpense::try_from(record("monthly")).unwrap();
        let mut occ = AccruedExpense::from_recurring(&expense, 0, expense.start_date);
        occ.mark_paid(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()).unwrap();
        assert_eq!(occ.status, AccrualStatus::Paid);
        assert!(occ.void().is_err());

        let mut other = AccruedExpense::from_recurring(&expense, 1, expense.start_date);
        other.void().unwrap();
        assert!(!other.counts_as_expense());
        assert!(other.mark_paid(expense.start_date).is_err());
    }

    #[test]
    fn test_monthly_commitment_for_annual() {
        let mut r = record("annual");
        r.amount = dec!(1_200_000);
        let expense = RecurringExpense::try_from(r).unwrap();
        assert_eq!(expense.monthly_commitment(), dec!(100_000));
    }
}
