//! Payment plans as stored, and their validated form.
//!
//! `PaymentPlan` mirrors the loosely-shaped record attached to a project.
//! `PaymentPlan::validate` turns it into `PlanTerms`, a tagged variant per
//! plan type, so the generator never has to handle a missing fee.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::currency::round_to_unit;
use crate::error::BizFinError;
use crate::recurrence::Frequency;
use crate::types::{Currency, Money, Percent};
use crate::BizFinResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub name: String,
    /// Anchor date for every payment in the project's schedule.
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    SingleFee,
    InstallmentFee,
    RecurringSubscription,
    Mixed,
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanType::SingleFee => "single_fee",
            PlanType::InstallmentFee => "installment_fee",
            PlanType::RecurringSubscription => "recurring_subscription",
            PlanType::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// One-off implementation fee, optionally split into monthly installments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationFee {
    pub total: Money,
    pub currency: Currency,
    #[serde(default = "default_installments")]
    pub installments: u32,
}

fn default_installments() -> u32 {
    1
}

/// Subscription charged every period after the grace window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringFee {
    pub amount: Money,
    pub currency: Currency,
    pub frequency: Frequency,
    /// Day of month (1-31) charges land on; clipped to short months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_charge: Option<u32>,
    /// Leading periods with no charge.
    #[serde(default)]
    pub grace_periods: u32,
    /// Periods after the grace window billed at the discounted rate.
    #[serde(default)]
    pub discount_periods: u32,
    /// Discount applied during the discount window, 0-100.
    #[serde(default)]
    pub discount_percentage: Percent,
}

impl RecurringFee {
    /// True when period `p` falls inside the discount window.
    pub fn is_discounted(&self, p: u32) -> bool {
        self.discount_periods > 0
            && p >= self.grace_periods
            && u64::from(p) < u64::from(self.grace_periods) + u64::from(self.discount_periods)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub plan_type: PlanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_fee: Option<ImplementationFee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_fee: Option<RecurringFee>,
}

/// Validated plan: exactly the fees its type calls for.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanTerms {
    SingleFee(ImplementationFee),
    InstallmentFee(ImplementationFee),
    RecurringSubscription(RecurringFee),
    Mixed {
        implementation: ImplementationFee,
        recurring: RecurringFee,
    },
}

impl PlanTerms {
    pub fn implementation(&self) -> Option<&ImplementationFee> {
        match self {
            PlanTerms::SingleFee(fee) | PlanTerms::InstallmentFee(fee) => Some(fee),
            PlanTerms::Mixed { implementation, .. } => Some(implementation),
            PlanTerms::RecurringSubscription(_) => None,
        }
    }

    pub fn recurring(&self) -> Option<&RecurringFee> {
        match self {
            PlanTerms::RecurringSubscription(fee) => Some(fee),
            PlanTerms::Mixed { recurring, .. } => Some(recurring),
            PlanTerms::SingleFee(_) | PlanTerms::InstallmentFee(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl PaymentPlan {
    pub fn validate(&self) -> BizFinResult<PlanTerms> {
        let plan_type = self.plan_type;
        let terms = match plan_type {
            PlanType::SingleFee => {
                let mut fee = require_implementation(self)?;
                fee.installments = 1;
                PlanTerms::SingleFee(fee)
            }
            PlanType::InstallmentFee => PlanTerms::InstallmentFee(require_implementation(self)?),
            PlanType::RecurringSubscription => {
                PlanTerms::RecurringSubscription(require_recurring(self)?)
            }
            PlanType::Mixed => PlanTerms::Mixed {
                implementation: require_implementation(self)?,
                recurring: require_recurring(self)?,
            },
        };

        if let Some(fee) = terms.implementation() {
            validate_implementation(plan_type, fee)?;
        }
        if let Some(fee) = terms.recurring() {
            validate_recurring(plan_type, fee)?;
        }
        Ok(terms)
    }
}

fn invalid(plan_type: PlanType, reason: impl Into<String>) -> BizFinError {
    BizFinError::InvalidPlan {
        plan_type: plan_type.to_string(),
        reason: reason.into(),
    }
}

fn require_implementation(plan: &PaymentPlan) -> BizFinResult<ImplementationFee> {
    plan.implementation_fee
        .clone()
        .ok_or_else(|| invalid(plan.plan_type, "implementation_fee is required"))
}

fn require_recurring(plan: &PaymentPlan) -> BizFinResult<RecurringFee> {
    plan.recurring_fee
        .clone()
        .ok_or_else(|| invalid(plan.plan_type, "recurring_fee is required"))
}

fn validate_implementation(plan_type: PlanType, fee: &ImplementationFee) -> BizFinResult<()> {
    if fee.total <= Decimal::ZERO {
        return Err(invalid(plan_type, "implementation_fee.total must be positive"));
    }
    if fee.installments == 0 {
        return Err(invalid(plan_type, "implementation_fee.installments must be at least 1"));
    }
    if round_to_unit(fee.total, fee.currency) != fee.total {
        return Err(invalid(
            plan_type,
            format!(
                "implementation_fee.total {} is finer than the smallest {} unit",
                fee.total, fee.currency
            ),
        ));
    }
    Ok(())
}

fn validate_recurring(plan_type: PlanType, fee: &RecurringFee) -> BizFinResult<()> {
    if fee.amount <= Decimal::ZERO {
        return Err(invalid(plan_type, "recurring_fee.amount must be positive"));
    }
    if round_to_unit(fee.amount, fee.currency) != fee.amount {
        return Err(invalid(
            plan_type,
            format!(
                "recurring_fee.amount {} is finer than the smallest {} unit",
                fee.amount, fee.currency
            ),
        ));
    }
    if let Some(day) = fee.day_of_charge {
        if !(1..=31).contains(&day) {
            return Err(invalid(
                plan_type,
                format!("recurring_fee.day_of_charge must be 1-31 (got {day})"),
            ));
        }
    }
    if fee.discount_percentage < Decimal::ZERO || fee.discount_percentage > dec!(100) {
        return Err(invalid(
            plan_type,
            "recurring_fee.discount_percentage must be between 0 and 100",
        ));
    }
    Ok(())
}
