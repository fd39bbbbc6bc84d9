//! Payment schedule generation.
//!
//! A validated plan expands into:
//! - implementation installments, one per month from the project start, with
//!   the last installment absorbing the rounding remainder
//! - recurring charges for period indices `0..horizon`, skipping the grace
//!   window and discounting the periods right after it
//!
//! Generation is pure. Persisting a schedule goes through
//! `plan_schedule_replacement`, which decides what an existing schedule loses
//! and gains without touching anything already paid.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::currency::{round_to_unit, truncate_to_unit};
use crate::payments::payment::{
    schedule_summary, Payment, PaymentKey, PaymentKind, PaymentStatus, StatusTotals,
};
use crate::payments::plan::{ImplementationFee, PaymentPlan, PlanTerms, Project, RecurringFee};
use crate::recurrence::{nth_occurrence, Frequency};
use crate::types::{with_metadata, ComputationOutput, Currency, Money};
use crate::BizFinResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Input for schedule generation from the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub plan: PaymentPlan,
    pub project: Project,
    /// Recurring periods to generate; defaults to the configured horizon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_periods: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    pub payments: Vec<Payment>,
    pub implementation_total: Money,
    pub recurring_total: Money,
    /// Recurring periods skipped by the grace window.
    pub grace_periods_skipped: u32,
    /// Recurring periods billed at the discounted rate.
    pub discounted_periods: u32,
    /// Paid / pending / overdue totals as of the configured date.
    pub status_summary: BTreeMap<Currency, StatusTotals>,
}

/// Changes to apply to a project's stored schedule, as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReplacement {
    /// Unpaid pending payments to retract.
    pub retract: Vec<PaymentKey>,
    /// New payments to insert.
    pub insert: Vec<Payment>,
    /// Generated payments dropped because that slot is already paid.
    pub kept_paid: Vec<PaymentKey>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate every payment a plan implies for `project`.
///
/// The plan is validated before anything is generated; an invalid plan
/// produces no payments at all.
pub fn generate_payment_schedule(
    plan: &PaymentPlan,
    project: &Project,
    horizon_periods: u32,
) -> BizFinResult<Vec<Payment>> {
    let terms = plan.validate()?;
    Ok(expand_terms(&terms, project, horizon_periods))
}

/// Schedule generation wrapped in the standard output envelope.
pub fn build_schedule(
    input: &ScheduleInput,
    config: &EngineConfig,
) -> BizFinResult<ComputationOutput<ScheduleOutput>> {
    let horizon = input
        .horizon_periods
        .unwrap_or(config.schedule_horizon_periods);
    let terms = input.plan.validate()?;
    let payments = expand_terms(&terms, &input.project, horizon);

    let mut warnings = Vec::new();
    let mut grace_periods_skipped = 0;
    let mut discounted_periods = 0;
    if let Some(fee) = terms.recurring() {
        grace_periods_skipped = fee.grace_periods.min(horizon);
        discounted_periods = (0..horizon).filter(|p| fee.is_discounted(*p)).count() as u32;
        if fee.grace_periods >= horizon {
            warnings.push(format!(
                "Grace window ({} periods) covers the whole horizon ({horizon}); \
                 no recurring payments were generated",
                fee.grace_periods
            ));
        }
        if fee.day_of_charge.is_some() && !fee.frequency.is_month_based() {
            warnings.push(format!(
                "day_of_charge is ignored for {} charges",
                fee.frequency
            ));
        }
    }

    let implementation_total = sum_kind(&payments, PaymentKind::Implementation);
    let recurring_total = sum_kind(&payments, PaymentKind::Recurring);

    let status_summary = schedule_summary(&payments, config.as_of);
    let output = ScheduleOutput {
        payments,
        implementation_total,
        recurring_total,
        grace_periods_skipped,
        discounted_periods,
        status_summary,
    };

    Ok(with_metadata(
        "Implementation installments + recurring fee with grace/discount windows",
        &serde_json::json!({
            "plan_type": input.plan.plan_type.to_string(),
            "project_start": input.project.start_date,
            "horizon_periods": horizon,
        }),
        warnings,
        config.as_of,
        output,
    ))
}

/// Splits `total` into `installments` shares truncated to the currency unit;
/// the last share takes the remainder so the shares sum to `total` exactly.
pub fn split_installments(total: Money, installments: u32, currency: Currency) -> Vec<Money> {
    if installments == 0 {
        return Vec::new();
    }
    let n = Decimal::from(installments);
    let share = truncate_to_unit(total / n, currency);
    let mut shares = vec![share; installments as usize];
    let allocated = share * Decimal::from(installments - 1);
    if let Some(last) = shares.last_mut() {
        *last = total - allocated;
    }
    shares
}

/// Amount charged for period `p`: discounted inside the discount window,
/// nominal otherwise.
pub fn recurring_amount(fee: &RecurringFee, p: u32) -> Money {
    if fee.is_discounted(p) {
        let factor = Decimal::ONE - fee.discount_percentage / dec!(100);
        round_to_unit(fee.amount * factor, fee.currency)
    } else {
        fee.amount
    }
}

/// Decides how a freshly generated schedule replaces an existing one.
///
/// Every unpaid pending payment is retracted. A generated payment whose key
/// is already held by a paid payment is dropped; everything else is
/// inserted.
pub fn plan_schedule_replacement(
    existing: &[Payment],
    generated: Vec<Payment>,
) -> ScheduleReplacement {
    let paid: HashSet<PaymentKey> = existing
        .iter()
        .filter(|p| p.is_paid())
        .map(Payment::key)
        .collect();

    let mut retract: Vec<PaymentKey> = existing
        .iter()
        .filter(|p| !p.is_paid())
        .map(Payment::key)
        .collect();
    retract.sort();

    let mut insert = Vec::with_capacity(generated.len());
    let mut kept_paid = Vec::new();
    for payment in generated {
        let key = payment.key();
        if paid.contains(&key) {
            kept_paid.push(key);
        } else {
            insert.push(payment);
        }
    }

    ScheduleReplacement {
        retract,
        insert,
        kept_paid,
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn expand_terms(terms: &PlanTerms, project: &Project, horizon_periods: u32) -> Vec<Payment> {
    let mut payments = Vec::new();
    if let Some(fee) = terms.implementation() {
        payments.extend(implementation_payments(fee, project));
    }
    if let Some(fee) = terms.recurring() {
        payments.extend(recurring_payments(fee, project, horizon_periods));
    }
    debug!(
        project_id = %project.id,
        payments = payments.len(),
        horizon_periods,
        "generated payment schedule"
    );
    payments
}

fn implementation_payments(fee: &ImplementationFee, project: &Project) -> Vec<Payment> {
    split_installments(fee.total, fee.installments, fee.currency)
        .into_iter()
        .enumerate()
        .map(|(i, amount)| {
            let i = i as u32;
            Payment {
                project_id: project.id.clone(),
                client_id: project.client_id.clone(),
                kind: PaymentKind::Implementation,
                amount,
                currency: fee.currency,
                scheduled_date: nth_occurrence(project.start_date, Frequency::Monthly, None, i),
                status: PaymentStatus::Pending,
                paid_date: None,
                installment_number: Some(i + 1),
                period_index: None,
                invoice_number: None,
            }
        })
        .collect()
}

fn recurring_payments(fee: &RecurringFee, project: &Project, horizon_periods: u32) -> Vec<Payment> {
    (fee.grace_periods..horizon_periods)
        .map(|p| Payment {
            project_id: project.id.clone(),
            client_id: project.client_id.clone(),
            kind: PaymentKind::Recurring,
            amount: recurring_amount(fee, p),
            currency: fee.currency,
            scheduled_date: nth_occurrence(project.start_date, fee.frequency, fee.day_of_charge, p),
            status: PaymentStatus::Pending,
            paid_date: None,
            installment_number: None,
            period_index: Some(p),
            invoice_number: None,
        })
        .collect()
}

fn sum_kind(payments: &[Payment], kind: PaymentKind) -> Money {
    payments
        .iter()
        .filter(|p| p.kind == kind)
        .map(|p| p.amount)
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
