use bizfin_core::payments::{
    build_schedule, generate_payment_schedule, ImplementationFee, PaymentKind, PaymentPlan,
    PlanType, Project, RecurringFee, ScheduleInput,
};
use bizfin_core::recurrence::Frequency;
use bizfin_core::{BizFinError, Currency, EngineConfig};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn project() -> Project {
    Project {
        id: "proj-42".into(),
        client_id: "client-7".into(),
        name: "Inventory portal".into(),
        start_date: d(2024, 1, 10),
    }
}

fn implementation(total: Decimal, installments: u32) -> ImplementationFee {
    ImplementationFee {
        total,
        currency: Currency::COP,
        installments,
    }
}

fn recurring(amount: Decimal, grace: u32, discount_periods: u32, pct: Decimal) -> RecurringFee {
    RecurringFee {
        amount,
        currency: Currency::COP,
        frequency: Frequency::Monthly,
        day_of_charge: Some(1),
        grace_periods: grace,
        discount_periods,
        discount_percentage: pct,
    }
}

// ===========================================================================
// Mixed plan
// ===========================================================================

#[test]
fn test_mixed_plan_example() {
    let plan = PaymentPlan {
        plan_type: PlanType::Mixed,
        implementation_fee: Some(implementation(dec!(3_000_000), 3)),
        recurring_fee: Some(recurring(dec!(500_000), 1, 2, dec!(50))),
    };
    let payments = generate_payment_schedule(&plan, &project(), 6).unwrap();

    let implementation: Vec<_> = payments
        .iter()
        .filter(|p| p.kind == PaymentKind::Implementation)
        .collect();
    assert_eq!(implementation.len(), 3);
    assert!(implementation.iter().all(|p| p.amount == dec!(1_000_000)));
    let dates: Vec<_> = implementation.iter().map(|p| p.scheduled_date).collect();
    assert_eq!(dates, vec![d(2024, 1, 10), d(2024, 2, 10), d(2024, 3, 10)]);
    let numbers: Vec<_> = implementation.iter().map(|p| p.installment_number).collect();
    assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);

    let recurring: Vec<_> = payments
        .iter()
        .filter(|p| p.kind == PaymentKind::Recurring)
        .collect();
    let periods: Vec<_> = recurring.iter().map(|p| p.period_index.unwrap()).collect();
    assert_eq!(periods, vec![1, 2, 3, 4, 5]);
    let amounts: Vec<_> = recurring.iter().map(|p| p.amount).collect();
    assert_eq!(
        amounts,
        vec![dec!(250_000), dec!(250_000), dec!(500_000), dec!(500_000), dec!(500_000)]
    );
    // day_of_charge = 1 moves every charge to the first of the month
    assert_eq!(recurring[0].scheduled_date, d(2024, 2, 1));
    assert!(payments.iter().all(|p| p.client_id == "client-7"));
}

// ===========================================================================
// Implementation fee properties
// ===========================================================================

#[test]
fn test_single_fee_is_one_payment_of_total() {
    for total in [dec!(1), dec!(999_999), dec!(12_345_678)] {
        let plan = PaymentPlan {
            plan_type: PlanType::SingleFee,
            implementation_fee: Some(implementation(total, 1)),
            recurring_fee: None,
        };
        let payments = generate_payment_schedule(&plan, &project(), 12).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, total);
    }
}

#[test]
fn test_installments_sum_to_total_exactly() {
    for (total, n) in [(dec!(1_000_000), 3u32), (dec!(10), 7), (dec!(7_777_777), 12)] {
        let plan = PaymentPlan {
            plan_type: PlanType::InstallmentFee,
            implementation_fee: Some(implementation(total, n)),
            recurring_fee: None,
        };
        let payments = generate_payment_schedule(&plan, &project(), 12).unwrap();
        assert_eq!(payments.len() as u32, n);
        let sum: Decimal = payments.iter().map(|p| p.amount).sum();
        assert_eq!(sum, total);
    }
}

#[test]
fn test_usd_installments_keep_cents() {
    let plan = PaymentPlan {
        plan_type: PlanType::InstallmentFee,
        implementation_fee: Some(ImplementationFee {
            total: dec!(100),
            currency: Currency::USD,
            installments: 3,
        }),
        recurring_fee: None,
    };
    let payments = generate_payment_schedule(&plan, &project(), 12).unwrap();
    let amounts: Vec<_> = payments.iter().map(|p| p.amount).collect();
    assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
}

// ===========================================================================
// Recurring fee properties
// ===========================================================================

#[test]
fn test_grace_and_discount_windows() {
    let plan = PaymentPlan {
        plan_type: PlanType::RecurringSubscription,
        implementation_fee: None,
        recurring_fee: Some(recurring(dec!(333_333), 2, 3, dec!(15))),
    };
    let payments = generate_payment_schedule(&plan, &project(), 8).unwrap();
    assert_eq!(payments.len(), 6);
    for p in &payments {
        let period = p.period_index.unwrap();
        assert!(period >= 2);
        if period < 5 {
            // 333,333 * 0.85 = 283,333.05 -> 283,333
            assert_eq!(p.amount, dec!(283_333));
        } else {
            assert_eq!(p.amount, dec!(333_333));
        }
    }
}

#[test]
fn test_day_of_charge_clamps_to_month_end() {
    let mut fee = recurring(dec!(100), 0, 0, dec!(0));
    fee.day_of_charge = Some(31);
    let plan = PaymentPlan {
        plan_type: PlanType::RecurringSubscription,
        implementation_fee: None,
        recurring_fee: Some(fee),
    };
    let mut p = project();
    p.start_date = d(2024, 1, 31);
    let payments = generate_payment_schedule(&plan, &p, 4).unwrap();
    let dates: Vec<_> = payments.iter().map(|p| p.scheduled_date).collect();
    assert_eq!(
        dates,
        vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30)]
    );
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_missing_fee_is_invalid_plan() {
    let cases = [
        (PlanType::SingleFee, None, None),
        (PlanType::InstallmentFee, None, Some(recurring(dec!(1), 0, 0, dec!(0)))),
        (PlanType::RecurringSubscription, Some(implementation(dec!(1), 1)), None),
        (PlanType::Mixed, Some(implementation(dec!(1), 1)), None),
    ];
    for (plan_type, implementation_fee, recurring_fee) in cases {
        let plan = PaymentPlan {
            plan_type,
            implementation_fee,
            recurring_fee,
        };
        let err = generate_payment_schedule(&plan, &project(), 12).unwrap_err();
        assert!(
            matches!(err, BizFinError::InvalidPlan { .. }),
            "{plan_type} should be rejected, got {err}"
        );
    }
}

#[test]
fn test_plan_from_json() {
    let json = r#"{
        "plan_type": "recurring_subscription",
        "recurring_fee": {
            "amount": "49.90",
            "currency": "USD",
            "frequency": "quarterly",
            "day_of_charge": 15
        }
    }"#;
    let plan: PaymentPlan = serde_json::from_str(json).unwrap();
    let payments = generate_payment_schedule(&plan, &project(), 4).unwrap();
    let dates: Vec<_> = payments.iter().map(|p| p.scheduled_date).collect();
    assert_eq!(
        dates,
        vec![d(2024, 1, 15), d(2024, 4, 15), d(2024, 7, 15), d(2024, 10, 15)]
    );
    assert!(payments.iter().all(|p| p.amount == dec!(49.90)));
}

#[test]
fn test_status_summary_splits_overdue_and_pending() {
    let input = ScheduleInput {
        plan: PaymentPlan {
            plan_type: PlanType::Mixed,
            implementation_fee: Some(implementation(dec!(3_000_000), 3)),
            recurring_fee: Some(recurring(dec!(500_000), 1, 2, dec!(50))),
        },
        project: project(),
        horizon_periods: Some(4),
    };
    let out = build_schedule(&input, &EngineConfig::new(d(2024, 2, 20))).unwrap();
    let cop = &out.result.status_summary[&Currency::COP];

    // Jan 10 + Feb 10 installments, Feb 1 discounted charge
    assert_eq!(cop.overdue, dec!(2_250_000));
    // Mar 10 installment, Mar 1 discounted charge, Apr 1 full charge
    assert_eq!(cop.pending, dec!(1_750_000));
    assert_eq!(cop.paid, Decimal::ZERO);
    assert_eq!(cop.count, 6);
}
