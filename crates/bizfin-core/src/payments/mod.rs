pub mod payment;
pub mod plan;
pub mod schedule;

pub use payment::{
    outstanding, schedule_summary, Payment, PaymentKey, PaymentKind, PaymentStatus, StatusTotals,
};
pub use plan::{ImplementationFee, PaymentPlan, PlanTerms, PlanType, Project, RecurringFee};
pub use schedule::{
    build_schedule, generate_payment_schedule, plan_schedule_replacement, ScheduleInput,
    ScheduleOutput, ScheduleReplacement,
};
