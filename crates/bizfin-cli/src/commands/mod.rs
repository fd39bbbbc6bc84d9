pub mod accruals;
pub mod convert;
pub mod metrics;
pub mod occurrences;
pub mod projection;
pub mod schedule;
