pub mod accruals;
pub mod config;
pub mod currency;
pub mod error;
pub mod metrics;
pub mod payments;
pub mod recurrence;
pub mod types;

#[cfg(feature = "storage")]
pub mod storage;

#[cfg(feature = "storage")]
pub mod sync;

pub use config::EngineConfig;
pub use currency::CurrencyConverter;
pub use error::BizFinError;
pub use types::*;

pub use accruals::generate_up_to as generate_accruals;
pub use metrics::{compute_metrics, project_scenario};
pub use payments::generate_payment_schedule;
pub use recurrence::{nth_occurrence, Frequency};

/// Standard result type for all bizfin operations
pub type BizFinResult<T> = Result<T, BizFinError>;
