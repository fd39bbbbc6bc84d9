pub mod expense;
pub mod generator;

pub use expense::{AccrualStatus, AccruedExpense, RecurringExpense, RecurringExpenseRecord, SourceType};
pub use generator::{
    build_accruals, generate_accruals_batch, generate_up_to, AccrualBatch, AccrualFailure,
    AccrualInput,
};
