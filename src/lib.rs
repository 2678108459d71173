//! PV Economics - Lifecycle economic evaluation engine for photovoltaic projects
//!
//! This library provides:
//! - Yearly project ledgers over construction and operation
//! - VAT deduction pool, surtax and tiered income-tax holiday modeling
//! - Pre- and post-tax project IRR, NPV and static payback
//! - One-factor sensitivity sweeps and factor ranking
//! - Goal seek for the maximum static investment at a target return
//! - CSV report tables for a built ledger

pub mod assumptions;
pub mod error;
pub mod goal_seek;
pub mod project;
pub mod projection;
pub mod report;
pub mod sensitivity;

// Re-export commonly used types
pub use assumptions::{EconomicAssumptions, RateSchedule};
pub use error::{ErrorKind, EvalError, EvalResult};
pub use goal_seek::{GoalSeekOutcome, GoalSeeker};
pub use project::{ProjectParameters, RawParameters, RevenueMode};
pub use projection::{CashFlowEngine, Evaluation, Ledger, LedgerRow, Metrics};
pub use sensitivity::{SensitivityFactor, SensitivityRunner, SensitivityTable};
