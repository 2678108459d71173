//! Projection engine for yearly project ledgers and their metrics

mod state;
mod engine;
mod ledger;
mod metrics;
pub mod irr;

pub use state::{DeductionPool, ProjectionState};
pub use engine::{CashFlowEngine, Evaluation};
pub use ledger::{DeductibleTaxSource, Ledger, LedgerRow, LedgerSummary};
pub use metrics::{payback_period, Metrics, MetricsCalculator, NpvSummary, PAYBACK_UNRECOVERABLE};
pub use irr::calculate_irr;
