//! Summary investment metrics derived from a built ledger

use serde::{Deserialize, Serialize};

use super::irr::{calculate_irr, npv};
use super::ledger::Ledger;
use crate::error::{ComputationFault, EvalError, EvalResult};

/// Reported payback when cumulative post-tax cash flow never turns non-negative
pub const PAYBACK_UNRECOVERABLE: f64 = 99.9;

/// Headline project metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Static investment + construction interest + working capital
    pub total_investment: f64,

    /// Construction-period financing cost
    pub construction_interest: f64,

    /// Project IRR before income tax, percent. `None` when no IRR exists.
    pub pre_tax_irr_pct: Option<f64>,

    /// Project IRR after income tax, percent. `None` when no IRR exists.
    pub post_tax_irr_pct: Option<f64>,

    /// Static payback on post-tax cash flow, years
    pub payback_years: f64,
}

impl Metrics {
    pub fn is_recoverable(&self) -> bool {
        self.payback_years < PAYBACK_UNRECOVERABLE
    }
}

/// Net present values at a benchmark rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NpvSummary {
    pub rate: f64,
    pub pre_tax: f64,
    pub post_tax: f64,
}

/// Derives [`Metrics`] from a ledger
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn compute(ledger: &Ledger) -> EvalResult<Metrics> {
        if ledger.is_empty() {
            return Err(EvalError::computation("metrics", ComputationFault::EmptyLedger));
        }

        let pre_tax = ledger.pre_tax_cash_flows();
        let post_tax = ledger.post_tax_cash_flows();

        Ok(Metrics {
            total_investment: ledger.total_investment,
            construction_interest: ledger.construction_interest,
            pre_tax_irr_pct: calculate_irr(&pre_tax).map(|r| r * 100.0),
            post_tax_irr_pct: calculate_irr(&post_tax).map(|r| r * 100.0),
            payback_years: payback_period(&post_tax),
        })
    }

    /// Pre- and post-tax NPV at `rate`
    pub fn npv(ledger: &Ledger, rate: f64) -> EvalResult<NpvSummary> {
        if ledger.is_empty() {
            return Err(EvalError::computation("npv", ComputationFault::EmptyLedger));
        }
        if !(rate > -1.0) {
            return Err(EvalError::validation("rate", "discount rate must be greater than -100%"));
        }
        Ok(NpvSummary {
            rate,
            pre_tax: npv(&ledger.pre_tax_cash_flows(), rate),
            post_tax: npv(&ledger.post_tax_cash_flows(), rate),
        })
    }
}

/// Static payback period with linear interpolation inside the crossing year
///
/// With `i` the first (0-based) index where the cumulative sum is non-negative,
/// payback = (i - 1) + |cumulative[i - 1]| / cashflows[i].
pub fn payback_period(cashflows: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    for (i, &cf) in cashflows.iter().enumerate() {
        let previous = cumulative;
        cumulative += cf;
        if cumulative >= 0.0 {
            if i == 0 {
                return 0.0;
            }
            return (i as f64 - 1.0) + previous.abs() / cf;
        }
    }
    PAYBACK_UNRECOVERABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_payback_interpolates() {
        // Cumulative: -100, -40, 20 -> crosses at index 2
        let payback = payback_period(&[-100.0, 60.0, 60.0]);
        assert_abs_diff_eq!(payback, 1.0 + 40.0 / 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_payback_exact_zero_crossing() {
        assert_abs_diff_eq!(payback_period(&[-100.0, 50.0, 50.0]), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_payback_unrecoverable() {
        assert_eq!(payback_period(&[-100.0, 10.0, 10.0]), PAYBACK_UNRECOVERABLE);
        assert_eq!(payback_period(&[]), PAYBACK_UNRECOVERABLE);
    }

    #[test]
    fn test_empty_ledger_is_computation_error() {
        let ledger = Ledger::new(1.0, 0.0, 0.0, 0.0, 0.0, crate::projection::DeductibleTaxSource::Explicit, 1.0);
        assert!(MetricsCalculator::compute(&ledger).unwrap_err().is_computation());
        assert!(MetricsCalculator::npv(&ledger, 0.08).unwrap_err().is_computation());
    }
}
