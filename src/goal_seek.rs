//! Inverse solve: the static investment that yields a target pre-tax return

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::assumptions::EconomicAssumptions;
use crate::project::ProjectParameters;
use crate::projection::CashFlowEngine;

/// Default search bracket for static investment, in 10k currency units
pub const DEFAULT_LOWER_BOUND: f64 = 10_000.0;
pub const DEFAULT_UPPER_BOUND: f64 = 100_000.0;

const MAX_ITERATIONS: u32 = 100;
const X_TOLERANCE: f64 = 1e-6;
const R_TOLERANCE: f64 = 4.0 * f64::EPSILON;

/// How a goal-seek ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GoalSeekOutcome {
    Solved { static_investment: f64, iterations: u32 },
    /// Bounds not positive, not finite, or not ordered
    InvalidBracket { lower: f64, upper: f64 },
    /// Target return is not straddled by the bracket
    NoSignChange { lower_residual: f64, upper_residual: f64 },
    /// A trial investment could not be evaluated or has no IRR
    TrialFailed { static_investment: f64, reason: String },
    NotConverged { best_estimate: f64, iterations: u32 },
}

impl GoalSeekOutcome {
    pub fn static_investment(&self) -> Option<f64> {
        match self {
            GoalSeekOutcome::Solved { static_investment, .. } => Some(*static_investment),
            _ => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, GoalSeekOutcome::Solved { .. })
    }
}

/// Goal seeker bound to one assumption regime
#[derive(Debug, Clone)]
pub struct GoalSeeker {
    assumptions: EconomicAssumptions,
}

impl GoalSeeker {
    pub fn new() -> Self {
        Self {
            assumptions: EconomicAssumptions::default_regime(),
        }
    }

    pub fn with_assumptions(assumptions: EconomicAssumptions) -> Self {
        Self { assumptions }
    }

    /// Maximum static investment for which the pre-tax IRR (percent) equals `target_return`
    pub fn solve(&self, target_return: f64, params: &ProjectParameters, lower: f64, upper: f64) -> Option<f64> {
        self.solve_detailed(target_return, params, lower, upper).static_investment()
    }

    pub fn solve_detailed(
        &self,
        target_return: f64,
        params: &ProjectParameters,
        lower: f64,
        upper: f64,
    ) -> GoalSeekOutcome {
        let outcome = if !(lower > 0.0 && upper.is_finite() && lower < upper) || !target_return.is_finite() {
            GoalSeekOutcome::InvalidBracket { lower, upper }
        } else {
            brent(|x| self.residual(target_return, params, x), lower, upper)
        };

        match &outcome {
            GoalSeekOutcome::Solved { static_investment, iterations } => debug!(
                "goal seek for {target_return}% solved at {static_investment:.4} after {iterations} iterations"
            ),
            other => warn!("goal seek for {target_return}% on [{lower}, {upper}] found no answer: {other:?}"),
        }
        outcome
    }

    /// Pre-tax IRR at `static_investment` minus the target
    fn residual(&self, target_return: f64, params: &ProjectParameters, static_investment: f64) -> Result<f64, GoalSeekOutcome> {
        let failed = |reason: String| GoalSeekOutcome::TrialFailed { static_investment, reason };

        let trial = params
            .clone()
            .with_static_investment(static_investment)
            .and_then(|p| CashFlowEngine::evaluate(p, self.assumptions.clone()))
            .map_err(|e| failed(e.to_string()))?;

        let irr = trial
            .metrics
            .pre_tax_irr_pct
            .ok_or_else(|| failed("pre-tax IRR does not exist".to_string()))?;

        trace!("goal seek trial {static_investment:.6}: IRR {irr:.8}%");
        Ok(irr - target_return)
    }
}

impl Default for GoalSeeker {
    fn default() -> Self {
        Self::new()
    }
}

/// Brent's bracketing root finder combining bisection, secant and inverse
/// quadratic interpolation steps
fn brent<F>(mut f: F, a: f64, b: f64) -> GoalSeekOutcome
where
    F: FnMut(f64) -> Result<f64, GoalSeekOutcome>,
{
    let mut x_pre = a;
    let mut x_cur = b;
    let mut f_pre = match f(x_pre) {
        Ok(v) => v,
        Err(outcome) => return outcome,
    };
    let mut f_cur = match f(x_cur) {
        Ok(v) => v,
        Err(outcome) => return outcome,
    };

    if f_pre * f_cur > 0.0 {
        return GoalSeekOutcome::NoSignChange {
            lower_residual: f_pre,
            upper_residual: f_cur,
        };
    }
    if f_pre == 0.0 {
        return GoalSeekOutcome::Solved { static_investment: x_pre, iterations: 0 };
    }
    if f_cur == 0.0 {
        return GoalSeekOutcome::Solved { static_investment: x_cur, iterations: 0 };
    }

    let (mut x_blk, mut f_blk) = (0.0, 0.0);
    let (mut s_pre, mut s_cur) = (0.0_f64, 0.0_f64);

    for iteration in 1..=MAX_ITERATIONS {
        if f_pre != 0.0 && f_cur != 0.0 && (f_pre.is_sign_negative() != f_cur.is_sign_negative()) {
            x_blk = x_pre;
            f_blk = f_pre;
            s_cur = x_cur - x_pre;
            s_pre = s_cur;
        }
        if f_blk.abs() < f_cur.abs() {
            x_pre = x_cur;
            x_cur = x_blk;
            x_blk = x_pre;

            f_pre = f_cur;
            f_cur = f_blk;
            f_blk = f_pre;
        }

        let delta = (X_TOLERANCE + R_TOLERANCE * x_cur.abs()) / 2.0;
        let s_bis = (x_blk - x_cur) / 2.0;
        if f_cur == 0.0 || s_bis.abs() < delta {
            return GoalSeekOutcome::Solved { static_investment: x_cur, iterations: iteration };
        }

        if s_pre.abs() > delta && f_cur.abs() < f_pre.abs() {
            let s_try = if x_pre == x_blk {
                // secant
                -f_cur * (x_cur - x_pre) / (f_cur - f_pre)
            } else {
                // inverse quadratic
                let d_pre = (f_pre - f_cur) / (x_pre - x_cur);
                let d_blk = (f_blk - f_cur) / (x_blk - x_cur);
                -f_cur * (f_blk * d_blk - f_pre * d_pre) / (d_blk * d_pre * (f_blk - f_pre))
            };
            if 2.0 * s_try.abs() < s_pre.abs().min(3.0 * s_bis.abs() - delta) {
                s_pre = s_cur;
                s_cur = s_try;
            } else {
                s_pre = s_bis;
                s_cur = s_bis;
            }
        } else {
            s_pre = s_bis;
            s_cur = s_bis;
        }

        x_pre = x_cur;
        f_pre = f_cur;
        x_cur += if s_cur.abs() > delta { s_cur } else if s_bis > 0.0 { delta } else { -delta };

        f_cur = match f(x_cur) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };
        trace!("brent iteration {iteration}: x = {x_cur:.6}, residual = {f_cur:.3e}");
    }

    GoalSeekOutcome::NotConverged {
        best_estimate: x_cur,
        iterations: MAX_ITERATIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn reference_params() -> ProjectParameters {
        ProjectParameters::full_grid(100.0, 40000.0, 1500.0, 0.04876, 0.20, 0.40)
            .and_then(|p| p.with_deductible_tax(4000.0))
            .unwrap()
    }

    fn pre_tax_irr(params: ProjectParameters) -> f64 {
        CashFlowEngine::evaluate(params, EconomicAssumptions::default_regime())
            .unwrap()
            .metrics
            .pre_tax_irr_pct
            .unwrap()
    }

    #[test]
    fn test_brent_on_polynomial() {
        let outcome = brent(|x| Ok(x * x * x - 2.0 * x - 5.0), 2.0, 3.0);
        let root = outcome.static_investment().unwrap();
        assert_abs_diff_eq!(root, 2.0945514815, epsilon = 1e-6);
    }

    #[test]
    fn test_solve_reproduces_target() {
        let seeker = GoalSeeker::new();
        let params = reference_params();
        let x = seeker.solve(8.0, &params, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND).unwrap();

        assert_abs_diff_eq!(x, 51587.79, epsilon = 0.05);
        let irr = pre_tax_irr(params.with_static_investment(x).unwrap());
        assert_abs_diff_eq!(irr, 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_solve_with_estimated_deduction() {
        let params = ProjectParameters::full_grid(100.0, 40000.0, 1500.0, 0.04876, 0.20, 0.40).unwrap();
        let x = GoalSeeker::new()
            .solve(8.0, &params, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND)
            .unwrap();
        assert_abs_diff_eq!(x, 51690.78, epsilon = 0.05);
        assert_abs_diff_eq!(pre_tax_irr(params.with_static_investment(x).unwrap()), 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_lower_target_allows_more_investment() {
        let seeker = GoalSeeker::new();
        let params = reference_params();
        let at_8 = seeker.solve(8.0, &params, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND).unwrap();
        let at_6 = seeker.solve(6.0, &params, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND).unwrap();
        assert!(at_6 > at_8);
    }

    #[test]
    fn test_unreachable_target() {
        let outcome = GoalSeeker::new().solve_detailed(200.0, &reference_params(), DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND);
        match outcome {
            GoalSeekOutcome::NoSignChange { lower_residual, upper_residual } => {
                assert!(lower_residual < 0.0 && upper_residual < 0.0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_invalid_bracket() {
        let seeker = GoalSeeker::new();
        let params = reference_params();
        assert!(seeker.solve(8.0, &params, 100_000.0, 10_000.0).is_none());
        assert!(matches!(
            seeker.solve_detailed(8.0, &params, 0.0, 10_000.0),
            GoalSeekOutcome::InvalidBracket { .. }
        ));
        assert!(matches!(
            seeker.solve_detailed(f64::NAN, &params, 10_000.0, 20_000.0),
            GoalSeekOutcome::InvalidBracket { .. }
        ));
    }

    #[test]
    fn test_trial_failure_is_reported() {
        let outcome = brent(|x| Err(GoalSeekOutcome::TrialFailed { static_investment: x, reason: "boom".into() }), 1.0, 2.0);
        assert!(matches!(outcome, GoalSeekOutcome::TrialFailed { .. }));
        assert!(!outcome.is_solved());
    }
}
