//! Sensitivity runner for one-factor-at-a-time sweeps
//!
//! Holds the regime assumptions once, then re-runs the engine on perturbed
//! parameter copies. Each offset is an independent evaluation, so sweeps run
//! in parallel; a failing offset becomes a missing point instead of aborting.

use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::assumptions::EconomicAssumptions;
use crate::error::{EvalError, EvalResult};
use crate::project::{ProjectParameters, RevenueMode};
use crate::projection::{CashFlowEngine, Metrics};

/// Input that a sweep can perturb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityFactor {
    StaticInvest,
    Hours,
    PriceTaxInc,
    RetailPrice,
    FeedinPrice,
    SelfConsumptionRatio,
    LoanRate,
    CapitalRatio,
}

impl SensitivityFactor {
    pub const ALL: [SensitivityFactor; 8] = [
        SensitivityFactor::StaticInvest,
        SensitivityFactor::Hours,
        SensitivityFactor::PriceTaxInc,
        SensitivityFactor::RetailPrice,
        SensitivityFactor::FeedinPrice,
        SensitivityFactor::SelfConsumptionRatio,
        SensitivityFactor::LoanRate,
        SensitivityFactor::CapitalRatio,
    ];

    /// Parameter key, as used in input files
    pub fn name(&self) -> &'static str {
        match self {
            SensitivityFactor::StaticInvest => "static_invest",
            SensitivityFactor::Hours => "hours",
            SensitivityFactor::PriceTaxInc => "price_tax_inc",
            SensitivityFactor::RetailPrice => "retail_price",
            SensitivityFactor::FeedinPrice => "feedin_price",
            SensitivityFactor::SelfConsumptionRatio => "self_consumption_ratio",
            SensitivityFactor::LoanRate => "loan_rate",
            SensitivityFactor::CapitalRatio => "capital_ratio",
        }
    }

    /// Human-readable label for reports
    pub fn label(&self) -> &'static str {
        match self {
            SensitivityFactor::StaticInvest => "Static investment",
            SensitivityFactor::Hours => "Utilization hours",
            SensitivityFactor::PriceTaxInc => "Grid tariff",
            SensitivityFactor::RetailPrice => "Retail price",
            SensitivityFactor::FeedinPrice => "Feed-in price",
            SensitivityFactor::SelfConsumptionRatio => "Self-consumption ratio",
            SensitivityFactor::LoanRate => "Loan rate",
            SensitivityFactor::CapitalRatio => "Capital ratio",
        }
    }

    /// The usual factors to rank for a revenue mode
    pub fn defaults_for(mode: &RevenueMode) -> Vec<SensitivityFactor> {
        match mode {
            RevenueMode::FullGrid { .. } => vec![
                SensitivityFactor::StaticInvest,
                SensitivityFactor::Hours,
                SensitivityFactor::PriceTaxInc,
            ],
            RevenueMode::SelfConsumption { .. } => vec![
                SensitivityFactor::StaticInvest,
                SensitivityFactor::Hours,
                SensitivityFactor::RetailPrice,
                SensitivityFactor::FeedinPrice,
                SensitivityFactor::SelfConsumptionRatio,
            ],
        }
    }

    /// Current value of this factor in `params`
    pub fn base_value(&self, params: &ProjectParameters) -> EvalResult<f64> {
        let raw = params.to_raw();
        let value = match self {
            SensitivityFactor::StaticInvest => raw.static_invest,
            SensitivityFactor::Hours => raw.hours,
            SensitivityFactor::PriceTaxInc => raw.price_tax_inc,
            SensitivityFactor::RetailPrice => raw.retail_price,
            SensitivityFactor::FeedinPrice => raw.feedin_price,
            SensitivityFactor::SelfConsumptionRatio => raw.self_consumption_ratio,
            SensitivityFactor::LoanRate => raw.loan_rate,
            SensitivityFactor::CapitalRatio => raw.capital_ratio,
        };
        value.ok_or_else(|| {
            EvalError::validation(
                self.name(),
                format!("not applicable to a `{}` project", params.revenue().name()),
            )
        })
    }

    /// Copy of `params` with this factor set to `value`, re-validated
    pub fn apply(&self, params: &ProjectParameters, value: f64) -> EvalResult<ProjectParameters> {
        self.base_value(params)?;

        let mut raw = params.to_raw();
        let slot = match self {
            SensitivityFactor::StaticInvest => &mut raw.static_invest,
            SensitivityFactor::Hours => &mut raw.hours,
            SensitivityFactor::PriceTaxInc => &mut raw.price_tax_inc,
            SensitivityFactor::RetailPrice => &mut raw.retail_price,
            SensitivityFactor::FeedinPrice => &mut raw.feedin_price,
            SensitivityFactor::SelfConsumptionRatio => &mut raw.self_consumption_ratio,
            SensitivityFactor::LoanRate => &mut raw.loan_rate,
            SensitivityFactor::CapitalRatio => &mut raw.capital_ratio,
        };
        *slot = Some(value);
        ProjectParameters::try_from(raw)
    }
}

impl FromStr for SensitivityFactor {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensitivityFactor::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| EvalError::UnknownFactor(s.to_string()))
    }
}

impl fmt::Display for SensitivityFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result at one relative offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    /// Relative change applied to the factor (0.1 = +10%)
    pub offset: f64,
    /// Perturbed factor value
    pub value: f64,
    pub pre_tax_irr_pct: Option<f64>,
    pub post_tax_irr_pct: Option<f64>,
    pub payback_years: Option<f64>,
    /// Why the run produced no result, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One factor's sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    pub factor: SensitivityFactor,
    pub base_value: f64,
    pub base_pre_tax_irr_pct: Option<f64>,
    pub points: Vec<SensitivityPoint>,
    /// (Δreturn / base return) / Δoffset over the outermost defined points
    pub coefficient: Option<f64>,
}

impl SensitivityTable {
    /// (offset, perturbed value, pre-tax return) triples
    pub fn returns(&self) -> impl Iterator<Item = (f64, f64, Option<f64>)> + '_ {
        self.points.iter().map(|p| (p.offset, p.value, p.pre_tax_irr_pct))
    }

    pub fn missing_points(&self) -> usize {
        self.points.iter().filter(|p| p.pre_tax_irr_pct.is_none()).count()
    }
}

/// `steps` evenly spaced offsets over [-range, +range], endpoints included
pub fn sweep_offsets(variation_range: f64, steps: usize) -> EvalResult<Vec<f64>> {
    if steps == 0 {
        return Err(EvalError::validation("steps", "must be at least 1"));
    }
    if !(variation_range >= 0.0 && variation_range.is_finite()) {
        return Err(EvalError::validation(
            "variation_range",
            format!("must be a non-negative fraction, got {variation_range}"),
        ));
    }
    if steps == 1 {
        return Ok(vec![0.0]);
    }

    let span = (steps - 1) as f64;
    Ok((0..steps)
        .map(|i| variation_range * (2.0 * i as f64 - span) / span)
        .collect())
}

/// Sensitivity coefficient over the outermost points with a defined return
pub fn sensitivity_coefficient(points: &[SensitivityPoint], base_return: Option<f64>) -> Option<f64> {
    let base = base_return.filter(|b| *b != 0.0)?;
    let mut defined = points
        .iter()
        .filter_map(|p| p.pre_tax_irr_pct.map(|r| (p.offset, r)));
    let (lo_offset, lo_return) = defined.next()?;
    let (hi_offset, hi_return) = defined.last()?;
    if hi_offset == lo_offset {
        return None;
    }
    Some(((hi_return - lo_return) / base) / (hi_offset - lo_offset))
}

/// Pre-loaded sensitivity runner
#[derive(Debug, Clone)]
pub struct SensitivityRunner {
    assumptions: EconomicAssumptions,
}

impl SensitivityRunner {
    /// Create runner with the default regime
    pub fn new() -> Self {
        Self {
            assumptions: EconomicAssumptions::default_regime(),
        }
    }

    /// Create runner with pre-built assumptions
    pub fn with_assumptions(assumptions: EconomicAssumptions) -> Self {
        Self { assumptions }
    }

    pub fn assumptions(&self) -> &EconomicAssumptions {
        &self.assumptions
    }

    /// Sweep the factor named `factor_name`
    pub fn run(
        &self,
        params: &ProjectParameters,
        factor_name: &str,
        variation_range: f64,
        steps: usize,
    ) -> EvalResult<SensitivityTable> {
        let factor: SensitivityFactor = factor_name.parse()?;
        self.run_factor(params, factor, variation_range, steps)
    }

    pub fn run_factor(
        &self,
        params: &ProjectParameters,
        factor: SensitivityFactor,
        variation_range: f64,
        steps: usize,
    ) -> EvalResult<SensitivityTable> {
        let offsets = sweep_offsets(variation_range, steps)?;
        let base_value = factor.base_value(params)?;
        // Without a base return the coefficient is undefined, but the points still stand
        let base_pre_tax_irr_pct = match self.evaluate(params.clone()) {
            Ok(metrics) => metrics.pre_tax_irr_pct,
            Err(e) => {
                warn!("sensitivity {factor}: base case failed, coefficient left undefined: {e}");
                None
            }
        };

        let points: Vec<SensitivityPoint> = offsets
            .par_iter()
            .map(|&offset| self.point(params, factor, base_value, offset))
            .collect();

        let coefficient = sensitivity_coefficient(&points, base_pre_tax_irr_pct);

        Ok(SensitivityTable {
            factor,
            base_value,
            base_pre_tax_irr_pct,
            points,
            coefficient,
        })
    }

    /// Sweep several factors and order them by |coefficient|, most sensitive first
    pub fn rank(
        &self,
        params: &ProjectParameters,
        factors: &[SensitivityFactor],
        variation_range: f64,
        steps: usize,
    ) -> EvalResult<Vec<SensitivityTable>> {
        let mut tables = factors
            .iter()
            .map(|&factor| self.run_factor(params, factor, variation_range, steps))
            .collect::<EvalResult<Vec<_>>>()?;

        tables.sort_by(|a, b| {
            let key = |t: &SensitivityTable| t.coefficient.map(f64::abs).unwrap_or(f64::NEG_INFINITY);
            key(b).total_cmp(&key(a))
        });
        Ok(tables)
    }

    fn evaluate(&self, params: ProjectParameters) -> EvalResult<Metrics> {
        CashFlowEngine::evaluate(params, self.assumptions.clone()).map(|e| e.metrics)
    }

    fn point(
        &self,
        params: &ProjectParameters,
        factor: SensitivityFactor,
        base_value: f64,
        offset: f64,
    ) -> SensitivityPoint {
        let value = base_value * (1.0 + offset);
        match factor.apply(params, value).and_then(|p| self.evaluate(p)) {
            Ok(metrics) => SensitivityPoint {
                offset,
                value,
                pre_tax_irr_pct: metrics.pre_tax_irr_pct,
                post_tax_irr_pct: metrics.post_tax_irr_pct,
                payback_years: Some(metrics.payback_years),
                error: None,
            },
            Err(e) => {
                warn!("sensitivity {factor} at offset {offset:+.3} (value {value}) failed: {e}");
                SensitivityPoint {
                    offset,
                    value,
                    pre_tax_irr_pct: None,
                    post_tax_irr_pct: None,
                    payback_years: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl Default for SensitivityRunner {
    fn default() -> Self {
        Self::new()
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

    fn rooftop_params() -> ProjectParameters {
        ProjectParameters::new(
            10.0,
            3500.0,
            1300.0,
            0.048,
            0.25,
            RevenueMode::SelfConsumption {
                self_consumption_ratio: 0.85,
                retail_price: 0.90,
                feed_in_price: 0.42,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_offsets() {
        let offsets = sweep_offsets(0.15, 5).unwrap();
        assert_eq!(offsets.len(), 5);
        assert_abs_diff_eq!(offsets[0], -0.15);
        assert_abs_diff_eq!(offsets[1], -0.075);
        assert_eq!(offsets[2], 0.0);
        assert_abs_diff_eq!(offsets[4], 0.15);

        assert_eq!(sweep_offsets(0.2, 1).unwrap(), vec![0.0]);
        assert!(sweep_offsets(0.2, 0).unwrap_err().is_validation());
        assert!(sweep_offsets(-0.2, 3).is_err());
    }

    #[test]
    fn test_hours_sweep_increasing() {
        let runner = SensitivityRunner::new();
        let table = runner.run(&reference_params(), "hours", 0.15, 5).unwrap();

        assert_eq!(table.points.len(), 5);
        assert_abs_diff_eq!(table.points[0].value, 1275.0, epsilon = 1e-9);
        assert_abs_diff_eq!(table.points[4].value, 1725.0, epsilon = 1e-9);

        let returns: Vec<f64> = table.returns().map(|(_, _, r)| r.unwrap()).collect();
        assert!(returns.windows(2).all(|w| w[1] > w[0]), "{returns:?}");

        // Offset 0 reproduces the base case
        assert_abs_diff_eq!(returns[2], table.base_pre_tax_irr_pct.unwrap(), epsilon = 1e-9);
        assert_abs_diff_eq!(returns[0], 9.0684, epsilon = 1e-3);
        assert_abs_diff_eq!(returns[4], 13.5884, epsilon = 1e-3);
        assert!(table.coefficient.unwrap() > 1.0);
    }

    #[test]
    fn test_investment_sweep_decreasing() {
        let runner = SensitivityRunner::new();
        let table = runner.run(&reference_params(), "static_invest", 0.1, 3).unwrap();
        let returns: Vec<f64> = table.returns().map(|(_, _, r)| r.unwrap()).collect();
        assert!(returns.windows(2).all(|w| w[1] < w[0]));
        assert!(table.coefficient.unwrap() < 0.0);
    }

    #[test]
    fn test_unknown_factor() {
        let runner = SensitivityRunner::new();
        let err = runner.run(&reference_params(), "panel_colour", 0.1, 3).unwrap_err();
        assert!(matches!(err, EvalError::UnknownFactor(ref name) if name == "panel_colour"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_factor_not_in_mode() {
        let runner = SensitivityRunner::new();
        assert!(runner.run(&reference_params(), "retail_price", 0.1, 3).unwrap_err().is_validation());
        assert!(runner.run(&rooftop_params(), "price_tax_inc", 0.1, 3).unwrap_err().is_validation());
    }

    #[test]
    fn test_invalid_perturbation_recorded_as_missing() {
        let runner = SensitivityRunner::new();
        // 0.85 * 1.3 pushes the ratio above 1
        let table = runner.run(&rooftop_params(), "self_consumption_ratio", 0.3, 3).unwrap();
        assert_eq!(table.points.len(), 3);
        assert_eq!(table.missing_points(), 1);
        assert!(table.points[2].pre_tax_irr_pct.is_none());
        assert!(table.points[2].error.as_deref().unwrap().contains("self_consumption_ratio"));
        assert!(table.points[0].pre_tax_irr_pct.is_some());
        assert!(table.coefficient.is_some());
    }

    #[test]
    fn test_failed_base_case_still_returns_table() {
        // Valid inputs whose generation overflows, so every engine run fails
        let params = ProjectParameters::full_grid(1e306, 40000.0, 1e10, 0.04876, 0.20, 0.40).unwrap();
        let runner = SensitivityRunner::new();
        let table = runner.run(&params, "static_invest", 0.1, 3).unwrap();

        assert!(table.base_pre_tax_irr_pct.is_none());
        assert!(table.coefficient.is_none());
        assert_eq!(table.points.len(), 3);
        assert_eq!(table.missing_points(), 3);
        assert!(table.points.iter().all(|p| p.error.as_deref().unwrap().contains("ledger period 1")));

        let ranked = runner.rank(&params, &[SensitivityFactor::StaticInvest], 0.1, 3).unwrap();
        assert!(ranked[0].coefficient.is_none());
    }

    #[test]
    fn test_coefficient_definition() {
        let point = |offset, r| SensitivityPoint {
            offset,
            value: 0.0,
            pre_tax_irr_pct: r,
            post_tax_irr_pct: r,
            payback_years: None,
            error: None,
        };
        let points = vec![point(-0.1, Some(9.0)), point(0.0, Some(10.0)), point(0.1, None)];
        // Outermost defined points: -0.1 and 0.0
        assert_abs_diff_eq!(sensitivity_coefficient(&points, Some(10.0)).unwrap(), 1.0, epsilon = 1e-12);
        assert!(sensitivity_coefficient(&points, None).is_none());
        assert!(sensitivity_coefficient(&points[..1], Some(10.0)).is_none());
    }

    #[test]
    fn test_rank_orders_by_magnitude() {
        let runner = SensitivityRunner::new();
        let params = rooftop_params();
        let factors = SensitivityFactor::defaults_for(params.revenue());
        let ranked = runner.rank(&params, &factors, 0.1, 3).unwrap();

        assert_eq!(ranked.len(), factors.len());
        let magnitudes: Vec<f64> = ranked.iter().map(|t| t.coefficient.unwrap().abs()).collect();
        assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]), "{magnitudes:?}");
    }

    #[test]
    fn test_factor_names_round_trip() {
        for factor in SensitivityFactor::ALL {
            assert_eq!(factor.name().parse::<SensitivityFactor>().unwrap(), factor);
        }
    }
}
