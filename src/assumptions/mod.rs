//! Economic and regulatory assumptions shared by every engine run
//!
//! An [`EconomicAssumptions`] value is immutable once built and captured by
//! each engine, so engines under different tax regimes can run side by side.

mod schedule;
pub mod loader;

pub use schedule::{RateSchedule, Tier};
pub use loader::LoadedAssumptions;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EvalError, EvalResult};

/// Regulatory regime and cost assumptions for a project evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicAssumptions {
    /// Length of the operating horizon in years (construction is one extra period)
    pub operating_years: u32,

    /// Value-added tax rate on electricity sales and on equipment purchases
    pub vat_rate: f64,

    /// Surtax levied on VAT payable (urban construction, education levies)
    pub surtax_rate: f64,

    /// Statutory corporate income tax rate
    pub income_tax_rate: f64,

    /// Multiplier on the income tax rate by operating year
    pub tax_holiday: RateSchedule,

    /// O&M unit cost by operating year, currency per kW
    pub om_rates: RateSchedule,

    /// Miscellaneous yearly overhead as a fraction of static investment
    pub misc_cost_ratio: f64,

    /// Working capital per MW of capacity, 10k currency units
    pub working_capital_per_mw: f64,

    /// Salvage value recovered at the end of operation, fraction of static investment
    pub residual_value_ratio: f64,

    /// Straight-line depreciation horizon in years
    pub depreciation_years: u32,

    /// Residual fraction excluded from the depreciable base
    pub depreciation_residual: f64,

    /// Benchmark rate for NPV reporting
    pub benchmark_rate: f64,
}

impl Default for EconomicAssumptions {
    fn default() -> Self {
        Self::default_regime()
    }
}

impl EconomicAssumptions {
    /// Defaults for a utility-scale PV project under the standard national regime
    pub fn default_regime() -> Self {
        Self {
            operating_years: 25,
            vat_rate: 0.13,
            surtax_rate: 0.10,
            income_tax_rate: 0.25,
            tax_holiday: RateSchedule::default_tax_holiday(),
            om_rates: RateSchedule::default_om_rates(),
            misc_cost_ratio: 0.005,
            working_capital_per_mw: 3.0,
            residual_value_ratio: 0.05,
            depreciation_years: 20,
            depreciation_residual: 0.05,
            benchmark_rate: 0.08,
        }
    }

    /// Load assumptions from CSV files in the default location (data/assumptions/)
    pub fn from_csv() -> EvalResult<Self> {
        Self::from_csv_path(Path::new(loader::DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load assumptions from CSV files in a specific directory
    ///
    /// Tables missing from the directory keep their default values.
    pub fn from_csv_path(path: &Path) -> EvalResult<Self> {
        let loaded = LoadedAssumptions::load_from(path)?;
        let assumptions = loaded.into_assumptions(Self::default_regime())?;
        assumptions.validate()?;
        Ok(assumptions)
    }

    /// Check ranges that the engine relies on
    pub fn validate(&self) -> EvalResult<()> {
        if self.operating_years == 0 {
            return Err(EvalError::validation("operating_years", "must be at least 1"));
        }
        if self.depreciation_years == 0 {
            return Err(EvalError::validation("depreciation_years", "must be at least 1"));
        }

        let fractions = [
            ("vat_rate", self.vat_rate),
            ("surtax_rate", self.surtax_rate),
            ("income_tax_rate", self.income_tax_rate),
            ("misc_cost_ratio", self.misc_cost_ratio),
            ("residual_value_ratio", self.residual_value_ratio),
            ("depreciation_residual", self.depreciation_residual),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(EvalError::validation(field, format!("must be within [0, 1], got {value}")));
            }
        }

        if !(self.working_capital_per_mw >= 0.0 && self.working_capital_per_mw.is_finite()) {
            return Err(EvalError::validation("working_capital_per_mw", "must be non-negative"));
        }
        if !(self.benchmark_rate > -1.0 && self.benchmark_rate.is_finite()) {
            return Err(EvalError::validation("benchmark_rate", "must be greater than -100%"));
        }

        self.tax_holiday.validate()?;
        self.om_rates.validate()?;
        let (lo, hi) = self.tax_holiday.value_range();
        if lo < 0.0 || hi > 1.0 {
            return Err(EvalError::validation("tax_holiday", "multipliers must be within [0, 1]"));
        }
        if self.om_rates.value_range().0 < 0.0 {
            return Err(EvalError::validation("om_rates", "rates must be non-negative"));
        }

        Ok(())
    }

    /// Effective income tax rate for an operating year, holiday applied
    pub fn income_tax_rate_for(&self, operating_year: u32) -> f64 {
        self.income_tax_rate * self.tax_holiday.get(operating_year)
    }
}
