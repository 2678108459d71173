//! Project parameter records
//!
//! [`RawParameters`] is the flat dictionary form used in JSON parameter files
//! and portfolio CSVs. [`ProjectParameters`] is the validated form the engine
//! consumes; it can only be obtained through exhaustive validation.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

pub const MODE_FULL_GRID: &str = "full_grid";
pub const MODE_SELF_CONSUMPTION: &str = "self_consumption";

/// How generated energy is monetized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RevenueMode {
    /// All energy exported at a single tax-inclusive tariff (currency/kWh)
    FullGrid { tariff_price: f64 },
    /// Part of the energy displaces retail purchases, the surplus is fed in
    SelfConsumption {
        /// Share of generation consumed on site, in [0, 1]
        self_consumption_ratio: f64,
        /// Retail price avoided for self-used energy (currency/kWh)
        retail_price: f64,
        /// Feed-in tariff for surplus energy (currency/kWh)
        feed_in_price: f64,
    },
}

impl RevenueMode {
    pub fn name(&self) -> &'static str {
        match self {
            RevenueMode::FullGrid { .. } => MODE_FULL_GRID,
            RevenueMode::SelfConsumption { .. } => MODE_SELF_CONSUMPTION,
        }
    }

    fn validate(&self) -> EvalResult<()> {
        match *self {
            RevenueMode::FullGrid { tariff_price } => non_negative("price_tax_inc", tariff_price),
            RevenueMode::SelfConsumption { self_consumption_ratio, retail_price, feed_in_price } => {
                if !(0.0..=1.0).contains(&self_consumption_ratio) {
                    return Err(EvalError::validation(
                        "self_consumption_ratio",
                        format!("must be within [0, 1], got {self_consumption_ratio}"),
                    ));
                }
                non_negative("retail_price", retail_price)?;
                non_negative("feedin_price", feed_in_price)
            }
        }
    }
}

/// Validated inputs for one project evaluation
///
/// Monetary amounts are in units of 10k currency, capacity in MW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameters", into = "RawParameters")]
pub struct ProjectParameters {
    capacity_mw: f64,
    static_investment: f64,
    utilization_hours: f64,
    loan_rate: f64,
    capital_ratio: f64,
    revenue: RevenueMode,
    deductible_tax: Option<f64>,
}

impl ProjectParameters {
    /// Validate and build a parameter record
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capacity_mw: f64,
        static_investment: f64,
        utilization_hours: f64,
        loan_rate: f64,
        capital_ratio: f64,
        revenue: RevenueMode,
        deductible_tax: Option<f64>,
    ) -> EvalResult<Self> {
        positive("capacity_mw", capacity_mw)?;
        positive("static_invest", static_investment)?;
        positive("hours", utilization_hours)?;
        non_negative("loan_rate", loan_rate)?;
        if !(capital_ratio > 0.0 && capital_ratio <= 1.0) {
            return Err(EvalError::validation(
                "capital_ratio",
                format!("must be within (0, 1], got {capital_ratio}"),
            ));
        }
        revenue.validate()?;
        if let Some(tax) = deductible_tax {
            non_negative("deductible_tax", tax)?;
        }

        Ok(Self {
            capacity_mw,
            static_investment,
            utilization_hours,
            loan_rate,
            capital_ratio,
            revenue,
            deductible_tax,
        })
    }

    /// Full-grid project without a pinned deductible tax amount
    pub fn full_grid(
        capacity_mw: f64,
        static_investment: f64,
        utilization_hours: f64,
        loan_rate: f64,
        capital_ratio: f64,
        tariff_price: f64,
    ) -> EvalResult<Self> {
        Self::new(
            capacity_mw,
            static_investment,
            utilization_hours,
            loan_rate,
            capital_ratio,
            RevenueMode::FullGrid { tariff_price },
            None,
        )
    }

    /// Pin the deductible input tax instead of estimating it from investment
    pub fn with_deductible_tax(self, deductible_tax: f64) -> EvalResult<Self> {
        non_negative("deductible_tax", deductible_tax)?;
        Ok(Self { deductible_tax: Some(deductible_tax), ..self })
    }

    /// Replace static investment, keeping every other field
    pub fn with_static_investment(self, static_investment: f64) -> EvalResult<Self> {
        positive("static_invest", static_investment)?;
        Ok(Self { static_investment, ..self })
    }

    pub fn capacity_mw(&self) -> f64 {
        self.capacity_mw
    }

    pub fn static_investment(&self) -> f64 {
        self.static_investment
    }

    pub fn utilization_hours(&self) -> f64 {
        self.utilization_hours
    }

    pub fn loan_rate(&self) -> f64 {
        self.loan_rate
    }

    pub fn capital_ratio(&self) -> f64 {
        self.capital_ratio
    }

    pub fn revenue(&self) -> &RevenueMode {
        &self.revenue
    }

    /// Explicit deductible input tax, if pinned
    pub fn deductible_tax(&self) -> Option<f64> {
        self.deductible_tax
    }

    /// Debt-financed share of static investment
    pub fn loan_principal(&self) -> f64 {
        self.static_investment * (1.0 - self.capital_ratio)
    }

    /// Flat dictionary form, for perturbation and serialization
    pub fn to_raw(&self) -> RawParameters {
        RawParameters::from(self.clone())
    }
}

/// Flat parameter dictionary as it appears in input files
///
/// Keys follow the established input format (`static_invest`, `hours`,
/// `price_tax_inc`, `feedin_price`). Which keys are required depends on `mode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_mw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_invest: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_ratio: Option<f64>,
    /// `full_grid` (default) or `self_consumption`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tax_inc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_consumption_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retail_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedin_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deductible_tax: Option<f64>,
}

fn required(field: &str, value: Option<f64>) -> EvalResult<f64> {
    value.ok_or_else(|| EvalError::validation(field, "required parameter is missing"))
}

fn positive(field: &str, value: f64) -> EvalResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(EvalError::validation(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &str, value: f64) -> EvalResult<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(EvalError::validation(field, format!("must be non-negative, got {value}")))
    }
}

impl TryFrom<RawParameters> for ProjectParameters {
    type Error = EvalError;

    fn try_from(raw: RawParameters) -> Result<Self, Self::Error> {
        let revenue = match raw.mode.as_deref().unwrap_or(MODE_FULL_GRID) {
            MODE_FULL_GRID => RevenueMode::FullGrid {
                tariff_price: required("price_tax_inc", raw.price_tax_inc)?,
            },
            MODE_SELF_CONSUMPTION => RevenueMode::SelfConsumption {
                self_consumption_ratio: required("self_consumption_ratio", raw.self_consumption_ratio)?,
                retail_price: required("retail_price", raw.retail_price)?,
                feed_in_price: required("feedin_price", raw.feedin_price)?,
            },
            other => {
                return Err(EvalError::validation(
                    "mode",
                    format!("unknown revenue mode `{other}` (expected `{MODE_FULL_GRID}` or `{MODE_SELF_CONSUMPTION}`)"),
                ));
            }
        };

        ProjectParameters::new(
            required("capacity_mw", raw.capacity_mw)?,
            required("static_invest", raw.static_invest)?,
            required("hours", raw.hours)?,
            required("loan_rate", raw.loan_rate)?,
            required("capital_ratio", raw.capital_ratio)?,
            revenue,
            raw.deductible_tax,
        )
    }
}

impl From<ProjectParameters> for RawParameters {
    fn from(p: ProjectParameters) -> Self {
        let mut raw = RawParameters {
            capacity_mw: Some(p.capacity_mw),
            static_invest: Some(p.static_investment),
            hours: Some(p.utilization_hours),
            loan_rate: Some(p.loan_rate),
            capital_ratio: Some(p.capital_ratio),
            mode: Some(p.revenue.name().to_string()),
            deductible_tax: p.deductible_tax,
            ..Default::default()
        };
        match p.revenue {
            RevenueMode::FullGrid { tariff_price } => raw.price_tax_inc = Some(tariff_price),
            RevenueMode::SelfConsumption { self_consumption_ratio, retail_price, feed_in_price } => {
                raw.self_consumption_ratio = Some(self_consumption_ratio);
                raw.retail_price = Some(retail_price);
                raw.feedin_price = Some(feed_in_price);
            }
        }
        raw
    }
}
