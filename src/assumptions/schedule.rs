//! Tiered rate schedules keyed by operating year

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// One bucket of a tiered schedule: applies to operating years up to and including `up_to_year`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub up_to_year: u32,
    pub value: f64,
}

/// Step schedule of values by operating year (1-indexed)
///
/// Years past the last tier take the `beyond` value. Deserialized schedules
/// go through the same checks as [`RateSchedule::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSchedule")]
pub struct RateSchedule {
    tiers: Vec<Tier>,
    beyond: f64,
}

/// Wire shape of a schedule before its tiers are checked
#[derive(Deserialize)]
struct UncheckedSchedule {
    tiers: Vec<Tier>,
    beyond: f64,
}

impl TryFrom<UncheckedSchedule> for RateSchedule {
    type Error = EvalError;

    fn try_from(raw: UncheckedSchedule) -> EvalResult<Self> {
        let schedule = Self { tiers: raw.tiers, beyond: raw.beyond };
        schedule.validate()?;
        Ok(schedule)
    }
}

impl RateSchedule {
    /// Build a schedule from `(up_to_year, value)` buckets in ascending year order
    pub fn new(tiers: &[(u32, f64)], beyond: f64) -> EvalResult<Self> {
        let schedule = Self {
            tiers: tiers
                .iter()
                .map(|&(up_to_year, value)| Tier { up_to_year, value })
                .collect(),
            beyond,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Tier years strictly ascending, every value finite
    pub fn validate(&self) -> EvalResult<()> {
        for pair in self.tiers.windows(2) {
            if pair[1].up_to_year <= pair[0].up_to_year {
                return Err(EvalError::validation(
                    "rate_schedule",
                    format!(
                        "tier years must be strictly ascending ({} follows {})",
                        pair[1].up_to_year, pair[0].up_to_year
                    ),
                ));
            }
        }
        if self.tiers.iter().any(|t| !t.value.is_finite()) || !self.beyond.is_finite() {
            return Err(EvalError::validation("rate_schedule", "tier values must be finite"));
        }
        Ok(())
    }

    /// A schedule with the same value in every year
    pub fn flat(value: f64) -> Self {
        Self { tiers: Vec::new(), beyond: value }
    }

    /// Default O&M unit rates (currency per kW): 10 / 18 / 28, then 32 after year 20
    pub fn default_om_rates() -> Self {
        Self {
            tiers: vec![
                Tier { up_to_year: 5, value: 10.0 },
                Tier { up_to_year: 10, value: 18.0 },
                Tier { up_to_year: 20, value: 28.0 },
            ],
            beyond: 32.0,
        }
    }

    /// "Three years exempt, three years half rate" income tax multipliers
    pub fn default_tax_holiday() -> Self {
        Self {
            tiers: vec![
                Tier { up_to_year: 3, value: 0.0 },
                Tier { up_to_year: 6, value: 0.5 },
            ],
            beyond: 1.0,
        }
    }

    /// Value for a given operating year
    pub fn get(&self, year: u32) -> f64 {
        self.tiers
            .iter()
            .find(|t| year <= t.up_to_year)
            .map(|t| t.value)
            .unwrap_or(self.beyond)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn beyond(&self) -> f64 {
        self.beyond
    }

    /// Smallest and largest value anywhere in the schedule
    pub fn value_range(&self) -> (f64, f64) {
        self.tiers
            .iter()
            .map(|t| t.value)
            .fold((self.beyond, self.beyond), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }
}
