//! CSV-based assumption loader
//!
//! Loads regime assumptions from CSV files in data/assumptions/. Every table is
//! optional; a missing file keeps the default for that table.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use super::{EconomicAssumptions, RateSchedule};
use crate::error::{EvalError, EvalResult};

/// Default path to assumptions directory
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions";

const RATES_FILE: &str = "rates.csv";
const OM_RATES_FILE: &str = "om_rates.csv";
const TAX_HOLIDAY_FILE: &str = "tax_holiday.csv";

/// Tier rows as read from disk; `None` marks the open-ended "thereafter" row
pub type TierRows = Vec<(Option<u32>, f64)>;

fn parse_number<T: std::str::FromStr>(file: &str, line: usize, raw: &str) -> EvalResult<T> {
    raw.trim().parse().map_err(|_| {
        EvalError::validation(file, format!("line {line}: cannot parse `{raw}` as a number"))
    })
}

/// Load scalar rates from rates.csv
/// Returns HashMap<name, value>
pub fn load_rates(path: &Path) -> EvalResult<Option<HashMap<String, f64>>> {
    let file_path = path.join(RATES_FILE);
    if !file_path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_reader(File::open(file_path)?);

    let mut rates = HashMap::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let name = record.get(0).unwrap_or_default().trim().to_string();
        let value: f64 = parse_number(RATES_FILE, i + 2, record.get(1).unwrap_or_default())?;
        rates.insert(name, value);
    }

    Ok(Some(rates))
}

/// Load a tier table with columns (up_to_year, value)
/// A blank up_to_year marks the value applying after the last tier
pub fn load_tiers(path: &Path, file_name: &str) -> EvalResult<Option<TierRows>> {
    let file_path = path.join(file_name);
    if !file_path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_reader(File::open(file_path)?);

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let raw_year = record.get(0).unwrap_or_default().trim();
        let year = if raw_year.is_empty() {
            None
        } else {
            Some(parse_number::<u32>(file_name, i + 2, raw_year)?)
        };
        let value: f64 = parse_number(file_name, i + 2, record.get(1).unwrap_or_default())?;
        rows.push((year, value));
    }

    Ok(Some(rows))
}

fn schedule_from_rows(file_name: &str, rows: &[(Option<u32>, f64)]) -> EvalResult<RateSchedule> {
    let mut tiers = Vec::new();
    let mut beyond = None;
    for &(year, value) in rows {
        match year {
            Some(y) if beyond.is_none() => tiers.push((y, value)),
            Some(_) => {
                return Err(EvalError::validation(file_name, "open-ended row must be the last row"));
            }
            None => beyond = Some(value),
        }
    }
    let beyond = beyond.ok_or_else(|| {
        EvalError::validation(file_name, "missing open-ended row (blank up_to_year)")
    })?;
    RateSchedule::new(&tiers, beyond)
}

/// Raw tables read from an assumptions directory
#[derive(Debug, Clone, Default)]
pub struct LoadedAssumptions {
    pub rates: Option<HashMap<String, f64>>,
    pub om_rates: Option<TierRows>,
    pub tax_holiday: Option<TierRows>,
}

impl LoadedAssumptions {
    /// Load all assumptions from the default path
    pub fn load_default() -> EvalResult<Self> {
        Self::load_from(Path::new(DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load all assumptions from a specific path
    pub fn load_from(path: &Path) -> EvalResult<Self> {
        if !path.is_dir() {
            return Err(EvalError::validation(
                "assumptions",
                format!("{} is not a directory", path.display()),
            ));
        }
        Ok(Self {
            rates: load_rates(path)?,
            om_rates: load_tiers(path, OM_RATES_FILE)?,
            tax_holiday: load_tiers(path, TAX_HOLIDAY_FILE)?,
        })
    }

    /// Overlay the loaded tables onto `base`
    pub fn into_assumptions(self, base: EconomicAssumptions) -> EvalResult<EconomicAssumptions> {
        let mut a = base;

        if let Some(rates) = &self.rates {
            for (name, &value) in rates {
                match name.as_str() {
                    "operating_years" => a.operating_years = whole_years(name, value)?,
                    "vat_rate" => a.vat_rate = value,
                    "surtax_rate" => a.surtax_rate = value,
                    "income_tax_rate" => a.income_tax_rate = value,
                    "misc_cost_ratio" => a.misc_cost_ratio = value,
                    "working_capital_per_mw" => a.working_capital_per_mw = value,
                    "residual_value_ratio" => a.residual_value_ratio = value,
                    "depreciation_years" => a.depreciation_years = whole_years(name, value)?,
                    "depreciation_residual" => a.depreciation_residual = value,
                    "benchmark_rate" => a.benchmark_rate = value,
                    other => {
                        return Err(EvalError::validation(RATES_FILE, format!("unknown rate `{other}`")));
                    }
                }
            }
        }
        if let Some(rows) = &self.om_rates {
            a.om_rates = schedule_from_rows(OM_RATES_FILE, rows)?;
        }
        if let Some(rows) = &self.tax_holiday {
            a.tax_holiday = schedule_from_rows(TAX_HOLIDAY_FILE, rows)?;
        }

        Ok(a)
    }
}

fn whole_years(name: &str, value: f64) -> EvalResult<u32> {
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(EvalError::validation(name, format!("must be a whole number of years, got {value}")));
    }
    Ok(value as u32)
}
