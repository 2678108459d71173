//! Load project parameters from JSON files and portfolio CSVs

use csv::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{ProjectParameters, RawParameters};
use crate::error::{EvalError, EvalResult};

/// Column holding the project identifier in portfolio files
pub const PROJECT_ID_COLUMN: &str = "project_id";

/// One row of a portfolio file
///
/// Rows that fail validation are kept with their error so batch runs can
/// report them and carry on.
#[derive(Debug)]
pub struct PortfolioEntry {
    pub project_id: String,
    pub params: EvalResult<ProjectParameters>,
}

/// Load a single project's parameters from a JSON dictionary file
pub fn load_parameters(path: &Path) -> EvalResult<ProjectParameters> {
    let file = File::open(path)?;
    let raw: RawParameters = serde_json::from_reader(file)?;
    ProjectParameters::try_from(raw)
}

/// Load a portfolio of projects from a CSV file
pub fn load_portfolio(path: &Path) -> EvalResult<Vec<PortfolioEntry>> {
    let file = File::open(path)?;
    load_portfolio_from_reader(file)
}

/// Load a portfolio from any reader (for testing)
pub fn load_portfolio_from_reader<R: Read>(reader: R) -> EvalResult<Vec<PortfolioEntry>> {
    let mut reader = Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let id_index = headers.iter().position(|h| h == PROJECT_ID_COLUMN);

    let mut entries = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let project_id = id_index
            .and_then(|idx| record.get(idx))
            .filter(|id| !id.trim().is_empty())
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| format!("row-{}", i + 1));

        let params = record
            .deserialize::<RawParameters>(Some(&headers))
            .map_err(EvalError::from)
            .and_then(ProjectParameters::try_from);

        entries.push(PortfolioEntry { project_id, params });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::RevenueMode;

    const PORTFOLIO: &str = "\
project_id,capacity_mw,static_invest,hours,loan_rate,capital_ratio,mode,price_tax_inc,self_consumption_ratio,retail_price,feedin_price,deductible_tax
qionghai,100,40000,1500,0.04876,0.2,full_grid,0.40,,,,4000
rooftop,10,3500,1300,0.048,0.25,self_consumption,,0.85,0.90,0.42,
broken,10,3500,1300,0.048,1.5,full_grid,0.38,,,,
";

    #[test]
    fn test_load_portfolio() {
        let entries = load_portfolio_from_reader(PORTFOLIO.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        let qionghai = entries[0].params.as_ref().unwrap();
        assert_eq!(entries[0].project_id, "qionghai");
        assert_eq!(qionghai.deductible_tax(), Some(4000.0));

        let rooftop = entries[1].params.as_ref().unwrap();
        assert!(matches!(rooftop.revenue(), RevenueMode::SelfConsumption { .. }));
        assert_eq!(rooftop.deductible_tax(), None);

        assert!(entries[2].params.as_ref().unwrap_err().is_validation());
    }

    #[test]
    fn test_missing_id_column() {
        let csv = "capacity_mw,static_invest,hours,loan_rate,capital_ratio,price_tax_inc\n10,3500,1300,0.048,0.25,0.38\n";
        let entries = load_portfolio_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(entries[0].project_id, "row-1");
        assert!(entries[0].params.is_ok());
    }

    #[test]
    fn test_load_parameters_file() {
        let path = std::env::temp_dir().join(format!("pv_economics_params_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"capacity_mw": 100, "static_invest": 40000, "hours": 1500, "loan_rate": 0.04876,
                "capital_ratio": 0.2, "price_tax_inc": 0.4, "deductible_tax": 4000}"#,
        )
        .unwrap();
        let params = load_parameters(&path).unwrap();
        assert_eq!(params.capacity_mw(), 100.0);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_parameters(&path).unwrap_err(), EvalError::Json(_)));
    }

    #[test]
    fn test_shipped_demos_load() {
        let entries = load_portfolio(Path::new("demos/portfolio.csv")).unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries.iter().filter(|e| e.params.is_ok()).count(), 5);
        assert_eq!(entries[5].project_id, "missing-tariff");

        let qionghai = load_parameters(Path::new("demos/qionghai.json")).unwrap();
        assert_eq!(&qionghai, entries[0].params.as_ref().unwrap());
        assert!(load_parameters(Path::new("demos/rooftop.json")).is_ok());
    }
}
