//! CSV report tables derived from a built ledger
//!
//! Every table is a pure projection of a [`Ledger`] (plus [`Metrics`] for the
//! summary); nothing here recomputes economics. Monetary columns are in 10k
//! currency units.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::EvalResult;
use crate::projection::{Ledger, Metrics};
use crate::sensitivity::SensitivityTable;

pub const REVENUE_TAX_FILE: &str = "revenue_tax.csv";
pub const TOTAL_COST_FILE: &str = "total_cost.csv";
pub const PROFIT_FILE: &str = "profit.csv";
pub const INVESTMENT_PLAN_FILE: &str = "investment_plan.csv";
pub const PROJECT_CASH_FLOW_FILE: &str = "project_cash_flow.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueTaxRow {
    pub year: u32,
    pub generation_mwh: f64,
    pub revenue_gross: f64,
    pub revenue_net: f64,
    pub output_vat: f64,
    pub deduction_used: f64,
    pub deduction_remaining: f64,
    pub vat_payable: f64,
    pub surtax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalCostRow {
    pub year: u32,
    pub om_cost: f64,
    pub misc_cost: f64,
    pub operating_cost: f64,
    pub depreciation: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitRow {
    pub year: u32,
    pub revenue_net: f64,
    pub total_cost: f64,
    pub surtax: f64,
    pub taxable_profit: f64,
    pub income_tax_rate: f64,
    pub income_tax: f64,
    pub net_profit: f64,
    pub cumulative_net_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentPlanRow {
    pub item: &'static str,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCashFlowRow {
    pub period: u32,
    pub cash_inflow: f64,
    pub revenue_net: f64,
    pub residual_recovery: f64,
    pub working_capital_recovery: f64,
    pub cash_outflow: f64,
    pub investment_outflow: f64,
    pub operating_cost: f64,
    pub surtax: f64,
    pub net_cash_flow_pre_tax: f64,
    pub cumulative_pre_tax: f64,
    pub income_tax: f64,
    pub net_cash_flow_post_tax: f64,
    pub cumulative_post_tax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub metric: &'static str,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityRow {
    pub factor: &'static str,
    pub offset_pct: f64,
    pub value: f64,
    pub pre_tax_irr_pct: Option<f64>,
    pub post_tax_irr_pct: Option<f64>,
    pub payback_years: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub rank: usize,
    pub factor: &'static str,
    pub label: &'static str,
    pub coefficient: Option<f64>,
    pub min_pre_tax_irr_pct: Option<f64>,
    pub max_pre_tax_irr_pct: Option<f64>,
}

/// Revenue, VAT and surtax per operating year
pub fn revenue_tax_table(ledger: &Ledger) -> Vec<RevenueTaxRow> {
    ledger
        .operating_rows()
        .map(|r| RevenueTaxRow {
            year: r.operating_year,
            generation_mwh: r.generation_mwh,
            revenue_gross: r.revenue_gross,
            revenue_net: r.revenue_net,
            output_vat: r.output_vat,
            deduction_used: r.deduction_used,
            deduction_remaining: r.deduction_remaining,
            vat_payable: r.vat_payable,
            surtax: r.surtax,
        })
        .collect()
}

pub fn total_cost_table(ledger: &Ledger) -> Vec<TotalCostRow> {
    ledger
        .operating_rows()
        .map(|r| TotalCostRow {
            year: r.operating_year,
            om_cost: r.om_cost,
            misc_cost: r.misc_cost,
            operating_cost: r.operating_cost,
            depreciation: r.depreciation,
            total_cost: r.total_cost(),
        })
        .collect()
}

/// Profit statement with running net profit
pub fn profit_table(ledger: &Ledger) -> Vec<ProfitRow> {
    let mut cumulative = 0.0;
    ledger
        .operating_rows()
        .map(|r| {
            cumulative += r.net_profit();
            ProfitRow {
                year: r.operating_year,
                revenue_net: r.revenue_net,
                total_cost: r.total_cost(),
                surtax: r.surtax,
                taxable_profit: r.taxable_profit,
                income_tax_rate: r.income_tax_rate,
                income_tax: r.income_tax,
                net_profit: r.net_profit(),
                cumulative_net_profit: cumulative,
            }
        })
        .collect()
}

/// Use of funds and funding sources; equity covers everything not lent
pub fn investment_plan_table(ledger: &Ledger) -> Vec<InvestmentPlanRow> {
    let row = |item, amount| InvestmentPlanRow { item, amount };
    vec![
        row("static_investment", ledger.static_investment),
        row("construction_interest", ledger.construction_interest),
        row("working_capital", ledger.working_capital),
        row("total_investment", ledger.total_investment),
        row("equity", ledger.total_investment - ledger.loan_principal),
        row("loan_principal", ledger.loan_principal),
    ]
}

/// Project investment cash flow with cumulative pre- and post-tax positions
pub fn project_cash_flow_table(ledger: &Ledger) -> Vec<ProjectCashFlowRow> {
    let mut cumulative_pre = 0.0;
    let mut cumulative_post = 0.0;
    ledger
        .rows
        .iter()
        .map(|r| {
            cumulative_pre += r.net_cash_flow_pre_tax;
            cumulative_post += r.net_cash_flow_post_tax;
            ProjectCashFlowRow {
                period: r.period,
                cash_inflow: r.cash_inflow,
                revenue_net: r.revenue_net,
                residual_recovery: r.residual_recovery,
                working_capital_recovery: r.working_capital_recovery,
                cash_outflow: r.cash_outflow,
                investment_outflow: r.investment_outflow,
                operating_cost: r.operating_cost,
                surtax: r.surtax,
                net_cash_flow_pre_tax: r.net_cash_flow_pre_tax,
                cumulative_pre_tax: cumulative_pre,
                income_tax: r.income_tax,
                net_cash_flow_post_tax: r.net_cash_flow_post_tax,
                cumulative_post_tax: cumulative_post,
            }
        })
        .collect()
}

pub fn summary_table(ledger: &Ledger, metrics: &Metrics) -> Vec<SummaryRow> {
    let totals = ledger.summary();
    let row = |metric, value| SummaryRow { metric, value };
    vec![
        row("total_investment", Some(metrics.total_investment)),
        row("construction_interest", Some(metrics.construction_interest)),
        row("deductible_tax", Some(ledger.deductible_tax)),
        row("pre_tax_irr_pct", metrics.pre_tax_irr_pct),
        row("post_tax_irr_pct", metrics.post_tax_irr_pct),
        row("payback_years", Some(metrics.payback_years)),
        row("total_generation_mwh", Some(totals.total_generation_mwh)),
        row("total_revenue_gross", Some(totals.total_revenue_gross)),
        row("total_vat_payable", Some(totals.total_vat_payable)),
        row("total_income_tax", Some(totals.total_income_tax)),
        row("total_net_profit", Some(totals.total_net_profit)),
    ]
}

pub fn sensitivity_rows(table: &SensitivityTable) -> Vec<SensitivityRow> {
    table
        .points
        .iter()
        .map(|p| SensitivityRow {
            factor: table.factor.name(),
            offset_pct: p.offset * 100.0,
            value: p.value,
            pre_tax_irr_pct: p.pre_tax_irr_pct,
            post_tax_irr_pct: p.post_tax_irr_pct,
            payback_years: p.payback_years,
        })
        .collect()
}

/// Ranking rows for tables already ordered by the runner
pub fn ranking_rows(tables: &[SensitivityTable]) -> Vec<RankingRow> {
    tables
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let returns = || t.points.iter().filter_map(|p| p.pre_tax_irr_pct);
            RankingRow {
                rank: i + 1,
                factor: t.factor.name(),
                label: t.factor.label(),
                coefficient: t.coefficient,
                min_pre_tax_irr_pct: returns().reduce(f64::min),
                max_pre_tax_irr_pct: returns().reduce(f64::max),
            }
        })
        .collect()
}

/// Serialize rows with a header line
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> EvalResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_path<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> EvalResult<()> {
    let file = fs::File::create(path.as_ref())?;
    write_csv(file, rows)
}

/// Every sweep point of every table, one CSV row each
pub fn write_sweeps(path: impl AsRef<Path>, tables: &[SensitivityTable]) -> EvalResult<()> {
    let rows: Vec<SensitivityRow> = tables.iter().flat_map(sensitivity_rows).collect();
    write_csv_path(path.as_ref(), &rows)?;
    info!("wrote {} sensitivity points to {}", rows.len(), path.as_ref().display());
    Ok(())
}

/// Factor ranking for tables already ordered by the runner
pub fn write_ranking(path: impl AsRef<Path>, tables: &[SensitivityTable]) -> EvalResult<()> {
    write_csv_path(path.as_ref(), &ranking_rows(tables))?;
    info!("wrote ranking of {} factors to {}", tables.len(), path.as_ref().display());
    Ok(())
}

/// Write every ledger-derived table into `dir`, creating it if needed
pub fn write_all(dir: impl AsRef<Path>, ledger: &Ledger, metrics: &Metrics) -> EvalResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let written: Vec<PathBuf> = [
        REVENUE_TAX_FILE,
        TOTAL_COST_FILE,
        PROFIT_FILE,
        INVESTMENT_PLAN_FILE,
        PROJECT_CASH_FLOW_FILE,
        SUMMARY_FILE,
    ]
    .iter()
    .map(|name| dir.join(name))
    .collect();

    write_csv_path(&written[0], &revenue_tax_table(ledger))?;
    write_csv_path(&written[1], &total_cost_table(ledger))?;
    write_csv_path(&written[2], &profit_table(ledger))?;
    write_csv_path(&written[3], &investment_plan_table(ledger))?;
    write_csv_path(&written[4], &project_cash_flow_table(ledger))?;
    write_csv_path(&written[5], &summary_table(ledger, metrics))?;

    info!("wrote {} report tables to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::EconomicAssumptions;
    use crate::project::ProjectParameters;
    use crate::projection::{CashFlowEngine, Evaluation};
    use crate::sensitivity::{SensitivityFactor, SensitivityRunner};
    use approx::assert_abs_diff_eq;

    fn reference() -> (ProjectParameters, Evaluation) {
        let params = ProjectParameters::full_grid(100.0, 40000.0, 1500.0, 0.04876, 0.20, 0.40)
            .and_then(|p| p.with_deductible_tax(4000.0))
            .unwrap();
        let eval = CashFlowEngine::evaluate(params.clone(), EconomicAssumptions::default_regime()).unwrap();
        (params, eval)
    }

    #[test]
    fn test_profit_table_cumulative() {
        let (_, eval) = reference();
        let table = profit_table(&eval.ledger);
        assert_eq!(table.len(), 25);
        assert_eq!(table[0].year, 1);

        let total: f64 = table.iter().map(|r| r.net_profit).sum();
        assert_abs_diff_eq!(table.last().unwrap().cumulative_net_profit, total, epsilon = 1e-6);
        assert_abs_diff_eq!(total, eval.ledger.summary().total_net_profit, epsilon = 1e-6);
    }

    #[test]
    fn test_cash_flow_table_matches_ledger() {
        let (_, eval) = reference();
        let table = project_cash_flow_table(&eval.ledger);
        assert_eq!(table.len(), eval.ledger.rows.len());
        assert_abs_diff_eq!(table[0].cumulative_post_tax, -40300.0, epsilon = 1e-9);

        let last = table.last().unwrap();
        let summary = eval.ledger.summary();
        assert_abs_diff_eq!(last.cumulative_pre_tax, summary.total_net_cf_pre_tax, epsilon = 1e-6);
        assert_abs_diff_eq!(last.cumulative_post_tax, summary.total_net_cf_post_tax, epsilon = 1e-6);
    }

    #[test]
    fn test_investment_plan_balances() {
        let (_, eval) = reference();
        let plan = investment_plan_table(&eval.ledger);
        let amount = |item: &str| plan.iter().find(|r| r.item == item).unwrap().amount;

        assert_abs_diff_eq!(amount("total_investment"), 41080.16, epsilon = 1e-6);
        assert_abs_diff_eq!(amount("loan_principal"), 32000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(amount("equity") + amount("loan_principal"), amount("total_investment"), epsilon = 1e-9);
    }

    #[test]
    fn test_write_csv_header_and_empty_option() {
        let rows = vec![
            SummaryRow { metric: "pre_tax_irr_pct", value: None },
            SummaryRow { metric: "payback_years", value: Some(8.5) },
        ];
        let mut buf = Vec::new();
        write_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "metric,value\npre_tax_irr_pct,\npayback_years,8.5\n");
    }

    #[test]
    fn test_write_all_creates_tables() {
        let (_, eval) = reference();
        let dir = std::env::temp_dir().join(format!("pv_economics_report_{}", std::process::id()));
        let written = write_all(&dir, &eval.ledger, &eval.metrics).unwrap();

        assert_eq!(written.len(), 6);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }
        let revenue = fs::read_to_string(dir.join(REVENUE_TAX_FILE)).unwrap();
        assert!(revenue.starts_with("year,generation_mwh,revenue_gross"));
        assert_eq!(revenue.lines().count(), 26);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_ranking_rows() {
        let (params, _) = reference();
        let factors = SensitivityFactor::defaults_for(params.revenue());
        let ranked = SensitivityRunner::new().rank(&params, &factors, 0.15, 5).unwrap();
        let rows = ranking_rows(&ranked);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].rank, 1);
        for row in &rows {
            assert!(row.min_pre_tax_irr_pct.unwrap() < row.max_pre_tax_irr_pct.unwrap());
        }

        let sweep = sensitivity_rows(&ranked[0]);
        assert_eq!(sweep.len(), 5);
        assert_abs_diff_eq!(sweep[0].offset_pct, -15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_write_sensitivity_files() {
        let (params, _) = reference();
        let factors = SensitivityFactor::defaults_for(params.revenue());
        let ranked = SensitivityRunner::new().rank(&params, &factors, 0.15, 5).unwrap();

        let dir = std::env::temp_dir().join(format!("pv_economics_sensitivity_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let sweep_path = dir.join("sweep.csv");
        let ranking_path = dir.join("ranking.csv");
        write_sweeps(&sweep_path, &ranked).unwrap();
        write_ranking(&ranking_path, &ranked).unwrap();

        let ranking = fs::read_to_string(&ranking_path).unwrap();
        let lines: Vec<&str> = ranking.lines().collect();
        assert_eq!(lines[0], "rank,factor,label,coefficient,min_pre_tax_irr_pct,max_pre_tax_irr_pct");
        assert_eq!(lines.len(), 1 + factors.len());
        assert!(lines[1].starts_with(&format!("1,{},", ranked[0].factor.name())));

        let sweep = fs::read_to_string(&sweep_path).unwrap();
        assert_eq!(sweep.lines().count(), 1 + 5 * factors.len());

        fs::remove_dir_all(&dir).ok();
    }
}
