//! Ledger output structures for project cash-flow projections

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, EvalResult};

/// Where the initial deductible input tax came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductibleTaxSource {
    /// Supplied with the project parameters
    Explicit,
    /// Estimated from static investment at the VAT rate
    Estimated,
}

/// A single row of the ledger for one period
///
/// Period 1 is construction; operating years run from period 2 onwards.
/// Monetary values are in 10k currency units, energy in MWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    // Timing
    pub period: u32,
    pub operating_year: u32,

    // Generation
    pub generation_mwh: f64,
    pub self_used_mwh: f64,
    pub surplus_mwh: f64,

    // Revenue and VAT
    pub revenue_gross: f64,
    pub revenue_net: f64,
    pub output_vat: f64,
    pub deduction_used: f64,
    pub deduction_remaining: f64,
    pub vat_payable: f64,
    pub surtax: f64,

    // Costs
    pub om_cost: f64,
    pub misc_cost: f64,
    pub operating_cost: f64,
    pub depreciation: f64,

    // Profit and income tax
    pub taxable_profit: f64,
    pub income_tax_rate: f64,
    pub income_tax: f64,

    // Investment and terminal recovery
    pub investment_outflow: f64,
    pub residual_recovery: f64,
    pub working_capital_recovery: f64,

    // Cash flow
    pub cash_inflow: f64,
    pub cash_outflow: f64,
    pub net_cash_flow_pre_tax: f64,
    pub net_cash_flow_post_tax: f64,
}

impl LedgerRow {
    /// Create a new ledger row with zeroed values
    pub fn new(period: u32) -> Self {
        Self {
            period,
            operating_year: period.saturating_sub(1),
            generation_mwh: 0.0,
            self_used_mwh: 0.0,
            surplus_mwh: 0.0,
            revenue_gross: 0.0,
            revenue_net: 0.0,
            output_vat: 0.0,
            deduction_used: 0.0,
            deduction_remaining: 0.0,
            vat_payable: 0.0,
            surtax: 0.0,
            om_cost: 0.0,
            misc_cost: 0.0,
            operating_cost: 0.0,
            depreciation: 0.0,
            taxable_profit: 0.0,
            income_tax_rate: 0.0,
            income_tax: 0.0,
            investment_outflow: 0.0,
            residual_recovery: 0.0,
            working_capital_recovery: 0.0,
            cash_inflow: 0.0,
            cash_outflow: 0.0,
            net_cash_flow_pre_tax: 0.0,
            net_cash_flow_post_tax: 0.0,
        }
    }

    pub fn is_construction(&self) -> bool {
        self.operating_year == 0
    }

    /// Operating cost plus depreciation
    pub fn total_cost(&self) -> f64 {
        self.operating_cost + self.depreciation
    }

    /// Profit after income tax
    pub fn net_profit(&self) -> f64 {
        self.taxable_profit - self.income_tax
    }

    /// Fail with a computation error if any value is NaN or infinite
    pub fn check_finite(&self) -> EvalResult<()> {
        let fields = [
            ("generation_mwh", self.generation_mwh),
            ("revenue_gross", self.revenue_gross),
            ("revenue_net", self.revenue_net),
            ("output_vat", self.output_vat),
            ("deduction_remaining", self.deduction_remaining),
            ("vat_payable", self.vat_payable),
            ("surtax", self.surtax),
            ("operating_cost", self.operating_cost),
            ("depreciation", self.depreciation),
            ("taxable_profit", self.taxable_profit),
            ("income_tax", self.income_tax),
            ("net_cash_flow_pre_tax", self.net_cash_flow_pre_tax),
            ("net_cash_flow_post_tax", self.net_cash_flow_post_tax),
        ];
        for (field, value) in fields {
            ensure_finite(|| format!("ledger period {}", self.period), field, value)?;
        }
        Ok(())
    }
}

/// Complete ledger for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    /// One row per period, construction first
    pub rows: Vec<LedgerRow>,

    pub static_investment: f64,
    pub loan_principal: f64,

    /// Interest accrued during construction (financing cost, not a project cash flow)
    pub construction_interest: f64,

    pub working_capital: f64,

    /// Static investment + construction interest + working capital
    pub total_investment: f64,

    /// Initial balance of the deduction pool
    pub deductible_tax: f64,
    pub deductible_tax_source: DeductibleTaxSource,

    /// Base for straight-line depreciation
    pub depreciable_base: f64,
}

impl Ledger {
    pub fn new(
        static_investment: f64,
        loan_principal: f64,
        construction_interest: f64,
        working_capital: f64,
        deductible_tax: f64,
        deductible_tax_source: DeductibleTaxSource,
        depreciable_base: f64,
    ) -> Self {
        Self {
            rows: Vec::new(),
            static_investment,
            loan_principal,
            construction_interest,
            working_capital,
            total_investment: static_investment + construction_interest + working_capital,
            deductible_tax,
            deductible_tax_source,
            depreciable_base,
        }
    }

    /// Add a ledger row
    pub fn add_row(&mut self, row: LedgerRow) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pre-tax net cash flow per period
    pub fn pre_tax_cash_flows(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.net_cash_flow_pre_tax).collect()
    }

    /// Post-tax net cash flow per period
    pub fn post_tax_cash_flows(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.net_cash_flow_post_tax).collect()
    }

    /// Rows of the operating years only
    pub fn operating_rows(&self) -> impl Iterator<Item = &LedgerRow> {
        self.rows.iter().filter(|r| !r.is_construction())
    }

    /// Get summary statistics
    pub fn summary(&self) -> LedgerSummary {
        let ops = || self.operating_rows();

        LedgerSummary {
            total_periods: self.rows.len() as u32,
            total_generation_mwh: ops().map(|r| r.generation_mwh).sum(),
            total_revenue_gross: ops().map(|r| r.revenue_gross).sum(),
            total_revenue_net: ops().map(|r| r.revenue_net).sum(),
            total_output_vat: ops().map(|r| r.output_vat).sum(),
            total_vat_payable: ops().map(|r| r.vat_payable).sum(),
            total_surtax: ops().map(|r| r.surtax).sum(),
            total_operating_cost: ops().map(|r| r.operating_cost).sum(),
            total_depreciation: ops().map(|r| r.depreciation).sum(),
            total_income_tax: ops().map(|r| r.income_tax).sum(),
            total_net_profit: ops().map(|r| r.net_profit()).sum(),
            total_net_cf_pre_tax: self.rows.iter().map(|r| r.net_cash_flow_pre_tax).sum(),
            total_net_cf_post_tax: self.rows.iter().map(|r| r.net_cash_flow_post_tax).sum(),
            final_deduction_remaining: self.rows.last().map(|r| r.deduction_remaining).unwrap_or(0.0),
        }
    }
}

/// Summary totals over a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_periods: u32,
    pub total_generation_mwh: f64,
    pub total_revenue_gross: f64,
    pub total_revenue_net: f64,
    pub total_output_vat: f64,
    pub total_vat_payable: f64,
    pub total_surtax: f64,
    pub total_operating_cost: f64,
    pub total_depreciation: f64,
    pub total_income_tax: f64,
    pub total_net_profit: f64,
    pub total_net_cf_pre_tax: f64,
    pub total_net_cf_post_tax: f64,
    pub final_deduction_remaining: f64,
}
