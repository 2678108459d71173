//! Core engine for yearly project cash-flow projections

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::ledger::{DeductibleTaxSource, Ledger, LedgerRow};
use super::metrics::{Metrics, MetricsCalculator};
use super::state::ProjectionState;
use crate::assumptions::EconomicAssumptions;
use crate::error::{ensure_finite, EvalError, EvalResult};
use crate::project::{ProjectParameters, RevenueMode};

/// kWh per MWh
const KWH_PER_MWH: f64 = 1_000.0;

/// kW per MW
const KW_PER_MW: f64 = 1_000.0;

/// Currency per reporting unit (monetary amounts are reported in 10k units)
const CURRENCY_PER_UNIT: f64 = 10_000.0;

/// Ledger and metrics of one completed evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub ledger: Ledger,
    pub metrics: Metrics,
}

/// Main cash-flow engine for a single project
pub struct CashFlowEngine {
    params: ProjectParameters,
    assumptions: EconomicAssumptions,
    ledger: Option<Ledger>,
}

impl CashFlowEngine {
    /// Create a new engine with the given parameters and assumptions
    pub fn new(params: ProjectParameters, assumptions: EconomicAssumptions) -> EvalResult<Self> {
        assumptions.validate()?;
        Ok(Self { params, assumptions, ledger: None })
    }

    /// Engine under the default regime
    pub fn with_default_assumptions(params: ProjectParameters) -> Self {
        Self {
            params,
            assumptions: EconomicAssumptions::default_regime(),
            ledger: None,
        }
    }

    /// Build the ledger and compute metrics in one call
    pub fn evaluate(params: ProjectParameters, assumptions: EconomicAssumptions) -> EvalResult<Evaluation> {
        let engine = Self::new(params, assumptions)?;
        let ledger = engine.project()?;
        let metrics = MetricsCalculator::compute(&ledger)?;
        Ok(Evaluation { ledger, metrics })
    }

    pub fn params(&self) -> &ProjectParameters {
        &self.params
    }

    pub fn assumptions(&self) -> &EconomicAssumptions {
        &self.assumptions
    }

    /// Interest during construction, assuming loan funds are drawn evenly through the year
    pub fn construction_interest(&self) -> f64 {
        (self.params.loan_principal() / 2.0) * self.params.loan_rate()
    }

    pub fn working_capital(&self) -> f64 {
        self.params.capacity_mw() * self.assumptions.working_capital_per_mw
    }

    /// Initial deduction pool, estimated from static investment when not supplied
    pub fn deductible_tax(&self) -> (f64, DeductibleTaxSource) {
        match self.params.deductible_tax() {
            Some(tax) => (tax, DeductibleTaxSource::Explicit),
            None => {
                let vat = self.assumptions.vat_rate;
                (self.params.static_investment() / (1.0 + vat) * vat, DeductibleTaxSource::Estimated)
            }
        }
    }

    /// Build and keep the ledger; rebuilding yields an identical ledger
    pub fn build_ledger(&mut self) -> EvalResult<&Ledger> {
        let ledger = self.project()?;
        Ok(&*self.ledger.insert(ledger))
    }

    /// The ledger from the last `build_ledger` call
    pub fn ledger(&self) -> EvalResult<&Ledger> {
        self.ledger.as_ref().ok_or(EvalError::LedgerNotBuilt)
    }

    /// Metrics of the built ledger
    pub fn metrics(&self) -> EvalResult<Metrics> {
        MetricsCalculator::compute(self.ledger()?)
    }

    /// Run the projection without storing the result
    pub fn project(&self) -> EvalResult<Ledger> {
        let construction_interest = self.construction_interest();
        let working_capital = self.working_capital();
        let (deductible_tax, source) = self.deductible_tax();

        if source == DeductibleTaxSource::Estimated {
            info!(
                "deductible_tax not supplied; estimated {:.2} from static investment at VAT {:.0}%",
                deductible_tax,
                self.assumptions.vat_rate * 100.0
            );
        }

        let depreciable_base = self.params.static_investment() + construction_interest - deductible_tax;

        let context = || "construction financing".to_string();
        ensure_finite(context, "construction_interest", construction_interest)?;
        ensure_finite(context, "depreciable_base", depreciable_base)?;

        let mut ledger = Ledger::new(
            self.params.static_investment(),
            self.params.loan_principal(),
            construction_interest,
            working_capital,
            deductible_tax,
            source,
            depreciable_base,
        );
        let mut state = ProjectionState::new(deductible_tax);

        ledger.add_row(self.construction_period(&state, working_capital));

        for _year in 1..=self.assumptions.operating_years {
            state.advance_period();

            let row = self.calculate_year(&mut state, depreciable_base, working_capital);
            row.check_finite()?;
            ledger.add_row(row);
        }

        debug!(
            "ledger built: {} periods, total investment {:.2}, final pool {:.2}",
            ledger.rows.len(),
            ledger.total_investment,
            state.pool.remaining()
        );

        Ok(ledger)
    }

    /// Construction year: investment and working capital go out, nothing comes in.
    /// Construction interest is a financing flow and stays out of the project cash flow.
    fn construction_period(&self, state: &ProjectionState, working_capital: f64) -> LedgerRow {
        let mut row = LedgerRow::new(state.period);
        let outflow = self.params.static_investment() + working_capital;

        row.deduction_remaining = state.pool.remaining();
        row.investment_outflow = outflow;
        row.cash_outflow = outflow;
        row.net_cash_flow_pre_tax = -outflow;
        row.net_cash_flow_post_tax = -outflow;
        row
    }

    /// Calculate one operating year
    fn calculate_year(&self, state: &mut ProjectionState, depreciable_base: f64, working_capital: f64) -> LedgerRow {
        let mut row = LedgerRow::new(state.period);
        let year = state.operating_year;

        self.calculate_revenue(&mut row);
        self.calculate_operating_cost(year, &mut row);

        // VAT: output tax is offset by the deduction pool until it runs dry
        let (used, payable) = state.pool.offset(row.output_vat);
        row.deduction_used = used;
        row.deduction_remaining = state.pool.remaining();
        row.vat_payable = payable;
        row.surtax = payable * self.assumptions.surtax_rate;

        row.depreciation = self.depreciation(year, depreciable_base);

        // Income tax on an EBIT basis: no interest deduction
        row.taxable_profit = row.revenue_net - row.operating_cost - row.surtax - row.depreciation;
        row.income_tax_rate = self.assumptions.income_tax_rate_for(year);
        row.income_tax = (row.taxable_profit * row.income_tax_rate).max(0.0);

        if state.is_final(self.assumptions.operating_years) {
            row.residual_recovery = self.params.static_investment() * self.assumptions.residual_value_ratio;
            row.working_capital_recovery = working_capital;
        }

        row.cash_inflow = row.revenue_net + row.residual_recovery + row.working_capital_recovery;
        row.cash_outflow = row.operating_cost + row.surtax;
        row.net_cash_flow_pre_tax = row.cash_inflow - row.cash_outflow;
        row.net_cash_flow_post_tax = row.net_cash_flow_pre_tax - row.income_tax;

        row
    }

    /// Generation and revenue split by revenue mode
    fn calculate_revenue(&self, row: &mut LedgerRow) {
        let vat = self.assumptions.vat_rate;
        let generation = self.params.capacity_mw() * self.params.utilization_hours();
        row.generation_mwh = generation;

        match *self.params.revenue() {
            RevenueMode::FullGrid { tariff_price } => {
                let gross = to_currency(generation, tariff_price);
                let net = gross / (1.0 + vat);
                row.surplus_mwh = generation;
                row.revenue_gross = gross;
                row.revenue_net = net;
                row.output_vat = gross - net;
            }
            RevenueMode::SelfConsumption { self_consumption_ratio, retail_price, feed_in_price } => {
                // Self-used energy displaces retail purchases: counted net of tax,
                // generates no output VAT
                let self_used = generation * self_consumption_ratio;
                let self_gross = to_currency(self_used, retail_price);
                let self_net = self_gross / (1.0 + vat);

                let surplus = generation - self_used;
                let surplus_gross = to_currency(surplus, feed_in_price);
                let surplus_net = surplus_gross / (1.0 + vat);

                row.self_used_mwh = self_used;
                row.surplus_mwh = surplus;
                row.revenue_gross = self_net + surplus_gross;
                row.revenue_net = self_net + surplus_net;
                row.output_vat = surplus_gross - surplus_net;
            }
        }
    }

    /// Tiered O&M plus miscellaneous overhead
    fn calculate_operating_cost(&self, year: u32, row: &mut LedgerRow) {
        let om_rate = self.assumptions.om_rates.get(year);
        row.om_cost = self.params.capacity_mw() * KW_PER_MW * om_rate / CURRENCY_PER_UNIT;
        row.misc_cost = self.params.static_investment() * self.assumptions.misc_cost_ratio;
        row.operating_cost = row.om_cost + row.misc_cost;
    }

    /// Straight-line depreciation, zero past the depreciation horizon
    fn depreciation(&self, year: u32, depreciable_base: f64) -> f64 {
        let a = &self.assumptions;
        if year > a.depreciation_years {
            return 0.0;
        }
        depreciable_base * (1.0 - a.depreciation_residual) / a.depreciation_years as f64
    }
}

/// MWh at a per-kWh price, in reporting units
fn to_currency(energy_mwh: f64, price_per_kwh: f64) -> f64 {
    energy_mwh * KWH_PER_MWH * price_per_kwh / CURRENCY_PER_UNIT
}
