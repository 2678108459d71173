//! Evaluate every project in a portfolio CSV
//!
//! Outputs one summary row per project for side-by-side comparison

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use rayon::prelude::*;
use serde::Serialize;

use pv_economics::project::load_portfolio;
use pv_economics::projection::MetricsCalculator;
use pv_economics::report::write_csv_path;
use pv_economics::{CashFlowEngine, EconomicAssumptions};

#[derive(Parser)]
#[command(name = "run_portfolio", about = "Evaluate a portfolio of PV projects in parallel")]
struct Args {
    /// Portfolio CSV, one project per row with a project_id column
    #[arg(long, default_value = "demos/portfolio.csv")]
    portfolio: PathBuf,

    /// Assumption directory (default regime if omitted)
    #[arg(long)]
    assumptions: Option<PathBuf>,

    #[arg(long, default_value = "portfolio_summary.csv")]
    output: PathBuf,
}

/// Summary results for one project
#[derive(Debug, Clone, Serialize)]
struct PortfolioRow {
    project_id: String,
    mode: &'static str,
    capacity_mw: f64,
    static_investment: f64,
    total_investment: f64,
    pre_tax_irr_pct: Option<f64>,
    post_tax_irr_pct: Option<f64>,
    payback_years: f64,
    npv_post_tax: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    println!("Loading projects from {}...", args.portfolio.display());

    let entries = load_portfolio(&args.portfolio)
        .with_context(|| format!("failed to load portfolio {}", args.portfolio.display()))?;
    println!("Loaded {} projects in {:?}", entries.len(), start.elapsed());

    let assumptions = match &args.assumptions {
        Some(dir) => EconomicAssumptions::from_csv_path(dir)
            .with_context(|| format!("failed to load assumptions from {}", dir.display()))?,
        None => EconomicAssumptions::default_regime(),
    };
    let benchmark = assumptions.benchmark_rate;

    println!("Running evaluations...");
    let eval_start = Instant::now();

    let results: Vec<(String, Result<PortfolioRow, String>)> = entries
        .into_par_iter()
        .map(|entry| {
            let outcome = entry.params.and_then(|params| {
                let eval = CashFlowEngine::evaluate(params.clone(), assumptions.clone())?;
                let npv = MetricsCalculator::npv(&eval.ledger, benchmark)?;
                Ok(PortfolioRow {
                    project_id: entry.project_id.clone(),
                    mode: params.revenue().name(),
                    capacity_mw: params.capacity_mw(),
                    static_investment: params.static_investment(),
                    total_investment: eval.metrics.total_investment,
                    pre_tax_irr_pct: eval.metrics.pre_tax_irr_pct,
                    post_tax_irr_pct: eval.metrics.post_tax_irr_pct,
                    payback_years: eval.metrics.payback_years,
                    npv_post_tax: npv.post_tax,
                })
            });
            (entry.project_id, outcome.map_err(|e| e.to_string()))
        })
        .collect();

    println!("Evaluations complete in {:?}", eval_start.elapsed());

    let mut rows = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (project_id, outcome) in results {
        match outcome {
            Ok(row) => rows.push(row),
            Err(reason) => {
                warn!("project {project_id} skipped: {reason}");
                eprintln!("  {project_id}: {reason}");
                failed += 1;
            }
        }
    }

    write_csv_path(&args.output, &rows).with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("Output written to {}", args.output.display());

    println!("\nPortfolio Summary:");
    println!("  Evaluated: {}", rows.len());
    println!("  Failed:    {}", failed);
    let capacity: f64 = rows.iter().map(|r| r.capacity_mw).sum();
    let investment: f64 = rows.iter().map(|r| r.total_investment).sum();
    println!("  Capacity:  {:.1} MW", capacity);
    println!("  Investment: {:.2}", investment);
    if let Some(best) = rows
        .iter()
        .filter(|r| r.pre_tax_irr_pct.is_some())
        .max_by(|a, b| a.pre_tax_irr_pct.partial_cmp(&b.pre_tax_irr_pct).unwrap_or(std::cmp::Ordering::Equal))
    {
        println!("  Best pre-tax IRR: {} ({:.2}%)", best.project_id, best.pre_tax_irr_pct.unwrap_or_default());
    }

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
