//! PV Economics CLI
//!
//! Command-line interface for evaluating, stress-testing and goal-seeking
//! photovoltaic projects

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pv_economics::goal_seek::{DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND};
use pv_economics::project::load_parameters;
use pv_economics::projection::MetricsCalculator;
use pv_economics::report;
use pv_economics::{
    CashFlowEngine, EconomicAssumptions, GoalSeekOutcome, GoalSeeker, ProjectParameters, SensitivityFactor,
    SensitivityRunner,
};

#[derive(Parser)]
#[command(name = "pv-eval", version, about = "Lifecycle economic evaluation of photovoltaic projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory with rates.csv, om_rates.csv and tax_holiday.csv (default regime if omitted)
    #[arg(long, global = true)]
    assumptions: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the ledger and print headline metrics
    Evaluate {
        /// Project parameter file (JSON)
        #[arg(long)]
        params: PathBuf,

        /// Write the report tables into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Print metrics and ledger as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sweep one or more factors and rank them by sensitivity
    Sensitivity {
        #[arg(long)]
        params: PathBuf,

        /// Factor to sweep; repeat for several (mode defaults if omitted)
        #[arg(long = "factor")]
        factors: Vec<String>,

        /// Relative variation range (0.15 = +/-15%)
        #[arg(long, default_value_t = 0.15)]
        range: f64,

        #[arg(long, default_value_t = 5)]
        steps: usize,

        /// Write all sweep points to this CSV
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the factor ranking to this CSV
        #[arg(long)]
        ranking_output: Option<PathBuf>,
    },
    /// Find the static investment that yields a target pre-tax IRR
    GoalSeek {
        #[arg(long)]
        params: PathBuf,

        /// Target pre-tax IRR in percent
        #[arg(long)]
        target: f64,

        #[arg(long, default_value_t = DEFAULT_LOWER_BOUND)]
        lower: f64,

        #[arg(long, default_value_t = DEFAULT_UPPER_BOUND)]
        upper: f64,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let assumptions = load_assumptions(cli.assumptions.as_deref())?;

    match cli.command {
        Commands::Evaluate { params, export_dir, json } => {
            evaluate(&read_params(&params)?, assumptions, export_dir.as_deref(), json)
        }
        Commands::Sensitivity { params, factors, range, steps, output, ranking_output } => sensitivity(
            &read_params(&params)?,
            assumptions,
            &factors,
            range,
            steps,
            output.as_deref(),
            ranking_output.as_deref(),
        ),
        Commands::GoalSeek { params, target, lower, upper } => {
            goal_seek(&read_params(&params)?, assumptions, target, lower, upper)
        }
    }
}

fn load_assumptions(dir: Option<&Path>) -> Result<EconomicAssumptions> {
    match dir {
        Some(dir) => EconomicAssumptions::from_csv_path(dir)
            .with_context(|| format!("failed to load assumptions from {}", dir.display())),
        None => Ok(EconomicAssumptions::default_regime()),
    }
}

fn read_params(path: &Path) -> Result<ProjectParameters> {
    load_parameters(path).with_context(|| format!("failed to load parameters from {}", path.display()))
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"))
}

fn evaluate(params: &ProjectParameters, assumptions: EconomicAssumptions, export_dir: Option<&Path>, json: bool) -> Result<()> {
    let benchmark = assumptions.benchmark_rate;
    let eval = CashFlowEngine::evaluate(params.clone(), assumptions).context("evaluation failed")?;
    let npv = MetricsCalculator::npv(&eval.ledger, benchmark)?;

    if let Some(dir) = export_dir {
        let written = report::write_all(dir, &eval.ledger, &eval.metrics)
            .with_context(|| format!("failed to write reports to {}", dir.display()))?;
        for path in &written {
            eprintln!("wrote {}", path.display());
        }
    }

    if json {
        let value = serde_json::json!({
            "params": params,
            "metrics": eval.metrics,
            "npv": npv,
            "ledger": eval.ledger,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let m = &eval.metrics;
    println!("PV project evaluation ({}, {} MW)", params.revenue().name(), params.capacity_mw());
    println!("==========================================");
    println!("  Total investment:      {:>12.2}", m.total_investment);
    println!("  Construction interest: {:>12.2}", m.construction_interest);
    println!("  Pre-tax IRR:           {:>12}", fmt_pct(m.pre_tax_irr_pct));
    println!("  Post-tax IRR:          {:>12}", fmt_pct(m.post_tax_irr_pct));
    if m.is_recoverable() {
        println!("  Payback:               {:>12.2} years", m.payback_years);
    } else {
        println!("  Payback:               {:>12}", "never");
    }
    println!("  NPV @ {:.1}% pre-tax:   {:>12.2}", npv.rate * 100.0, npv.pre_tax);
    println!("  NPV @ {:.1}% post-tax:  {:>12.2}", npv.rate * 100.0, npv.post_tax);
    Ok(())
}

fn sensitivity(
    params: &ProjectParameters,
    assumptions: EconomicAssumptions,
    factor_names: &[String],
    range: f64,
    steps: usize,
    output: Option<&Path>,
    ranking_output: Option<&Path>,
) -> Result<()> {
    let factors = if factor_names.is_empty() {
        SensitivityFactor::defaults_for(params.revenue())
    } else {
        factor_names
            .iter()
            .map(|name| name.parse::<SensitivityFactor>())
            .collect::<Result<Vec<_>, _>>()?
    };

    let runner = SensitivityRunner::with_assumptions(assumptions);
    let ranked = runner.rank(params, &factors, range, steps)?;

    for table in &ranked {
        println!("{} (base {})", table.factor.label(), table.base_value);
        for point in &table.points {
            println!(
                "  {:>+7.1}%  {:>12.4}  pre-tax {:>8}  post-tax {:>8}",
                point.offset * 100.0,
                point.value,
                fmt_pct(point.pre_tax_irr_pct),
                fmt_pct(point.post_tax_irr_pct),
            );
        }
    }

    println!("\nRanking by sensitivity coefficient:");
    for row in report::ranking_rows(&ranked) {
        let coefficient = row.coefficient.map_or_else(|| "n/a".to_string(), |c| format!("{c:+.3}"));
        println!("  {}. {:<24} {}", row.rank, row.label, coefficient);
    }

    if let Some(path) = output {
        report::write_sweeps(path, &ranked).with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = ranking_output {
        report::write_ranking(path, &ranked).with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn goal_seek(params: &ProjectParameters, assumptions: EconomicAssumptions, target: f64, lower: f64, upper: f64) -> Result<()> {
    let seeker = GoalSeeker::with_assumptions(assumptions);

    match seeker.solve_detailed(target, params, lower, upper) {
        GoalSeekOutcome::Solved { static_investment, iterations } => {
            println!("Target pre-tax IRR:         {target:.2}%");
            println!("Maximum static investment:  {static_investment:.2} ({iterations} iterations)");
            println!("Headroom over current:      {:.2}", static_investment - params.static_investment());
            // 10k currency per MW to currency per W
            println!("Unit cost:                  {:.2} per W", static_investment / params.capacity_mw() / 100.0);
            Ok(())
        }
        other => bail!("no static investment in [{lower}, {upper}] reaches {target}%: {other:?}"),
    }
}
