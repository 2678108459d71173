//! Internal Rate of Return (IRR) calculation
//!
//! Used for the pre-tax and post-tax project returns and by goal-seek.
//! Newton iterations from a 10% guess settle the usual invest-then-earn
//! profile. When Newton leaves the search interval or stalls, a scan over a
//! fixed rate grid brackets a sign change of NPV and bisects it. Either way a
//! rate is only reported after its NPV residual has been checked.

/// Lowest rate searched; discounting is undefined at -100%
const MIN_RATE: f64 = -0.99;
/// Highest rate searched (1000% a year)
const MAX_RATE: f64 = 10.0;
const INITIAL_GUESS: f64 = 0.10;
const MAX_NEWTON_STEPS: usize = 50;
const MAX_BISECTIONS: usize = 200;
/// Newton stops once a step moves the rate by less than this
const STEP_TOLERANCE: f64 = 1e-12;
/// Bisection stops once the bracket is narrower than this
const BRACKET_WIDTH: f64 = 1e-15;
/// Accepted |NPV| relative to the summed magnitude of the discounted flows
const RESIDUAL_TOLERANCE: f64 = 1e-9;

/// Rates sampled when looking for a sign change, ascending, both ends included
const RATE_GRID: &[f64] = &[
    MIN_RATE, -0.95, -0.9, -0.8, -0.7, -0.6, -0.5, -0.4, -0.3, -0.2, -0.15, -0.1, -0.05, 0.0, 0.05, 0.1,
    0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0, MAX_RATE,
];

/// Calculate the Internal Rate of Return (IRR) for a series of yearly cash flows
///
/// # Arguments
/// * `cashflows` - Cash flows (positive = inflow, negative = outflow), one per year
///
/// # Returns
/// * `Option<f64>` - Annual IRR as a decimal (e.g., 0.05 for 5%). None when the
///   flows never change sign or no rate in (-99%, 1000%) zeroes the NPV.
pub fn calculate_irr(cashflows: &[f64]) -> Option<f64> {
    if cashflows.iter().any(|cf| !cf.is_finite()) {
        return None;
    }
    let has_inflow = cashflows.iter().any(|&cf| cf > 0.0);
    let has_outflow = cashflows.iter().any(|&cf| cf < 0.0);
    if !(has_inflow && has_outflow) {
        return None;
    }

    newton(cashflows).or_else(|| bracket_and_bisect(cashflows))
}

/// Net present value at an annual rate, first cash flow undiscounted
pub fn npv(cashflows: &[f64], rate: f64) -> f64 {
    Discounted::at(cashflows, rate).value
}

/// NPV at one rate together with its slope and the size of its terms
struct Discounted {
    value: f64,
    slope: f64,
    magnitude: f64,
}

impl Discounted {
    fn at(cashflows: &[f64], rate: f64) -> Self {
        let step = 1.0 / (1.0 + rate);
        let mut factor = 1.0;
        let mut out = Discounted { value: 0.0, slope: 0.0, magnitude: 0.0 };
        for (year, &cf) in cashflows.iter().enumerate() {
            let term = cf * factor;
            out.value += term;
            out.magnitude += term.abs();
            // d/dr of cf * (1 + r)^-t is -t * term / (1 + r)
            out.slope -= year as f64 * term * step;
            factor *= step;
        }
        out
    }

    fn is_root(&self) -> bool {
        self.value.is_finite() && self.value.abs() <= RESIDUAL_TOLERANCE * self.magnitude.max(1.0)
    }
}

fn is_root(cashflows: &[f64], rate: f64) -> bool {
    rate > MIN_RATE && rate < MAX_RATE && Discounted::at(cashflows, rate).is_root()
}

/// Newton iterations; gives up rather than clamping when a step leaves the interval
fn newton(cashflows: &[f64]) -> Option<f64> {
    let mut rate = INITIAL_GUESS;
    for _ in 0..MAX_NEWTON_STEPS {
        let at = Discounted::at(cashflows, rate);
        if !at.value.is_finite() || !at.slope.is_finite() || at.slope == 0.0 {
            return None;
        }
        let next = rate - at.value / at.slope;
        if !(next > MIN_RATE && next < MAX_RATE) {
            return None;
        }
        if (next - rate).abs() < STEP_TOLERANCE {
            return is_root(cashflows, next).then_some(next);
        }
        rate = next;
    }
    None
}

/// Sign-change scan over [`RATE_GRID`], bisecting the bracket nearest the initial guess
fn bracket_and_bisect(cashflows: &[f64]) -> Option<f64> {
    let samples: Vec<(f64, f64)> = RATE_GRID
        .iter()
        .map(|&rate| (rate, npv(cashflows, rate)))
        .filter(|(_, value)| value.is_finite())
        .collect();

    if let Some(&(rate, _)) = samples.iter().find(|(_, value)| *value == 0.0) {
        return is_root(cashflows, rate).then_some(rate);
    }

    let distance = |pair: &[(f64, f64)]| (0.5 * (pair[0].0 + pair[1].0) - INITIAL_GUESS).abs();
    samples
        .windows(2)
        .filter(|pair| pair[0].1.signum() != pair[1].1.signum())
        .min_by(|a, b| distance(*a).total_cmp(&distance(*b)))
        .and_then(|pair| bisect(cashflows, pair[0], pair[1].0))
}

/// Bisect `[low, high]` given NPV at `low` has the opposite sign to NPV at `high`
fn bisect(cashflows: &[f64], (mut low, mut value_low): (f64, f64), mut high: f64) -> Option<f64> {
    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (low + high);
        // no representable rate left between the ends
        if mid <= low || mid >= high {
            break;
        }
        let value_mid = npv(cashflows, mid);
        if value_mid == 0.0 {
            return is_root(cashflows, mid).then_some(mid);
        }
        if value_mid.signum() == value_low.signum() {
            low = mid;
            value_low = value_mid;
        } else {
            high = mid;
        }
        if high - low < BRACKET_WIDTH {
            break;
        }
    }
    let rate = 0.5 * (low + high);
    is_root(cashflows, rate).then_some(rate)
}
