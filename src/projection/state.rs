//! Projection state carried across periods of a single ledger build

/// Running balance of input tax credit available against output VAT
///
/// Consumed first-in-first-out; once exhausted it stays at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeductionPool {
    remaining: f64,
}

impl DeductionPool {
    pub fn new(initial: f64) -> Self {
        Self { remaining: initial.max(0.0) }
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Offset a period's output VAT against the pool
    ///
    /// Returns `(deduction_used, vat_payable)`.
    pub fn offset(&mut self, output_vat: f64) -> (f64, f64) {
        let payable = if self.remaining > 0.0 {
            if self.remaining >= output_vat {
                self.remaining -= output_vat;
                0.0
            } else {
                let payable = output_vat - self.remaining;
                self.remaining = 0.0;
                payable
            }
        } else {
            output_vat
        };
        (output_vat - payable, payable)
    }
}

/// State of a project at a point in time during projection
#[derive(Debug, Clone)]
pub struct ProjectionState {
    /// Current ledger period (1 = construction)
    pub period: u32,

    /// Operating year (0 during construction)
    pub operating_year: u32,

    /// Remaining input tax credit
    pub pool: DeductionPool,
}

impl ProjectionState {
    /// Initialize state at the start of construction
    pub fn new(deductible_tax: f64) -> Self {
        Self {
            period: 1,
            operating_year: 0,
            pool: DeductionPool::new(deductible_tax),
        }
    }

    /// Advance to the next operating year
    pub fn advance_period(&mut self) {
        self.period += 1;
        self.operating_year += 1;
    }

    /// Whether the current period closes the operating horizon
    pub fn is_final(&self, operating_years: u32) -> bool {
        self.operating_year == operating_years
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_covers_output_vat() {
        let mut pool = DeductionPool::new(100.0);
        assert_eq!(pool.offset(30.0), (30.0, 0.0));
        assert_eq!(pool.remaining(), 70.0);
    }

    #[test]
    fn test_pool_exhausts_and_stays_empty() {
        let mut pool = DeductionPool::new(50.0);
        assert_eq!(pool.offset(30.0), (30.0, 0.0));
        assert_eq!(pool.offset(30.0), (20.0, 10.0));
        assert!(pool.is_exhausted());
        assert_eq!(pool.offset(30.0), (0.0, 30.0));
        assert_eq!(pool.remaining(), 0.0);
    }

    #[test]
    fn test_negative_initial_balance_clamped() {
        let pool = DeductionPool::new(-5.0);
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_state_advance() {
        let mut state = ProjectionState::new(10.0);
        assert_eq!((state.period, state.operating_year), (1, 0));
        state.advance_period();
        assert_eq!((state.period, state.operating_year), (2, 1));
        assert!(!state.is_final(25));
    }
}
