//! Error taxonomy for project evaluation
//!
//! Validation and computation failures abort the single evaluation they occur
//! in. Unsolvable conditions (no IRR, no sign change in a goal-seek bracket,
//! unrecoverable payback) are not errors and never appear here.

use thiserror::Error;

/// Result alias used across the crate
pub type EvalResult<T> = Result<T, EvalError>;

/// Broad category of an [`EvalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Computation,
    Io,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid parameter `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown sensitivity factor `{0}`")]
    UnknownFactor(String),

    #[error("computation failed in {context}")]
    Computation {
        context: String,
        #[source]
        source: ComputationFault,
    },

    #[error("ledger has not been built; call build_ledger first")]
    LedgerNotBuilt,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Underlying cause of a computation error
#[derive(Debug, Error)]
pub enum ComputationFault {
    #[error("`{field}` evaluated to non-finite value {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("ledger contains no periods")]
    EmptyLedger,
}

impl EvalError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EvalError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn computation(context: impl Into<String>, source: ComputationFault) -> Self {
        EvalError::Computation {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Validation { .. } | EvalError::UnknownFactor(_) => ErrorKind::Validation,
            EvalError::Computation { .. } | EvalError::LedgerNotBuilt => ErrorKind::Computation,
            EvalError::Io(_) | EvalError::Csv(_) | EvalError::Json(_) => ErrorKind::Io,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_computation(&self) -> bool {
        self.kind() == ErrorKind::Computation
    }
}

/// Reject NaN and infinities produced mid-computation
pub(crate) fn ensure_finite(context: impl FnOnce() -> String, field: &'static str, value: f64) -> EvalResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::computation(context(), ComputationFault::NonFinite { field, value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kinds() {
        assert_eq!(EvalError::validation("hours", "must be positive").kind(), ErrorKind::Validation);
        assert_eq!(EvalError::UnknownFactor("foo".into()).kind(), ErrorKind::Validation);
        assert_eq!(EvalError::LedgerNotBuilt.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_computation_keeps_cause() {
        let err = EvalError::computation("period 3", ComputationFault::EmptyLedger);
        assert!(err.is_computation());
        assert_eq!(err.to_string(), "computation failed in period 3");
        assert_eq!(err.source().unwrap().to_string(), "ledger contains no periods");
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite(|| "x".into(), "revenue", 1.5).unwrap(), 1.5);
        let err = ensure_finite(|| "period 2".into(), "revenue", f64::NAN).unwrap_err();
        assert!(err.is_computation());
    }
}
