// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Triage Kernel failures.
///
/// The classification path itself cannot fail; every variant here is
/// raised at a call boundary before any scoring happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriageError {
    /// An externally supplied vector has the wrong length.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Non-finite value supplied by a caller.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Category name that does not exist in the fixed category set.
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

pub type TriageResult<T> = Result<T, TriageError>;

/// Reject a vector whose length differs from `expected`.
pub fn check_dimension(expected: usize, actual: usize) -> TriageResult<()> {
    if expected != actual {
        log::warn!("rejected vector of length {actual}, expected {expected}");
        return Err(TriageError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimension_ok() {
        assert!(check_dimension(10, 10).is_ok());
    }

    #[test]
    fn test_check_dimension_mismatch() {
        let err = check_dimension(10, 3).unwrap_err();
        assert_eq!(
            err,
            TriageError::DimensionMismatch {
                expected: 10,
                actual: 3
            }
        );
        assert_eq!(err.to_string(), "dimension mismatch: expected 10, got 3");
    }
}
