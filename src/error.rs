use diffusion_common::LigandId;
use thiserror::Error;

/// Contract violations raised synchronously by environment operations.
///
/// Numerical divergence from an oversized time step is deliberately absent:
/// it is the caller's responsibility (see [`crate::stability`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvironmentError {
    #[error("unknown ligand id {id}")]
    UnknownLigand { id: LigandId },

    #[error("duplicate ligand id {id}")]
    DuplicateLigandId { id: LigandId },

    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A coordinate that is NaN or infinite is reported as
    /// [`NON_FINITE_INDEX`](crate::coupling::NON_FINITE_INDEX).
    #[error("grid corner ({row}, {col}) outside allocated field of {rows}x{cols}")]
    OutOfBounds {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },

    #[error("ligand index {index} outside 0..{count}")]
    LigandIndexOutOfRange { index: usize, count: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EnvironmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EnvironmentError::UnknownLigand { id: 9 };
        assert_eq!(e.to_string(), "unknown ligand id 9");

        let e = EnvironmentError::DimensionMismatch {
            what: "deltas",
            expected: 4,
            got: 3,
        };
        assert_eq!(e.to_string(), "dimension mismatch for deltas: expected 4, got 3");

        let e = EnvironmentError::OutOfBounds {
            row: -1,
            col: 2,
            rows: 6,
            cols: 6,
        };
        assert_eq!(e.to_string(), "grid corner (-1, 2) outside allocated field of 6x6");
    }
}
