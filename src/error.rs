//! Error types for the histogram and labeling operations.

use thiserror::Error;

/// Result type alias for dect-explorer operations.
pub type Result<T> = std::result::Result<T, DectError>;

/// Which of the two paired input volumes a problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    A,
    B,
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::A => write!(f, "A"),
            Input::B => write!(f, "B"),
        }
    }
}

/// Errors raised while validating the inputs of `build` or `label`.
///
/// Every variant is detected before any output array is allocated.
#[derive(Debug, Error, PartialEq)]
pub enum DectError {
    #[error("volume shapes differ: A is {a:?}, B is {b:?}")]
    ShapeMismatch {
        a: (usize, usize, usize),
        b: (usize, usize, usize),
    },

    #[error("invalid region list: {0}")]
    InvalidRegionList(String),

    #[error("tolerance must be a non-negative number, got {0}")]
    InvalidTolerance(f64),

    #[error("histogram needs at least one bin per axis")]
    InvalidBinCount,

    #[error("volume {volume} has a non-finite sample at flat index {index}")]
    NonFiniteSample { volume: Input, index: usize },
}
