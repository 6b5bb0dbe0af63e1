use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the association pipeline.
///
/// Fatal variants abort the run immediately; a skipped bootstrap or
/// permutation stage is not an error and is reported through the
/// [`StageObserver`](crate::observer::StageObserver) instead.
#[derive(Error, Debug)]
pub enum AssocError {
    /// Target and feature matrix share zero sample identifiers.
    #[error(
        "target ({target_samples} samples) and features ({feature_samples} samples) \
         share no sample identifiers"
    )]
    EmptyIntersection {
        target_samples: usize,
        feature_samples: usize,
    },

    /// Every feature row was dropped by the degeneracy filter.
    #[error("no feature has at least {min_unique} distinct values")]
    NoViableFeatures { min_unique: usize },

    /// Unrecognized value-type tag, invalid axis selector, alias arity
    /// mismatch, unknown metric name, and similar caller mistakes.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A delimited input file could not be interpreted.
    #[error("failed to parse {}: {}", .path.display(), .message)]
    Parse { path: PathBuf, message: String },
}
