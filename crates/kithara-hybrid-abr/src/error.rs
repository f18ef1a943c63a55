use thiserror::Error;

/// Result type used by `kithara-hybrid-abr`.
pub type AbrResult<T> = Result<T, AbrError>;

/// Errors produced while setting up an ABR instance.
///
/// Decision paths never fail: they fall back to the current profile or
/// report `None` instead.
#[derive(Debug, Error, PartialEq)]
pub enum AbrError {
    #[error("cache length must be at least 1")]
    ZeroCacheLength,

    #[error("network consistency count must be at least 1")]
    ZeroConsistencyCount,

    #[error("invalid buffer thresholds: min {min_secs}s > max {max_secs}s")]
    BufferThresholds { min_secs: f64, max_secs: f64 },

    #[error("invalid skip duration: {0}s")]
    SkipDuration(f64),
}
