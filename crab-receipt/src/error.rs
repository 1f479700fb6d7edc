//! Composer errors

use thiserror::Error;

/// Errors raised while turning a job into printer bytes
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The external raster renderer could not produce image bytes
    #[error("Raster rendering failed: {0}")]
    Raster(String),

    /// The job data cannot be printed as given
    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

pub type ComposeResult<T> = Result<T, ComposeError>;
