use thiserror::Error;

/// Errors surfaced by the detection service
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Malformed or missing input, raised by input collaborators
    #[error("Validation error: {0}")]
    Validation(String),

    /// The inference backend failed to produce a result
    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DetectionError {
    /// Short machine-readable code for CLI and log output
    pub fn code(&self) -> &'static str {
        match self {
            DetectionError::Validation(_) => "VALIDATION_ERROR",
            DetectionError::Processing(_) => "PROCESSING_ERROR",
            DetectionError::NotFound(_) => "NOT_FOUND",
            DetectionError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
