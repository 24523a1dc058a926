//! Pipeline-level errors surfaced to callers.

use thiserror::Error;

use crate::traffic::FormatError;

/// The three failure categories a caller needs to tell apart.
///
/// `Format` and `NoEndpoints` mean "fix the input"; `GenerationFailed` means
/// the model service answered nothing usable (misconfiguration, outage or
/// persistent schema violations).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("no valid endpoints")]
    NoEndpoints,

    #[error("generation failed: none of {batches} batch(es) produced a usable result")]
    GenerationFailed { batches: usize },
}

impl PipelineError {
    /// Whether the error points at the input rather than the model service.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::NoEndpoints)
    }
}
