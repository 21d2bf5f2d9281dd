//! Inference backends.
//!
//! A backend turns a stored media file into a [`DetectionOutcome`]. The
//! process backend shells out to an external inference program; the
//! simulated backend synthesizes plausible results with no external
//! dependency. Choosing between them is the orchestrator's job.

mod process;
mod simulated;

pub use process::ProcessBackend;
pub use simulated::SimulatedBackend;

use crate::model::{DetectionOutcome, MediaKind};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors raised while running an inference backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to start inference process {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference process exited with code {code}: {stderr}")]
    Exit { code: String, stderr: String },

    #[error("Failed to parse inference output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Capability shared by every inference backend
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier for logs
    fn name(&self) -> &'static str;

    /// Run detection on an already stored file.
    async fn infer(&self, kind: MediaKind, file_path: &Path)
        -> Result<DetectionOutcome, BackendError>;
}
