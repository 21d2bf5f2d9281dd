//! Emberwatch Detection Service
//!
//! Fire and smoke detection for uploaded images and videos. The service
//! runs an inference backend over a stored media file, returns the verdict
//! and records it in PostgreSQL for history and statistics queries.
//!
//! ## Features
//!
//! - **Backend selection**: an external inference program when it is
//!   installed, a seedable simulated backend otherwise
//! - **Best-effort persistence**: storage failures are logged and never fail
//!   a detection request
//! - **Windowed statistics**: counts and averages over a trailing period,
//!   recomputed on every read
//!
//! ## Architecture
//!
//! ```text
//!  DetectionRequest
//!        │
//!        ▼
//! ┌──────────────┐  artifact present   ┌──────────────┐
//! │ Detection    │────────────────────▶│ Process      │──▶ inference program
//! │ Orchestrator │                     │ Backend      │
//! │              │  artifact missing   ┌──────────────┐
//! │              │────────────────────▶│ Simulated    │
//! └──────────────┘                     │ Backend      │
//!        │                             └──────────────┘
//!        ▼ best-effort write / reads
//! ┌──────────────┐           ┌──────────────┐
//! │ PgDetection  │──────────▶│ PostgreSQL   │
//! │ Store        │           │ detections   │
//! └──────────────┘           └──────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod store;

pub use backend::{BackendError, InferenceBackend, ProcessBackend, SimulatedBackend};
pub use config::Config;
pub use error::DetectionError;
pub use model::{
    BoundingBox, DetectionClass, DetectionMetadata, DetectionOutcome, DetectionRequest,
    DetectionResult, FrameDetection, MediaKind, VideoDetectionResult,
};
pub use orchestrator::{DetectionOrchestrator, ServiceStatus, SupportedFormats};
pub use store::{
    DetectionRecord, DetectionStats, DetectionStore, NewDetection, PgDetectionStore, StoreError,
};
