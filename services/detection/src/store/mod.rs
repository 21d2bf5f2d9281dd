//! Detection persistence.
//!
//! [`DetectionStore`] is the seam between the orchestrator and storage.
//! Store implementations report every failure to their caller; deciding
//! which failures are tolerable is left to the orchestrator.

mod postgres;
mod stats;

pub use postgres::PgDetectionStore;
pub use stats::DetectionStats;

use crate::model::{BoundingBox, DetectionMetadata, DetectionOutcome, MediaKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a detection store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt detection row {id}: {message}")]
    CorruptRow { id: Uuid, message: String },
}

/// A completed detection waiting to be persisted
#[derive(Debug, Clone)]
pub struct NewDetection {
    pub file_path: PathBuf,
    pub file_type: MediaKind,
    pub original_filename: String,
    pub outcome: DetectionOutcome,
    /// Wall-clock time measured by the orchestrator
    pub processing_time_ms: i32,
}

/// Persisted detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: Uuid,
    pub file_path: String,
    pub file_type: MediaKind,
    pub original_filename: String,
    pub fire_detected: bool,
    pub confidence: f64,
    pub bounding_boxes: Vec<BoundingBox>,
    pub metadata: DetectionMetadata,
    pub created_at: DateTime<Utc>,
    pub processing_time_ms: i32,
    pub model_version: Option<String>,
}

/// Storage operations used by the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Create the detections table and its indexes if missing
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Persist one detection and return its generated ID
    async fn insert(&self, detection: &NewDetection) -> Result<Uuid, StoreError>;

    /// Most recent detections, newest first
    async fn recent(&self, limit: i64) -> Result<Vec<DetectionRecord>, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<DetectionRecord>, StoreError>;

    /// Aggregate statistics over the trailing `days`
    async fn stats_since(&self, days: u32) -> Result<DetectionStats, StoreError>;
}
