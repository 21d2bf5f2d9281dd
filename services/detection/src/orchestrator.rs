//! Detection orchestration.
//!
//! The orchestrator picks an inference backend for each request, times the
//! run and records the outcome through the [`DetectionStore`]. Persistence
//! is best-effort on the detection path: a failed write is logged and
//! counted, and the caller still receives the detection result.

use crate::backend::{InferenceBackend, ProcessBackend, SimulatedBackend};
use crate::config::BackendConfig;
use crate::error::DetectionError;
use crate::model::{DetectionOutcome, DetectionRequest, IMAGE_FORMATS, VIDEO_FORMATS};
use crate::store::{DetectionRecord, DetectionStats, DetectionStore, NewDetection};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_STATS_DAYS: u32 = 7;

/// Readiness snapshot of the detection service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub service: &'static str,
    pub status: &'static str,
    pub model_loaded: bool,
    pub backend_available: bool,
    pub supported_formats: SupportedFormats,
    pub version: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportedFormats {
    pub images: Vec<&'static str>,
    pub videos: Vec<&'static str>,
}

/// Coordinates backends and persistence for detection requests
pub struct DetectionOrchestrator {
    primary: Arc<dyn InferenceBackend>,
    /// Artifact whose presence enables `primary`
    artifact: PathBuf,
    fallback: Arc<dyn InferenceBackend>,
    store: Arc<dyn DetectionStore>,
    model_path: PathBuf,
}

impl DetectionOrchestrator {
    /// Wire an orchestrator from explicit parts
    ///
    /// `primary` is used only while `artifact` exists; otherwise every
    /// request goes to `fallback`.
    pub fn new(
        primary: Arc<dyn InferenceBackend>,
        artifact: impl Into<PathBuf>,
        fallback: Arc<dyn InferenceBackend>,
        store: Arc<dyn DetectionStore>,
    ) -> Self {
        Self {
            primary,
            artifact: artifact.into(),
            fallback,
            store,
            model_path: PathBuf::new(),
        }
    }

    /// Build the process and simulated backends described by `config`
    pub fn from_config(config: &BackendConfig, store: Arc<dyn DetectionStore>) -> Self {
        let process = match config.interpreter.as_deref().filter(|i| !i.is_empty()) {
            Some(interpreter) => ProcessBackend::with_interpreter(interpreter, &config.script_path),
            None => ProcessBackend::new(&config.script_path),
        };
        let artifact = process.artifact().to_path_buf();

        let simulated = match config.simulated_seed {
            Some(seed) => SimulatedBackend::seeded(seed),
            None => SimulatedBackend::new(),
        };

        Self::new(Arc::new(process), artifact, Arc::new(simulated), store)
            .with_model_path(&config.model_path)
    }

    pub fn with_model_path(mut self, model_path: impl Into<PathBuf>) -> Self {
        self.model_path = model_path.into();
        self
    }

    fn backend_available(&self) -> bool {
        self.artifact.exists()
    }

    async fn select_backend(&self) -> &Arc<dyn InferenceBackend> {
        let present = tokio::fs::try_exists(&self.artifact).await.unwrap_or(false);

        if present {
            &self.primary
        } else {
            warn!(
                artifact = %self.artifact.display(),
                backend = self.fallback.name(),
                "Inference artifact not found, using fallback backend"
            );
            metrics::counter!("detection.fallback").increment(1);
            &self.fallback
        }
    }

    /// Run detection for one request
    ///
    /// Fails only when the selected backend fails. Persistence problems are
    /// logged and never change the returned result.
    #[instrument(
        skip(self, request),
        fields(kind = %request.media_kind, file = %request.original_filename)
    )]
    pub async fn detect(
        &self,
        request: DetectionRequest,
    ) -> Result<DetectionOutcome, DetectionError> {
        let started = Instant::now();
        metrics::counter!("detection.requests").increment(1);

        let backend = self.select_backend().await;
        debug!(backend = backend.name(), "Running inference");

        let outcome = backend
            .infer(request.media_kind, &request.file_path)
            .await
            .map_err(|e| {
                error!(backend = backend.name(), error = %e, "Inference failed");
                metrics::counter!("detection.failed").increment(1);
                DetectionError::Processing(format!(
                    "Failed to process {}: {}",
                    request.media_kind, e
                ))
            })?;

        let elapsed_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

        info!(
            backend = backend.name(),
            fire_detected = outcome.fire_detected(),
            confidence = outcome.confidence(),
            elapsed_ms = elapsed_ms,
            "{}",
            outcome.summary()
        );

        let detection = NewDetection {
            file_path: request.file_path,
            file_type: request.media_kind,
            original_filename: request.original_filename,
            outcome,
            processing_time_ms: elapsed_ms,
        };

        match self.store.insert(&detection).await {
            Ok(id) => {
                info!(id = %id, "Detection saved");
                metrics::counter!("detection.persisted").increment(1);
            }
            Err(e) => {
                warn!(error = %e, "Failed to save detection, continuing without persistence");
                metrics::counter!("detection.persist.failed").increment(1);
            }
        }

        Ok(detection.outcome)
    }

    /// Readiness snapshot; inspects the filesystem only
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            service: "detection",
            status: "ready",
            model_loaded: self.model_path.exists(),
            backend_available: self.backend_available(),
            supported_formats: SupportedFormats {
                images: IMAGE_FORMATS.to_vec(),
                videos: VIDEO_FORMATS.to_vec(),
            },
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Most recent detections; empty when the store is unavailable
    ///
    /// A `limit` of 0 selects the default; larger limits are capped.
    pub async fn history(&self, limit: usize) -> Vec<DetectionRecord> {
        let limit = match limit {
            0 => DEFAULT_HISTORY_LIMIT,
            n => n.min(MAX_HISTORY_LIMIT),
        };

        match self.store.recent(limit as i64).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to get detection history");
                Vec::new()
            }
        }
    }

    /// Windowed statistics; zero-valued when the store is unavailable
    ///
    /// A `window_days` of 0 selects the default window.
    pub async fn stats(&self, window_days: u32) -> DetectionStats {
        let days = match window_days {
            0 => DEFAULT_STATS_DAYS,
            n => n,
        };

        match self.store.stats_since(days).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to get detection stats");
                DetectionStats::empty(days)
            }
        }
    }

    /// Look up a single persisted detection
    pub async fn record(&self, id: Uuid) -> Result<DetectionRecord, DetectionError> {
        match self.store.find(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(DetectionError::NotFound(format!("Detection {} not found", id))),
            Err(e) => Err(DetectionError::Internal(e.to_string())),
        }
    }
}
