use super::{stats, DetectionRecord, DetectionStats, DetectionStore, NewDetection, StoreError};
use crate::config::DatabaseConfig;
use crate::model::{BoundingBox, DetectionMetadata, MediaKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS detections (
        id UUID PRIMARY KEY,
        file_path VARCHAR(500) NOT NULL,
        file_type VARCHAR(10) NOT NULL,
        original_filename VARCHAR(255) NOT NULL,
        fire_detected BOOLEAN NOT NULL,
        confidence DECIMAL(5,3) NOT NULL,
        bounding_boxes JSONB,
        metadata JSONB,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        processing_time_ms INTEGER,
        model_version VARCHAR(50)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_detections_created_at ON detections(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_detections_fire_detected ON detections(fire_detected)",
    "CREATE INDEX IF NOT EXISTS idx_detections_file_type ON detections(file_type)",
];

const SELECT_COLUMNS: &str = r#"
    SELECT id, file_path, file_type, original_filename, fire_detected,
           confidence::float8 AS confidence, bounding_boxes, metadata,
           created_at, processing_time_ms, model_version
    FROM detections
"#;

#[derive(FromRow)]
struct DetectionRow {
    id: Uuid,
    file_path: String,
    file_type: String,
    original_filename: String,
    fire_detected: bool,
    confidence: f64,
    bounding_boxes: Option<Json<Vec<BoundingBox>>>,
    metadata: Option<Json<DetectionMetadata>>,
    created_at: DateTime<Utc>,
    processing_time_ms: Option<i32>,
    model_version: Option<String>,
}

impl TryFrom<DetectionRow> for DetectionRecord {
    type Error = StoreError;

    fn try_from(row: DetectionRow) -> Result<Self, Self::Error> {
        let file_type: MediaKind = row
            .file_type
            .parse()
            .map_err(|message| StoreError::CorruptRow { id: row.id, message })?;

        Ok(DetectionRecord {
            id: row.id,
            file_path: row.file_path,
            file_type,
            original_filename: row.original_filename,
            fire_detected: row.fire_detected,
            confidence: row.confidence,
            bounding_boxes: row.bounding_boxes.map(|b| b.0).unwrap_or_default(),
            metadata: row.metadata.map(|m| m.0).unwrap_or_default(),
            created_at: row.created_at,
            processing_time_ms: row.processing_time_ms.unwrap_or(0),
            model_version: row.model_version,
        })
    }
}

/// PostgreSQL-backed detection store
///
/// Owns the connection pool for the whole process. The pool connects lazily
/// on first use, so constructing the store never needs a reachable server;
/// call [`PgDetectionStore::close`] on shutdown.
pub struct PgDetectionStore {
    pool: PgPool,
}

impl PgDetectionStore {
    /// Create a store with a lazily connecting pool
    pub fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_lazy(&config.url)?;

        info!(
            max_connections = config.max_connections,
            "PostgreSQL pool configured"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check connectivity with a trivial query
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }

    /// Get the connection pool (for tests and health checks)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DetectionStore for PgDetectionStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }

        info!("Detections schema ready");
        Ok(())
    }

    #[instrument(skip(self, detection), fields(file_type = %detection.file_type))]
    async fn insert(&self, detection: &NewDetection) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let outcome = &detection.outcome;
        let metadata = outcome.metadata();
        let model_version = Some(metadata.model_version.as_str()).filter(|v| !v.is_empty());

        sqlx::query(
            r#"
            INSERT INTO detections (
                id, file_path, file_type, original_filename, fire_detected,
                confidence, bounding_boxes, metadata, processing_time_ms, model_version
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10
            )
            "#,
        )
        .bind(id)
        .bind(detection.file_path.display().to_string())
        .bind(detection.file_type.as_str())
        .bind(&detection.original_filename)
        .bind(outcome.fire_detected())
        .bind(outcome.confidence())
        .bind(Json(outcome.bounding_boxes()))
        .bind(Json(metadata))
        .bind(detection.processing_time_ms)
        .bind(model_version)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, "Detection inserted");

        Ok(id)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<DetectionRecord>, StoreError> {
        let sql = format!("{} ORDER BY created_at DESC LIMIT $1", SELECT_COLUMNS);

        let rows = sqlx::query_as::<_, DetectionRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(DetectionRecord::try_from).collect()
    }

    async fn find(&self, id: Uuid) -> Result<Option<DetectionRecord>, StoreError> {
        let sql = format!("{} WHERE id = $1", SELECT_COLUMNS);

        let row = sqlx::query_as::<_, DetectionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DetectionRecord::try_from).transpose()
    }

    async fn stats_since(&self, days: u32) -> Result<DetectionStats, StoreError> {
        stats::stats_since(&self.pool, days).await
    }
}
