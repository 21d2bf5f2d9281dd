use super::StoreError;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::instrument;

/// Windowed aggregate over persisted detections, recomputed on every read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub total_detections: i64,
    pub fire_detections: i64,
    pub image_detections: i64,
    pub video_detections: i64,
    /// Mean confidence of fire detections
    pub avg_fire_confidence: f64,
    /// Mean orchestrator-measured processing time in milliseconds
    pub avg_processing_time: f64,
    pub period_days: u32,
}

impl DetectionStats {
    /// Zero-valued stats for a window with no data
    pub fn empty(period_days: u32) -> Self {
        Self {
            total_detections: 0,
            fire_detections: 0,
            image_detections: 0,
            video_detections: 0,
            avg_fire_confidence: 0.0,
            avg_processing_time: 0.0,
            period_days,
        }
    }
}

#[derive(FromRow)]
struct StatsRow {
    total_detections: i64,
    fire_detections: i64,
    image_detections: i64,
    video_detections: i64,
    avg_fire_confidence: f64,
    avg_processing_time: f64,
}

/// Single-pass aggregate over rows created within the last `days`.
///
/// Averages are coalesced to 0 so an empty window never yields NULL.
#[instrument(skip(pool))]
pub(super) async fn stats_since(pool: &PgPool, days: u32) -> Result<DetectionStats, StoreError> {
    let row = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT
            COUNT(*) AS total_detections,
            COUNT(*) FILTER (WHERE fire_detected) AS fire_detections,
            COUNT(*) FILTER (WHERE file_type = 'image') AS image_detections,
            COUNT(*) FILTER (WHERE file_type = 'video') AS video_detections,
            COALESCE(AVG(confidence) FILTER (WHERE fire_detected), 0)::float8 AS avg_fire_confidence,
            COALESCE(AVG(processing_time_ms), 0)::float8 AS avg_processing_time
        FROM detections
        WHERE created_at >= NOW() - make_interval(days => $1)
        "#,
    )
    .bind(days_param(days))
    .fetch_one(pool)
    .await?;

    Ok(DetectionStats {
        total_detections: row.total_detections,
        fire_detections: row.fire_detections,
        image_detections: row.image_detections,
        video_detections: row.video_detections,
        avg_fire_confidence: row.avg_fire_confidence,
        avg_processing_time: row.avg_processing_time,
        period_days: days,
    })
}

/// Longest window the query accepts; larger values overflow the timestamp range
const MAX_WINDOW_DAYS: u32 = 36_500;

fn days_param(days: u32) -> i32 {
    days.min(MAX_WINDOW_DAYS) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = DetectionStats::empty(7);
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.avg_fire_confidence, 0.0);
        assert_eq!(stats.avg_processing_time, 0.0);
        assert_eq!(stats.period_days, 7);
    }

    #[test]
    fn test_days_param_is_capped() {
        assert_eq!(days_param(30), 30);
        assert_eq!(days_param(u32::MAX), 36_500);
    }
}
