use super::{BackendError, InferenceBackend};
use crate::model::{
    BoundingBox, DetectionClass, DetectionMetadata, DetectionOutcome, DetectionResult,
    FrameDetection, MediaKind, VideoDetectionResult,
};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;
use std::path::Path;
use std::time::Instant;

/// Probability that a simulated image contains fire
const FIRE_PROBABILITY: f64 = 0.4;
/// Probability that a sampled video frame contains fire
const FRAME_FIRE_PROBABILITY: f64 = 0.3;
const HIGH_CONFIDENCE: Range<f64> = 0.70..0.95;
const LOW_CONFIDENCE: Range<f64> = 0.0..0.4;
const FRAME_CONFIDENCE: Range<f64> = 0.6..0.9;
const MIN_FRAMES: u32 = 30;
const MAX_FRAMES: u32 = 150;
const MAX_FIRE_FRAME_RATIO: f64 = 0.3;
const MAX_SAMPLED_FRAMES: u32 = 10;
/// Seconds between sampled frames (~30fps)
const FRAME_INTERVAL_SECS: f64 = 0.033;

pub const SIMULATED_MODEL_VERSION: &str = "simulated-v1.0.0";
const SIMULATED_IMAGE_SIZE: &str = "1920x1080";

/// Backend that synthesizes structurally valid results
///
/// Used when no inference program is installed. Construct with
/// [`SimulatedBackend::seeded`] for reproducible output.
pub struct SimulatedBackend {
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn simulate_image(&self, started: Instant) -> DetectionResult {
        let mut rng = self.rng.lock();

        let fire_detected = rng.gen_bool(FIRE_PROBABILITY);
        let confidence = round2(draw_confidence(&mut *rng, fire_detected));

        let bounding_boxes = if fire_detected {
            vec![BoundingBox {
                x: rng.gen_range(0..500),
                y: rng.gen_range(0..300),
                width: rng.gen_range(80..200),
                height: rng.gen_range(60..160),
                confidence,
                class: if rng.gen_bool(0.5) {
                    DetectionClass::Fire
                } else {
                    DetectionClass::Smoke
                },
            }]
        } else {
            Vec::new()
        };

        DetectionResult {
            fire_detected,
            confidence,
            bounding_boxes,
            metadata: simulated_metadata(started),
        }
    }

    fn simulate_video(&self, started: Instant) -> VideoDetectionResult {
        let mut rng = self.rng.lock();

        let total_frames = rng.gen_range(MIN_FRAMES..=MAX_FRAMES);
        let fire_ratio = rng.gen_range(0.0..=MAX_FIRE_FRAME_RATIO);
        let frames_with_fire = ((total_frames as f64) * fire_ratio).floor() as u32;
        let fire_detected = frames_with_fire > 0;
        let overall_confidence = round2(draw_confidence(&mut *rng, fire_detected));

        let frame_results = (0..total_frames.min(MAX_SAMPLED_FRAMES))
            .map(|i| FrameDetection {
                frame_number: i + 1,
                timestamp: f64::from(i) * FRAME_INTERVAL_SECS,
                fire_detected: rng.gen_bool(FRAME_FIRE_PROBABILITY),
                confidence: round2(rng.gen_range(FRAME_CONFIDENCE)),
                bounding_boxes: Vec::new(),
            })
            .collect();

        VideoDetectionResult {
            total_frames,
            frames_with_fire,
            fire_detected,
            overall_confidence,
            frame_results,
            metadata: simulated_metadata(started),
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn infer(
        &self,
        kind: MediaKind,
        _file_path: &Path,
    ) -> Result<DetectionOutcome, BackendError> {
        let started = Instant::now();

        let outcome: DetectionOutcome = match kind {
            MediaKind::Image => self.simulate_image(started).into(),
            MediaKind::Video => self.simulate_video(started).into(),
        };

        Ok(outcome)
    }
}

fn draw_confidence<R: Rng + ?Sized>(rng: &mut R, fire_detected: bool) -> f64 {
    if fire_detected {
        rng.gen_range(HIGH_CONFIDENCE)
    } else {
        rng.gen_range(LOW_CONFIDENCE)
    }
}

fn simulated_metadata(started: Instant) -> DetectionMetadata {
    DetectionMetadata {
        processing_time: format!("{:.1}s", started.elapsed().as_secs_f64()),
        model_version: SIMULATED_MODEL_VERSION.to_string(),
        image_size: SIMULATED_IMAGE_SIZE.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn image(backend: &SimulatedBackend) -> DetectionResult {
        match backend.infer(MediaKind::Image, Path::new("/tmp/a.jpg")).await {
            Ok(DetectionOutcome::Image(result)) => result,
            other => panic!("expected image result, got {:?}", other),
        }
    }

    async fn video(backend: &SimulatedBackend) -> VideoDetectionResult {
        match backend.infer(MediaKind::Video, Path::new("/tmp/a.mp4")).await {
            Ok(DetectionOutcome::Video(result)) => result,
            other => panic!("expected video result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_image_boxes_match_verdict() {
        for seed in 0..200 {
            let result = image(&SimulatedBackend::seeded(seed)).await;

            assert_eq!(result.fire_detected, !result.bounding_boxes.is_empty());
            assert!((0.0..=1.0).contains(&result.confidence));

            if result.fire_detected {
                assert!(result.confidence >= 0.70 && result.confidence <= 0.95);
                assert_eq!(result.bounding_boxes.len(), 1);
                let bbox = &result.bounding_boxes[0];
                assert!(bbox.width >= 80 && bbox.width < 200);
                assert!(bbox.height >= 60 && bbox.height < 160);
            } else {
                assert!(result.confidence <= 0.4);
            }
        }
    }

    #[tokio::test]
    async fn test_video_invariants() {
        for seed in 0..200 {
            let result = video(&SimulatedBackend::seeded(seed)).await;

            assert!((MIN_FRAMES..=MAX_FRAMES).contains(&result.total_frames));
            assert!(result.frames_with_fire <= result.total_frames);
            assert!(f64::from(result.frames_with_fire) <= f64::from(result.total_frames) * 0.3);
            assert_eq!(result.fire_detected, result.frames_with_fire > 0);
            assert!(result.frame_results.len() as u32 <= result.total_frames.min(10));
            assert!((0.0..=1.0).contains(&result.overall_confidence));

            for (i, frame) in result.frame_results.iter().enumerate() {
                assert_eq!(frame.frame_number, i as u32 + 1);
                assert!((0.0..=1.0).contains(&frame.confidence));
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_output_is_reproducible() {
        let first = image(&SimulatedBackend::seeded(42)).await;
        let second = image(&SimulatedBackend::seeded(42)).await;

        assert_eq!(first.fire_detected, second.fire_detected);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.bounding_boxes, second.bounding_boxes);

        let first = video(&SimulatedBackend::seeded(7)).await;
        let second = video(&SimulatedBackend::seeded(7)).await;
        assert_eq!(first.total_frames, second.total_frames);
        assert_eq!(first.frame_results, second.frame_results);
    }

    #[tokio::test]
    async fn test_metadata_always_present() {
        let result = image(&SimulatedBackend::new()).await;

        assert_eq!(result.metadata.model_version, SIMULATED_MODEL_VERSION);
        assert_eq!(result.metadata.image_size, "1920x1080");
        assert!(result.metadata.processing_time.ends_with('s'));
        assert!(chrono::DateTime::parse_from_rfc3339(&result.metadata.timestamp).is_ok());
    }
}
