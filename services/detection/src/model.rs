use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Image extensions accepted for detection
pub const IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Video extensions accepted for detection
pub const VIDEO_FORMATS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Kind of media submitted for detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Classify a file by its extension against the supported formats
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();

        if IMAGE_FORMATS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_FORMATS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// A single detection request, already validated by the caller
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub media_kind: MediaKind,
    /// Absolute path of the stored upload
    pub file_path: PathBuf,
    pub original_filename: String,
}

impl DetectionRequest {
    pub fn new(
        media_kind: MediaKind,
        file_path: impl Into<PathBuf>,
        original_filename: impl Into<String>,
    ) -> Self {
        Self {
            media_kind,
            file_path: file_path.into(),
            original_filename: original_filename.into(),
        }
    }
}

/// Class label of a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Fire,
    Smoke,
}

/// Rectangular region with a fire or smoke label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    pub class: DetectionClass,
}

/// Backend-reported metadata attached to every result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetadata {
    /// Backend-side duration, e.g. "1.2s"
    #[serde(default)]
    pub processing_time: String,
    #[serde(default)]
    pub model_version: String,
    /// Frame size, e.g. "1920x1080"
    #[serde(default)]
    pub image_size: String,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub timestamp: String,
}

/// Detection verdict for a single image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub fire_detected: bool,
    pub confidence: f64,
    #[serde(default)]
    pub bounding_boxes: Vec<BoundingBox>,
    pub metadata: DetectionMetadata,
}

/// Verdict for one sampled video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    pub frame_number: u32,
    /// Offset into the video in seconds
    pub timestamp: f64,
    pub fire_detected: bool,
    pub confidence: f64,
    #[serde(default)]
    pub bounding_boxes: Vec<BoundingBox>,
}

/// Detection verdict for a video
///
/// `frame_results` is a bounded sample and does not necessarily cover every
/// frame counted in `total_frames`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetectionResult {
    pub total_frames: u32,
    pub frames_with_fire: u32,
    pub fire_detected: bool,
    pub overall_confidence: f64,
    #[serde(default)]
    pub frame_results: Vec<FrameDetection>,
    pub metadata: DetectionMetadata,
}

/// Result of one detection, image or video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectionOutcome {
    Video(VideoDetectionResult),
    Image(DetectionResult),
}

impl DetectionOutcome {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            DetectionOutcome::Image(_) => MediaKind::Image,
            DetectionOutcome::Video(_) => MediaKind::Video,
        }
    }

    pub fn fire_detected(&self) -> bool {
        match self {
            DetectionOutcome::Image(r) => r.fire_detected,
            DetectionOutcome::Video(r) => r.fire_detected,
        }
    }

    /// Image confidence, or the overall confidence of a video
    pub fn confidence(&self) -> f64 {
        match self {
            DetectionOutcome::Image(r) => r.confidence,
            DetectionOutcome::Video(r) => r.overall_confidence,
        }
    }

    /// Boxes persisted with the record. Videos keep theirs per frame.
    pub fn bounding_boxes(&self) -> &[BoundingBox] {
        match self {
            DetectionOutcome::Image(r) => &r.bounding_boxes,
            DetectionOutcome::Video(_) => &[],
        }
    }

    pub fn metadata(&self) -> &DetectionMetadata {
        match self {
            DetectionOutcome::Image(r) => &r.metadata,
            DetectionOutcome::Video(r) => &r.metadata,
        }
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        match self {
            DetectionOutcome::Image(r) => {
                format!("Fire detection completed. Fire detected: {}", r.fire_detected)
            }
            DetectionOutcome::Video(r) => format!(
                "Video analysis completed. Fire detected in {}/{} frames",
                r.frames_with_fire, r.total_frames
            ),
        }
    }
}

impl From<DetectionResult> for DetectionOutcome {
    fn from(result: DetectionResult) -> Self {
        DetectionOutcome::Image(result)
    }
}

impl From<VideoDetectionResult> for DetectionOutcome {
    fn from(result: VideoDetectionResult) -> Self {
        DetectionOutcome::Video(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_path() {
        assert_eq!(
            MediaKind::from_path(Path::new("/tmp/forest.JPG")),
            Some(MediaKind::Image)
        );
        assert_eq!(
            MediaKind::from_path(Path::new("/tmp/clip.mkv")),
            Some(MediaKind::Video)
        );
        assert_eq!(MediaKind::from_path(Path::new("/tmp/notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("/tmp/no_extension")), None);
    }

    #[test]
    fn test_media_kind_serialization() {
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
        assert_eq!("VIDEO".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert!("audio".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_deserialize_image_result() {
        let json = r#"{
            "fire_detected": true,
            "confidence": 0.91,
            "bounding_boxes": [
                {"x": 120, "y": 80, "width": 150, "height": 100, "confidence": 0.91, "class": "fire"}
            ],
            "metadata": {
                "processing_time": "1.2s",
                "model_version": "yolov8-fire-1.0",
                "image_size": "1920x1080",
                "timestamp": "2025-08-17T10:00:00Z"
            }
        }"#;

        let outcome: DetectionOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.media_kind(), MediaKind::Image);
        assert!(outcome.fire_detected());
        assert_eq!(outcome.bounding_boxes()[0].class, DetectionClass::Fire);
    }

    #[test]
    fn test_deserialize_video_result() {
        let json = r#"{
            "total_frames": 90,
            "frames_with_fire": 4,
            "fire_detected": true,
            "overall_confidence": 0.8,
            "frame_results": [
                {"frame_number": 1, "timestamp": 0.0, "fire_detected": false, "confidence": 0.1, "bounding_boxes": []}
            ],
            "metadata": {"processing_time": "3.0s", "model_version": "v1", "image_size": "1280x720", "timestamp": "2025-08-17T10:00:00Z"}
        }"#;

        let outcome: DetectionOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.media_kind(), MediaKind::Video);
        assert_eq!(outcome.confidence(), 0.8);
        assert!(outcome.bounding_boxes().is_empty());
        assert!(outcome.summary().contains("4/90"));
    }

    #[test]
    fn test_metadata_fields_default_when_missing() {
        let metadata: DetectionMetadata =
            serde_json::from_str(r#"{"processing_time": "0.8s"}"#).unwrap();
        assert_eq!(metadata.processing_time, "0.8s");
        assert!(metadata.model_version.is_empty());
    }
}
