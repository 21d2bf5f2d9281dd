#![cfg(unix)]

use emberwatch_detection::{
    BackendError, DetectionOutcome, InferenceBackend, MediaKind, ProcessBackend,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a shell script to be run through `sh`
fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("{}\n", body)).unwrap();
    path
}

fn sh(script: &Path) -> ProcessBackend {
    ProcessBackend::with_interpreter("sh", script)
}

#[tokio::test]
async fn test_launch_failure_is_distinct_from_exit_failure() {
    let backend = ProcessBackend::new("/nonexistent/emberwatch/infer");

    let err = backend
        .infer(MediaKind::Image, Path::new("/tmp/a.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Launch { .. }));
    assert!(err.to_string().contains("Failed to start inference process"));
}

#[tokio::test]
async fn test_non_zero_exit_carries_code_and_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let script = script(&dir, "fail.sh", "echo boom >&2\nexit 3");

    let err = sh(&script)
        .infer(MediaKind::Image, Path::new("/tmp/a.jpg"))
        .await
        .unwrap_err();

    match err {
        BackendError::Exit { code, stderr } => {
            assert_eq!(code, "3");
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected exit failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_receives_kind_and_path_arguments() {
    let dir = tempfile::tempdir().unwrap();
    // Fail unless invoked as `<script> video <path>`
    let script = script(
        &dir,
        "video.sh",
        r#"[ "$1" = "video" ] || { echo "bad kind $1" >&2; exit 2; }
[ "$2" = "/data/clip.mp4" ] || { echo "bad path $2" >&2; exit 2; }
echo "loading model" >&2
cat <<'EOF'
{"total_frames": 60, "frames_with_fire": 0, "fire_detected": false,
 "overall_confidence": 0.05, "frame_results": [],
 "metadata": {"processing_time": "2.1s", "model_version": "yolo-fire-2", "image_size": "1280x720", "timestamp": "2025-08-17T10:00:00Z"}}
EOF"#,
    );

    let outcome = sh(&script)
        .infer(MediaKind::Video, Path::new("/data/clip.mp4"))
        .await
        .unwrap();

    match outcome {
        DetectionOutcome::Video(video) => {
            assert_eq!(video.total_frames, 60);
            assert!(!video.fire_detected);
            assert_eq!(video.metadata.model_version, "yolo-fire-2");
        }
        other => panic!("expected video outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_runs_executable_without_interpreter() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(
        &dir,
        "detect",
        r#"#!/bin/sh
echo '{"fire_detected": false, "confidence": 0.1, "bounding_boxes": [], "metadata": {}}'"#,
    );
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let outcome = ProcessBackend::new(&path)
        .infer(MediaKind::Image, Path::new("/tmp/a.jpg"))
        .await
        .unwrap();

    assert_eq!(outcome.media_kind(), MediaKind::Image);
    assert!(!outcome.fire_detected());
}

#[tokio::test]
async fn test_unexpected_document_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = script(&dir, "detect.sh", "echo '{}'");

    let err = sh(&script)
        .infer(MediaKind::Image, Path::new("/tmp/a.jpg"))
        .await
        .unwrap_err();

    // `{}` is valid JSON but not a detection result
    assert!(matches!(err, BackendError::Parse(_)));
}
