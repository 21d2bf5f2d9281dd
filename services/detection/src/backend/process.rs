use super::{BackendError, InferenceBackend};
use crate::model::{DetectionOutcome, DetectionResult, MediaKind, VideoDetectionResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Backend that runs an external inference program
///
/// The program is invoked as `[interpreter] <script> <kind> <path>` and must
/// print exactly one JSON result document on stdout. Anything on stderr is
/// treated as diagnostics and only surfaces inside error messages.
///
/// The call waits for the process to exit. There is no timeout, and the
/// child is not killed if the awaiting task is dropped.
pub struct ProcessBackend {
    interpreter: Option<String>,
    script: PathBuf,
}

impl ProcessBackend {
    /// Run `script` directly as an executable
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: None,
            script: script.into(),
        }
    }

    /// Run `script` through an interpreter such as `python3`
    pub fn with_interpreter(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
            script: script.into(),
        }
    }

    /// Path of the artifact that must exist for this backend to be usable
    pub fn artifact(&self) -> &Path {
        &self.script
    }

    fn command(&self, kind: MediaKind, file_path: &Path) -> Command {
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.script);
                command
            }
            None => Command::new(&self.script),
        };

        command
            .arg(kind.as_str())
            .arg(file_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        command
    }

    fn program(&self) -> String {
        match &self.interpreter {
            Some(interpreter) => format!("{} {}", interpreter, self.script.display()),
            None => self.script.display().to_string(),
        }
    }
}

#[async_trait]
impl InferenceBackend for ProcessBackend {
    fn name(&self) -> &'static str {
        "process"
    }

    #[instrument(skip(self), fields(program = %self.program()))]
    async fn infer(
        &self,
        kind: MediaKind,
        file_path: &Path,
    ) -> Result<DetectionOutcome, BackendError> {
        let output = self
            .command(kind, file_path)
            .output()
            .await
            .map_err(|source| BackendError::Launch {
                program: self.program(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none (terminated by signal)".to_string());
            return Err(BackendError::Exit { code, stderr });
        }

        if !stderr.is_empty() {
            debug!(stderr = %stderr, "Inference process diagnostics");
        }

        parse_output(kind, &output.stdout)
    }
}

fn parse_output(kind: MediaKind, stdout: &[u8]) -> Result<DetectionOutcome, BackendError> {
    let outcome: DetectionOutcome = match kind {
        MediaKind::Image => serde_json::from_slice::<DetectionResult>(stdout)?.into(),
        MediaKind::Video => serde_json::from_slice::<VideoDetectionResult>(stdout)?.into(),
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_by_kind() {
        let image = br#"{"fire_detected": false, "confidence": 0.12, "bounding_boxes": [],
            "metadata": {"processing_time": "0.4s", "model_version": "v2", "image_size": "640x480", "timestamp": "2025-08-17T10:00:00Z"}}"#;

        let outcome = parse_output(MediaKind::Image, image).unwrap();
        assert_eq!(outcome.media_kind(), MediaKind::Image);

        // An image document is not a valid video result
        assert!(matches!(
            parse_output(MediaKind::Video, image),
            Err(BackendError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_output_rejects_non_json() {
        assert!(matches!(
            parse_output(MediaKind::Image, b"Traceback (most recent call last):"),
            Err(BackendError::Parse(_))
        ));
    }

    #[test]
    fn test_program_description() {
        let backend = ProcessBackend::with_interpreter("python3", "/opt/ai/detect.py");
        assert_eq!(backend.program(), "python3 /opt/ai/detect.py");
        assert_eq!(backend.artifact(), Path::new("/opt/ai/detect.py"));
    }
}
