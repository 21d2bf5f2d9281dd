use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emberwatch_detection::{
    Config, DetectionError, DetectionOrchestrator, DetectionRequest, DetectionStore, MediaKind,
    PgDetectionStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "emberwatch-detection", version, about = "Fire and smoke detection service")]
struct Cli {
    /// Additional configuration file
    #[arg(long, env = "DETECTION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run detection on a stored image or video
    Detect {
        /// Path of the stored file
        path: PathBuf,
        /// Media kind; inferred from the extension when omitted
        #[arg(long)]
        kind: Option<MediaKind>,
        /// Original upload name; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Report service readiness
    Status,
    /// List recent detections
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Aggregate statistics over a trailing window
    Stats {
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
    },
    /// Show one persisted detection
    Record { id: Uuid },
    /// Create the detections table and indexes
    InitDb,
}

/// Envelope printed on stdout for every command
#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl<T: Serialize> Response<T> {
    fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
            code: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, &config.service.log_format);

    info!(service = %config.service.name, "Starting detection service");

    let store = Arc::new(
        PgDetectionStore::new(&config.database).context("Failed to configure database pool")?,
    );

    if let Err(e) = store.ping().await {
        warn!(error = %e, "Database unavailable, continuing without persistence");
    } else if config.database.ensure_schema {
        if let Err(e) = store.ensure_schema().await {
            warn!(error = %e, "Failed to ensure detections schema");
        }
    }

    let orchestrator = DetectionOrchestrator::from_config(&config.backend, store.clone());

    let outcome = tokio::select! {
        result = run(cli.command, &orchestrator, store.as_ref()) => result,
        _ = shutdown_signal() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    store.close().await;

    if let Err(e) = outcome {
        error!(error = %e, code = e.code(), "Command failed");
        print_json(&Response::<()> {
            success: false,
            data: None,
            message: None,
            error: Some(e.to_string()),
            code: Some(e.code()),
        })?;
        return Err(e.into());
    }

    Ok(())
}

async fn run(
    command: Command,
    orchestrator: &DetectionOrchestrator,
    store: &PgDetectionStore,
) -> Result<(), DetectionError> {
    match command {
        Command::Detect { path, kind, name } => {
            let request = build_request(&path, kind, name)?;
            let outcome = orchestrator.detect(request).await?;
            let message = outcome.summary();
            emit(&Response::ok(outcome, message))
        }
        Command::Status => emit(&Response::ok(
            orchestrator.status(),
            "Detection service status",
        )),
        Command::History { limit } => {
            let history = orchestrator.history(limit).await;
            let message = format!("Retrieved {} recent detections", history.len());
            emit(&Response::ok(history, message))
        }
        Command::Stats { days } => {
            let stats = orchestrator.stats(days).await;
            emit(&Response::ok(
                stats,
                format!("Detection statistics for the last {} days", days),
            ))
        }
        Command::Record { id } => {
            let record = orchestrator.record(id).await?;
            emit(&Response::ok(record, "Detection record"))
        }
        Command::InitDb => {
            store
                .ensure_schema()
                .await
                .map_err(|e| DetectionError::Internal(e.to_string()))?;
            emit(&Response::ok((), "Database schema initialized"))
        }
    }
}

/// Validate CLI input into a detection request
fn build_request(
    path: &Path,
    kind: Option<MediaKind>,
    name: Option<String>,
) -> Result<DetectionRequest, DetectionError> {
    let file_path = path
        .canonicalize()
        .map_err(|e| DetectionError::Validation(format!("{}: {}", path.display(), e)))?;

    if !file_path.is_file() {
        return Err(DetectionError::Validation(format!(
            "{} is not a regular file",
            file_path.display()
        )));
    }

    let media_kind = match kind.or_else(|| MediaKind::from_path(&file_path)) {
        Some(kind) => kind,
        None => {
            return Err(DetectionError::Validation(format!(
                "Unsupported file type: {}",
                file_path.display()
            )))
        }
    };

    let original_filename = name
        .or_else(|| {
            file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string());

    Ok(DetectionRequest::new(media_kind, file_path, original_filename))
}

fn emit<T: Serialize>(response: &Response<T>) -> Result<(), DetectionError> {
    print_json(response).map_err(|e| DetectionError::Internal(e.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Initialize tracing/logging on stderr
fn init_tracing(log_level: &str, log_format: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
///
/// An inference process still running at this point is left to finish on
/// its own.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parses_detect() {
        let cli = Cli::try_parse_from([
            "emberwatch-detection",
            "detect",
            "/tmp/forest.jpg",
            "--kind",
            "image",
        ])
        .unwrap();

        match cli.command {
            Command::Detect { kind, .. } => assert_eq!(kind, Some(MediaKind::Image)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_zero_day_window() {
        assert!(Cli::try_parse_from(["emberwatch-detection", "stats", "--days", "0"]).is_err());
    }

    #[test]
    fn test_build_request_infers_kind_and_name() {
        let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        file.write_all(b"\0\0\0\x18ftypmp42").unwrap();

        let request = build_request(file.path(), None, None).unwrap();

        assert_eq!(request.media_kind, MediaKind::Video);
        assert!(request.file_path.is_absolute());
        assert!(request.original_filename.ends_with(".mp4"));
    }

    #[test]
    fn test_build_request_validation_errors() {
        let missing = build_request(Path::new("/nonexistent/fire.jpg"), None, None);
        assert!(matches!(missing, Err(DetectionError::Validation(_))));

        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let unsupported = build_request(file.path(), None, Some("notes.txt".into()));
        assert!(matches!(unsupported, Err(DetectionError::Validation(_))));
    }
}
