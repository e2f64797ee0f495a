//! statushub - status synchronization hub
//!
//! Main entry point serving one observer over stdin/stdout.
//!
//! # Overview
//!
//! Each stdin line is a JSON message. Lines typed `Progress` feed the
//! preprocess monitor; every other line goes through the HMI router. Everything
//! the hub pushes to the observer (status, vehicle parameters, notifications)
//! is written to stdout, one JSON document per line. Logs go to `logs/` and
//! stderr.
//!
//! # Execution Flow
//!
//! 1. Load `conf/statushub.yaml` (plus `STATUSHUB__*` overrides)
//! 2. Initialize logging → logs/statushub.<date>
//! 3. Create tokio runtime with 4 worker threads
//! 4. Assemble the hub; a broken preprocess table aborts startup
//! 5. Serve stdin until EOF
//! 6. Shutdown tokio runtime with 5s timeout, log metrics

use anyhow::{Context, Result};
use serde_json::Value;
use statushub::hmi::{ChannelObserver, Observer, typed_json};
use statushub::logging::{self, LogOptions};
use statushub::monitors::{Progress, spawn_progress_listener};
use statushub::{APP_NAME, ConfigManager, Hmi, HubConfig, Metrics, VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};

/// Inbound line type carrying a progress event
const PROGRESS_TYPE: &str = "Progress";

/// Envelope name of forwarded notifications
const MONITOR_MESSAGE_TYPE: &str = "MonitorMessage";

/// Main entry point
///
/// # Errors
///
/// This function can fail if:
/// - The hub config is invalid YAML or has wrongly typed fields
/// - Logging initialization fails (disk space, permissions)
/// - The preprocess table cannot be loaded
/// - stdin or stdout fail
fn main() -> Result<()> {
    let config_manager = ConfigManager::new("conf")?;
    let config = config_manager.load_hub_config()?;

    let _guard = logging::setup_logging_with(&LogOptions {
        log_dir: &config.log_dir,
        log_prefix: &config.log_prefix,
        debug_mode: config.debug_mode,
        console_output: config.console_logging,
        json: config.log_json,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("statushub-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 4);

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(serve_stdio(config, Arc::clone(&metrics)));

    runtime.shutdown_timeout(Duration::from_secs(5));
    metrics.log_summary();

    tracing::info!("Shutdown complete");

    result.inspect_err(|e| tracing::error!("Fatal: {:#}", e))
}

async fn serve_stdio(config: HubConfig, metrics: Arc<Metrics>) -> Result<()> {
    let (hmi, preprocess) = Hmi::from_config(&config, metrics)?;

    let (progress_tx, progress_rx) = mpsc::channel(config.progress_channel_capacity.max(1));
    let listener = spawn_progress_listener(preprocess, progress_rx);

    let (observer, mut outbound) = ChannelObserver::new();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = outbound.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut notifications = hmi.notifier().subscribe();
    let notification_observer = Arc::clone(&observer);
    let forwarder = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(message) => match typed_json(MONITOR_MESSAGE_TYPE, &message) {
                    Ok(payload) => {
                        if notification_observer.send(&payload).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to serialize notification: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} notifications", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    hmi.connect(observer.clone());
    tracing::info!("Serving {} on stdin/stdout", observer.id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(progress) = parse_progress(line) {
            if progress_tx.send(progress).await.is_err() {
                tracing::warn!("Progress listener is gone");
            }
            continue;
        }

        // Rejections are already logged and notified by the router
        let _ = hmi.handle_message(observer.as_ref(), line);
    }

    tracing::info!("stdin closed, stopping");
    hmi.disconnect(observer.id());
    forwarder.abort();
    drop(observer);
    drop(hmi);

    drop(progress_tx);
    if let Err(e) = listener.await {
        tracing::error!("Progress listener failed: {}", e);
    }

    match writer.await {
        Ok(result) => result.context("Failed to write stdout"),
        Err(e) => Err(e).context("Writer task failed"),
    }
}

/// Decode a `{"type":"Progress","percentage":..,"logString":..}` line.
fn parse_progress(line: &str) -> Option<Progress> {
    let json: Value = serde_json::from_str(line).ok()?;
    if json.get("type").and_then(Value::as_str) != Some(PROGRESS_TYPE) {
        return None;
    }
    match serde_json::from_value(json) {
        Ok(progress) => Some(progress),
        Err(e) => {
            tracing::warn!("Malformed progress event: {}", e);
            None
        }
    }
}
