use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with file-based logging.
/// Logs are written to ~/.config/fairydust/logs/fairydust-YYYY-MM-DD-HH-MM-SS.log
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logging() -> Result<(PathBuf, WorkerGuard)> {
    let logs_dir = dirs::config_dir()
        .ok_or(anyhow::anyhow!("Could not find config directory"))?
        .join("fairydust")
        .join("logs");
    std::fs::create_dir_all(&logs_dir)?;

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_filename = format!("fairydust-{}.log", timestamp);
    let log_path = logs_dir.join(&log_filename);

    let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()?;

    Ok((log_path, guard))
}

/// Initialize tracing on stderr, for hosts that own a console.
pub fn init_stderr_logging() -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}

/// Defaults to INFO, overridable with RUST_LOG.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
