use std::fs;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AppResult;

const LOG_FILE_PREFIX: &str = "gateway.log";

/// Initialize logger system.
///
/// Console output is always on. When `log_dir` is given a daily rolling file
/// layer is added; the returned guard must be held until exit so buffered
/// lines are flushed.
pub fn init_logger(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Capture log macro logs (reqwest / hyper internals)
    let _ = tracing_log::LogTracer::init();

    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    let (file_layer, guard) = match log_dir.map(prepare_log_dir) {
        Some(Ok(dir)) => {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true);
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Failed to initialize log directory: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    // Default to INFO and above
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init so a second call (tests) does not panic
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if guard.is_some() {
        info!("Logger system initialized (Console + File Persistence)");
    } else {
        info!("Logger system initialized (Console)");
    }

    guard
}

fn prepare_log_dir(dir: &Path) -> AppResult<&Path> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(dir)
}
