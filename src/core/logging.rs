use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "ragserve.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber: stdout, plus a daily-rolling file under
/// `config.dir` unless disabled or the directory cannot be created.
pub fn init(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(false);

    let mut dir_error = None;
    let file_layer = if config.file {
        match std::fs::create_dir_all(&config.dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = LOG_GUARD.set(guard);
                Some(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
            }
            Err(err) => {
                dir_error = Some(err);
                None
            }
        }
    } else {
        None
    };

    // a subscriber may already be installed (tests)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    if let Some(err) = dir_error {
        tracing::warn!(
            "Cannot create log directory {}: {}; logging to stdout only",
            config.dir.display(),
            err
        );
    }
}
