use anyhow::Result;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Console output style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse the `logging.format` setting; anything but "json" is text.
    #[must_use]
    pub fn from_setting(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Initialize structured logging system
///
/// Keep the returned guard alive for as long as the file layer should flush.
pub fn init_logging(log_level: Option<&str>, log_file: Option<&Path>, format: LogFormat) -> Result<Option<WorkerGuard>> {
    // Set up environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = log_level.unwrap_or("info");
            EnvFilter::try_new(level)
        })
        .map_err(|e| anyhow::anyhow!("Failed to create log filter: {}", e))?;

    // Create registry
    let registry = Registry::default().with(env_filter);

    // Add console layer
    let console_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json()
            .boxed(),
    };

    // Add file layer if log file is specified
    let guard = if let Some(log_path) = log_file {
        let directory = log_path.parent().unwrap_or(Path::new("."));
        let file_name = log_path
            .file_name()
            .map_or_else(|| "citycare.log".into(), |n| n.to_string_lossy().into_owned());
        let file_appender = rolling::daily(directory, file_name);
        let (non_blocking_appender, guard) = non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .json();

        registry
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install subscriber: {}", e))?;
        Some(guard)
    } else {
        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install subscriber: {}", e))?;
        None
    };

    info!("Logging system initialized");
    Ok(guard)
}

/// Performance timing utilities
pub struct OperationTimer {
    operation: &'static str,
    start: std::time::Instant,
    finished: bool,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: std::time::Instant::now(),
            finished: false,
        }
    }

    pub fn finish(mut self) -> u128 {
        self.finished = true;
        let duration = self.start.elapsed().as_millis();
        tracing::info!(
            operation = self.operation,
            duration_ms = duration,
            "Operation completed"
        );
        duration
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished && !std::thread::panicking() {
            let duration = self.start.elapsed().as_millis();
            tracing::debug!(
                operation = self.operation,
                duration_ms = duration,
                "Operation finished"
            );
        }
    }
}
