use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::time::Duration;
use tokio::time::Instant;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Output options for [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Directory for log files (e.g., "logs")
    pub log_dir: &'a str,
    /// Prefix for log files (e.g., "mmo-pilot")
    pub log_prefix: &'a str,
    /// Use debug level instead of info
    pub debug_mode: bool,
    /// Also log to the console
    pub console_output: bool,
    /// Write the file log as JSON lines
    pub json_file: bool,
}

/// Build the level filter.
///
/// `RUST_LOG` wins when set; otherwise debug mode selects `debug`, else `info`.
/// chromiumoxide logs every unknown CDP message at warn level, so it is
/// capped at error unless the environment says otherwise.
fn level_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug_mode { "debug" } else { "info" };
        EnvFilter::new(format!("{level},chromiumoxide=error"))
    })
}

/// Setup logging with a daily rotating file appender and optional console output.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(options: &LogOptions<'_>) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // Create log directory if it doesn't exist
    let log_path = Utf8Path::new(options.log_dir);
    if !log_path.exists() {
        fs::create_dir_all(log_path)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }

    // Create daily rotating file appender
    let file_appender = rolling::daily(options.log_dir, options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if options.json_file {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(level_filter(options.debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output,
        options.json_file
    );

    Ok(guard)
}

/// Window in which a repeated status message is logged only once.
pub const REPEAT_WINDOW: Duration = Duration::from_secs(2);

/// Suppresses identical messages emitted in quick succession.
///
/// The dispatcher reports the same waiting state on every tick; this keeps
/// one line per window instead of one per tick.
#[derive(Debug, Clone)]
pub struct RepeatFilter {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl RepeatFilter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether `message` should be logged now.
    pub fn should_emit(&mut self, message: &str) -> bool {
        let now = Instant::now();
        if let Some((last, at)) = &self.last {
            if last == message && now.duration_since(*at) < self.window {
                return false;
            }
        }
        self.last = Some((message.to_string(), now));
        true
    }
}

impl Default for RepeatFilter {
    fn default() -> Self {
        Self::new(REPEAT_WINDOW)
    }
}
