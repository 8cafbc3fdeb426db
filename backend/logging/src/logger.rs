//! Structured Logger
//!
//! Console output for operators plus a daily-rotated NDJSON file, filtered by
//! `RUST_LOG` when set and by the configured level otherwise.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix inside the log directory; the appender adds `.YYYY-MM-DD`.
pub const LOG_FILE_NAME: &str = "agentforge.log";

/// Initialize the global subscriber. Calling it again is a no-op.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    // Console goes to stderr so command output on stdout stays machine-readable.
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
