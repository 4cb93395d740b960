//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always on. When a log directory is configured, a second
//! layer writes plain-text lines to a daily-rotating file in that directory.
//! `RUST_LOG` overrides the level passed in.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Call once at program start, before any component is built.
///
/// - `log_level`: default filter if `RUST_LOG` is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: log file prefix (e.g. `"market-pricing"`)
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::daily(dir, module_name))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
    });

    tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();
}
