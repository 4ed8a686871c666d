//! Tracing setup for the `dream` binary.
//!
//! Every event goes to stdout and to `<log_dir>/dream.log`. `RUST_LOG`
//! overrides the default `info` filter; `RUST_LOG=dream=debug` shows each
//! line as it crosses the wire.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "dream.log";
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// Keep the returned guard alive until exit, or buffered file output is lost.
pub fn init(log_dir: impl AsRef<Path>) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(log_dir.as_ref(), LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    guard
}
