//! Tracing subscriber setup.
//!
//! Console output always goes to stderr: with the stdio link, stdout carries
//! protocol lines. An optional JSON-lines file is added from `[logging]`.

use std::path::Path;

use sorter_config::Logging;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

/// Filter precedence: `RUST_LOG`, then `--log-level`, then `[logging].level`, then `info`.
fn env_filter(cli_level: Option<&str>, logging: &Logging) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = cli_level
            .or(logging.level.as_deref())
            .unwrap_or("info");
        EnvFilter::new(level)
    })
}

fn file_writer(logging: &Logging) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let path = Path::new(logging.file.as_deref()?);
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path.file_name()?;
    let appender = match logging.rotation.as_deref() {
        Some("daily") => tracing_appender::rolling::daily(dir, name),
        Some("hourly") => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(writer)
}

pub fn init_tracing(cli_level: Option<&str>, json: bool, logging: &Logging) -> eyre::Result<()> {
    let file_layer = file_writer(logging)
        .map(|w| fmt::layer().json().with_ansi(false).with_writer(w));
    let registry = tracing_subscriber::registry()
        .with(env_filter(cli_level, logging))
        .with(file_layer);

    let res = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    res.map_err(|e| eyre::eyre!("init tracing: {e}"))
}
