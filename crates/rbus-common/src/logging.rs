//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Shared primitives and utilities for the node runtime."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "RBUS_LOG";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static CONSOLE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Console stream receiving log output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    #[default]
    Stdout,
    Stderr,
}

/// Install the global subscriber: a console layer on the configured stream
/// plus a daily-rolling JSON file under `config.directory`.
///
/// The filter comes from `RBUS_LOG`, then `RUST_LOG`, then `info`. Calling
/// this twice keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(daily(
        &config.directory,
        format!("{prefix}-{service_name}.log"),
    ));
    let (console_writer, console_guard) = console_writer(config.stream);
    let _ = FILE_GUARD.set(file_guard);
    let _ = CONSOLE_GUARD.set(console_guard);

    let file_layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    tracing_subscriber::registry()
        .with(log_filter())
        .with(console_layer(config.format, console_writer))
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        stream = ?config.stream,
        "tracing initialised"
    );
    Ok(())
}

fn log_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("ignoring {LOG_ENV}={directive:?} ({err}); logging at info");
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn console_writer(stream: LogStream) -> (NonBlocking, WorkerGuard) {
    match stream {
        LogStream::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogStream::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    }
}

fn console_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span> + 'static,
{
    let layer = fmt::layer().with_timer(fmt::time::UtcTime::rfc_3339());
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().with_writer(writer).boxed(),
        LogFormat::Pretty => layer.with_writer(writer).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_streams_use_config_spellings() {
        let format: LogFormat = serde_json::from_str("\"structured-json\"").expect("format");
        assert_eq!(format, LogFormat::StructuredJson);
        let stream: LogStream = serde_json::from_str("\"stderr\"").expect("stream");
        assert_eq!(stream, LogStream::Stderr);
    }

    #[test]
    fn init_writes_under_the_configured_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            stream: LogStream::Stderr,
            ..LoggingConfig::default()
        };
        init_tracing("rbus-test", &config).expect("init");
        init_tracing("rbus-test", &config).expect("second init is harmless");
        assert!(config.directory.is_dir());
    }
}
