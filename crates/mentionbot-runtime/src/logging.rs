//! Installs the global `tracing` subscriber from [`LoggingConfig`].
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().load()?;
//! mentionbot_runtime::logging::init_from_config(&config.logging);
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level. Per-target
//! `filters` are added on top either way.

use std::ffi::OsStr;
use std::path::Path;

use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "mentionbot.log";

/// Installs the subscriber. Does nothing if one is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = try_init_from_config(config);
}

pub fn try_init_from_config(config: &LoggingConfig) -> Result<(), TryInitError> {
    let (writer, missing_file) = make_writer(config);
    let result = Registry::default()
        .with(format_layer(config, writer))
        .with(env_filter(config))
        .try_init();
    if missing_file {
        warn!("Log output is 'file' but no file_path is set, logging to stdout");
    }
    result
}

/// Returns the writer and whether a file was asked for without a path.
fn make_writer(config: &LoggingConfig) -> (BoxMakeWriter, bool) {
    match (config.output, &config.file_path) {
        (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
        (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
        (LogOutput::File, Some(path)) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
            (BoxMakeWriter::new(tracing_appender::rolling::never(dir, name)), false)
        }
        (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stdout), true),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn format_layer(config: &LoggingConfig, writer: BoxMakeWriter) -> BoxedLayer {
    let base = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_mask(&config.span_events))
        .with_thread_ids(config.thread_ids)
        .with_file(config.file_location)
        .with_line_number(config.file_location);

    match config.format {
        LogFormat::Full => base.boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        #[cfg(feature = "json-log")]
        LogFormat::Json => base.json().boxed(),
        // Json without the feature falls through to compact.
        _ => base.compact().boxed(),
    }
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    for directive in target_directives(config) {
        match directive.parse() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(err) => eprintln!("Ignoring log filter '{directive}': {err}"),
        }
    }
    filter
}

/// `target=level` strings, sorted by target.
fn target_directives(config: &LoggingConfig) -> Vec<String> {
    let mut targets: Vec<_> = config.filters.iter().collect();
    targets.sort_by(|a, b| a.0.cmp(b.0));
    targets
        .into_iter()
        .map(|(target, level)| format!("{target}={level}"))
        .collect()
}

fn span_mask(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(FmtSpan::NONE, |mask, (_, bit)| mask | bit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_target_directives_are_sorted() {
        let mut config = LoggingConfig::default();
        config.filters.insert("mentionbot_runtime".into(), LogLevel::Debug);
        config.filters.insert("mentionbot_framework".into(), LogLevel::Trace);

        assert_eq!(
            target_directives(&config),
            ["mentionbot_framework=trace", "mentionbot_runtime=debug"]
        );
        assert!(target_directives(&LoggingConfig::default()).is_empty());
    }

    #[test]
    fn test_span_mask() {
        assert_eq!(span_mask(&SpanEventConfig::default()), FmtSpan::NONE);
        let lifecycle = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(span_mask(&lifecycle), FmtSpan::NEW | FmtSpan::CLOSE);
    }

    #[test]
    fn test_file_output_without_path_falls_back() {
        let config = LoggingConfig {
            output: LogOutput::File,
            ..Default::default()
        };
        assert!(make_writer(&config).1);

        let config = LoggingConfig {
            output: LogOutput::File,
            file_path: Some(std::env::temp_dir().join("mentionbot-test.log")),
            ..Default::default()
        };
        assert!(!make_writer(&config).1);
        assert!(!make_writer(&LoggingConfig::default()).1);
    }
}
