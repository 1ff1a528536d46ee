// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line format for the output.
//!
//! ```text
//! COLLECTOR | LEVEL | [span{fields}: ] message fields
//! ```

use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::LoggerError;

/// Prefixes every line with `COLLECTOR` so output logs can be told apart from the host's.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "COLLECTOR | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Builds the filter used for the global subscriber. Noisy transport crates are silenced.
pub fn env_filter(log_level: &str) -> Result<EnvFilter, LoggerError> {
    let directives = format!("h2=off,hyper=off,rustls=off,{log_level}");
    EnvFilter::try_new(directives).map_err(|source| LoggerError::Filter {
        level: log_level.to_string(),
        source,
    })
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(log_level: &str) -> Result<(), LoggerError> {
    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(log_level)?)
        .with_ansi(false)
        .event_format(Formatter)
        .finish()
        .try_init()?;
    tracing::debug!("Logging subsystem enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(level: &str, f: impl FnOnce()) -> String {
        let buffer = Capture::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(env_filter(level).unwrap())
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_format_plain_event() {
        let output = capture("info", || tracing::info!(count = 3, "sent events"));
        assert_eq!(output, "COLLECTOR | INFO | sent events count=3\n");
    }

    #[test]
    fn test_format_includes_spans() {
        let output = capture("debug", || {
            let span = tracing::info_span!("publish", host = "collector");
            let _entered = span.enter();
            tracing::warn!("retrying");
        });
        assert_eq!(output, "COLLECTOR | WARN | publish{host=\"collector\"}: retrying\n");
    }

    #[test]
    fn test_filter_drops_lower_levels() {
        let output = capture("warn", || tracing::info!("hidden"));
        assert!(output.is_empty());
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            env_filter("collector=verbose"),
            Err(LoggerError::Filter { .. })
        ));
    }
}
