#![warn(missing_docs)]
//! # Structured logging for cortex
//!
//! Libraries in this workspace only emit [`tracing`] events. Binaries call
//! [`init_fmt`] once at start up, tests call [`test_run`].
//!
//! ## Filtering
//! The filter is read from `RUST_LOG`:
//! ```bash
//! RUST_LOG='cortex_executor[task{task_id="42"}]=trace' cortex ...
//! ```
//! Without `RUST_LOG` only errors are shown, plus the authorization audit
//! lines (`cortex_auth=warn`), which operators expect to see by default.
//! `CORTEX_FILTER` replaces the whole filter and complains if it does not
//! parse.
//!
//! ## Json
//! `--structured Json` prints every event as one json object per line,
//! including the stack of spans it was emitted in:
//! ```json
//! {"time":"2024-03-03T08:07:05.910Z","level":"ERROR","target":"cortex_executor::processor","file":"crates/cortex_executor/src/processor.rs","line":147,"fields":{"stage":"Failed","failed_at":"ProxyReady","err":"Task 42 failed: no such job"},"spans":[{"name":"task","target":"cortex_executor::processor","fields":{"task_id":"42"}}]}
//! ```

use tracing::Subscriber;
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{
        format::{DefaultFields, FmtSpan, Format},
        time::UtcTime,
        MakeWriter,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

use derive_more::Display;
use std::str::FromStr;

mod fmt;

use fmt::FormatEvent;
pub use tracing;

/// Environment variable that replaces the standard filter entirely.
pub const FILTER_OVERRIDE_VAR: &str = "CORTEX_FILTER";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
/// Sets the kind of structured logging output you want
pub enum Output {
    /// More compact version of [`Output::Log`]
    Compact,
    /// Outputs everything as json
    Json,
    /// Regular logging (default)
    #[default]
    Log,
    /// Regular logging plus timed spans
    LogTimed,
    /// No logging to console
    None,
}

/// ParseError is a String
pub type ParseError = String;

impl FromStr for Output {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Compact" => Ok(Output::Compact),
            "Json" => Ok(Output::Json),
            "Log" => Ok(Output::Log),
            "LogTimed" => Ok(Output::LogTimed),
            "None" => Ok(Output::None),
            _ => Err("Could not parse log output type".into()),
        }
    }
}

/// Run logging in a unit test.
///
/// RUST_LOG must be set or this is a no-op.
pub fn test_run() -> Result<(), errors::TracingError> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    init_fmt(Output::Log)
}

/// Same as test_run but with timed spans
pub fn test_run_timed() -> Result<(), errors::TracingError> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    init_fmt(Output::LogTimed)
}

/// Build the canonical filter based on env
pub fn standard_filter() -> Result<EnvFilter, errors::TracingError> {
    let mut filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::from_default_env().add_directive("cortex_auth=warn".parse()?),
    };
    if std::env::var(FILTER_OVERRIDE_VAR).is_ok() {
        EnvFilter::try_from_env(FILTER_OVERRIDE_VAR)
            .map_err(|e| eprintln!("Failed to parse {}: {:?}", FILTER_OVERRIDE_VAR, e))
            .map(|f| {
                filter = f;
            })
            .ok();
    }
    Ok(filter)
}

/// Return a layer directly, for times when you need more control over the
/// produced subscriber
pub fn standard_layer_unfiltered<W, S>(
    writer: W,
) -> tracing_subscriber::fmt::Layer<S, DefaultFields, Format, W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    S: Subscriber + Send + Sync + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::Layer::default()
        .with_writer(writer)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
}

/// The standard layer with the standard filter applied
pub fn standard_layer<W, S>(writer: W) -> Result<impl Layer<S>, errors::TracingError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    S: Subscriber + Send + Sync + for<'span> LookupSpan<'span>,
{
    let filter = standard_filter()?;
    Ok(standard_layer_unfiltered(writer).with_filter(filter))
}

/// This checks RUST_LOG for a filter but doesn't complain if there is none or it doesn't parse.
/// It then checks for CORTEX_FILTER which if set will output an error if it doesn't parse.
pub fn init_fmt(output: Output) -> Result<(), errors::TracingError> {
    init_fmt_with_opts(output, std::io::stderr)
}

fn init_fmt_with_opts<W>(output: Output, writer: W) -> Result<(), errors::TracingError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = standard_filter()?;

    match output {
        Output::Json => Registry::default()
            .with(
                standard_layer_unfiltered(writer)
                    .with_timer(UtcTime::rfc_3339())
                    .json()
                    .event_format(FormatEvent)
                    .with_filter(filter),
            )
            .try_init()?,

        Output::Log => Registry::default()
            .with(standard_layer_unfiltered(writer).with_filter(filter))
            .try_init()?,

        Output::LogTimed => Registry::default()
            .with(
                standard_layer_unfiltered(writer)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_filter(filter),
            )
            .try_init()?,

        Output::Compact => Registry::default()
            .with(standard_layer_unfiltered(writer).compact().with_filter(filter))
            .try_init()?,

        Output::None => (),
    };
    Ok(())
}

pub mod errors {
    //! Error in the tracing/logging framework

    use thiserror::Error;

    /// Error in the tracing/logging framework
    #[allow(missing_docs)] // should be self-explanatory
    #[derive(Error, Debug)]
    pub enum TracingError {
        #[error(transparent)]
        SetGlobal(#[from] tracing_subscriber::util::TryInitError),
        #[error(transparent)]
        BadDirective(#[from] tracing_subscriber::filter::ParseError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Json" => Ok(Output::Json))]
    #[test_case("Compact" => Ok(Output::Compact))]
    #[test_case("None" => Ok(Output::None))]
    #[test_case("json" => Err("Could not parse log output type".to_string()))]
    fn parses_output(s: &str) -> Result<Output, ParseError> {
        s.parse()
    }

    #[test]
    fn output_round_trips_through_display() {
        for output in [Output::Compact, Output::Json, Output::Log, Output::LogTimed] {
            assert_eq!(output.to_string().parse::<Output>(), Ok(output));
        }
    }

    #[test]
    fn standard_filter_builds_without_env() {
        assert!(standard_filter().is_ok());
    }
}
