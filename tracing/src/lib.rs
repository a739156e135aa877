//! Subscriber setup shared by the fotree binaries.

use indicatif::ProgressStyle;
use tracing::Level;
use tracing_indicatif::{filter::IndicatifFilter, writer, IndicatifLayer, IndicatifWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Spinner shown for spans carrying the `indicatif.pb_show` field.
pub const PB_SPINNER_TEMPLATE: &str = "{span_child_prefix}{spinner} {wide_msg} ({elapsed})";

pub fn spinner_style() -> Result<ProgressStyle, Error> {
    Ok(ProgressStyle::with_template(PB_SPINNER_TEMPLATE)?)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] tracing_subscriber::filter::FromEnvError),

    #[error("invalid progress template: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

/// Returned by [TracingBuilder::build], keeps access to the output that
/// has to coexist with progress spinners.
#[derive(Clone)]
pub struct TracingHandle {
    stdout_writer: IndicatifWriter<writer::Stdout>,
}

impl TracingHandle {
    /// Stdout, suspending spinners while a line is written.
    /// Source trees must be printed through this, not `println!`.
    pub fn get_stdout_writer(&self) -> IndicatifWriter<writer::Stdout> {
        self.stdout_writer.clone()
    }
}

pub struct TracingBuilder {
    level: Level,
    progress_bar: bool,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            progress_bar: false,
        }
    }
}

impl TracingBuilder {
    /// The default level. Directives in RUST_LOG take precedence.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Shows spinners for long-running spans. Off by default.
    pub fn enable_progressbar(mut self) -> TracingBuilder {
        self.progress_bar = true;
        self
    }

    /// Installs the global subscriber: compact log lines on stderr, filtered
    /// by level and RUST_LOG, plus the optional spinner layer.
    pub fn build(self) -> Result<TracingHandle, Error> {
        let indicatif_layer = IndicatifLayer::new().with_progress_style(spinner_style()?);
        let stdout_writer = indicatif_layer.get_stdout_writer();

        let filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?;

        let fmt_layer = tracing_subscriber::fmt::Layer::new()
            .with_writer(indicatif_layer.get_stderr_writer())
            .with_target(false)
            .compact();

        // spans opt in to a spinner through the indicatif.pb_show field
        let progress_layer = self
            .progress_bar
            .then(|| indicatif_layer.with_filter(IndicatifFilter::new(false)));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(progress_layer)
            .try_init()?;

        Ok(TracingHandle { stdout_writer })
    }
}

#[cfg(test)]
mod tests {
    use super::spinner_style;

    #[test]
    fn spinner_template_is_valid() {
        spinner_style().expect("spinner template");
    }
}
