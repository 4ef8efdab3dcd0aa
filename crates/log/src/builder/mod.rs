//! Logger builder
//!
//! The subscriber is a [`Registry`] with the filter layer (optionally
//! reloadable, see `reload`) followed by one boxed fmt layer per format.

mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{Config, DisplayConfig, Format};
use crate::error::{LogError, LogResult};

type Filtered = Layered<Box<dyn Layer<Registry> + Send + Sync + 'static>, Registry>;
type FmtLayer = Box<dyn Layer<Filtered> + Send + Sync + 'static>;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
    test_writer: bool,
}

/// Guard returned by a successful init.
///
/// Holds the reload handle when the config asked for one.
#[derive(Debug)]
pub struct LoggerGuard {
    reload: Option<ReloadHandle>,
}

impl LoggerGuard {
    /// Handle for runtime filter changes, if the logger is reloadable
    #[must_use]
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.reload.as_ref()
    }
}

/// Apply the display options shared by every format and box the layer.
macro_rules! finish_fmt_layer {
    ($layer:expr, $display:expr) => {{
        let layer = $layer
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source);
        if $display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

fn create_fmt_layer<W>(format: Format, display: &DisplayConfig, writer: W) -> FmtLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        Format::Pretty => finish_fmt_layer!(fmt::layer().pretty().with_writer(writer), display),
        Format::Compact => finish_fmt_layer!(fmt::layer().compact().with_writer(writer), display),
        Format::Json => finish_fmt_layer!(
            fmt::layer()
                .json()
                .with_current_span(true)
                .flatten_event(display.flatten)
                .with_writer(writer),
            display
        ),
    }
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            test_writer: false,
        }
    }

    /// Write through the test harness so output is captured per test
    #[must_use]
    pub fn with_test_writer(mut self) -> Self {
        self.test_writer = true;
        self
    }

    /// Build and install the logger as the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            filter: self.config.level.clone(),
            reason: e.to_string(),
        })?;

        let (filter_layer, reload) =
            reload::create_filter_layer(filter, &self.config.level, self.config.reloadable);

        let fmt_layer = if self.test_writer {
            create_fmt_layer(self.config.format, &self.config.display, fmt::TestWriter::new)
        } else {
            create_fmt_layer(self.config.format, &self.config.display, std::io::stderr)
        };

        Registry::default()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        Ok(LoggerGuard { reload })
    }
}
