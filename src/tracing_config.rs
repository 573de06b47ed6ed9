//! Tracing subscriber configuration for the server binary
//!
//! The library only emits events; the binary decides where they go.

use std::{fmt, str::FromStr};

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Compact human-readable output with colors
    #[default]
    Console,
    /// Compact output without ANSI colors, for CI and log collectors
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

impl fmt::Display for TracingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracingFormat::Console => write!(f, "console"),
            TracingFormat::Compact => write!(f, "compact"),
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(TracingFormat::Console),
            "compact" => Ok(TracingFormat::Compact),
            #[cfg(feature = "tracing-json")]
            "json" => Ok(TracingFormat::Json),
            #[cfg(not(feature = "tracing-json"))]
            "json" => Err("JSON logging requires the 'tracing-json' feature".to_string()),
            other => Err(format!(
                "Unknown log format '{other}'. Available: console, compact, json"
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v` flags
    pub verbosity: u8,
    pub format: TracingFormat,
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directive for the configured verbosity.
    ///
    /// ONNX Runtime is held at `warn` below `-vv`; its info output is per-node.
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info,ort=warn",
            1 => "debug,ort=warn",
            _ => "trace",
        }
    }

    /// Resolve the filter directive: a non-blank `RUST_LOG` wins over verbosity
    pub fn filter_directive(&self, rust_log: Option<&str>) -> String {
        rust_log
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.verbosity_to_filter())
            .to_string()
    }

    /// Install the global subscriber
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = EnvFilter::try_new(self.filter_directive(rust_log.as_deref()))?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();

                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .compact();

                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);

                registry.with(fmt_layer).try_init()?;
            },
        }

        Ok(())
    }
}
