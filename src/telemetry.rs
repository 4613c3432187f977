//! Structured Logging Setup
//!
//! `TigerStyle`: Optional logging with graceful fallback. Never panics if
//! a subscriber is already installed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tunestore::telemetry::{LoggingConfig, init_logging};
//!
//! // Initialize with defaults (reads RUST_LOG)
//! init_logging(LoggingConfig::default()).expect("logging init");
//!
//! // Or configure explicitly
//! let config = LoggingConfig::builder()
//!     .default_directive("tunestore=debug")
//!     .with_target(false)
//!     .build();
//! init_logging(config).expect("logging init");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Filter directives, overriding the configured default

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Logging configuration errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Initialization failed
    #[error("logging initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure
        reason: String,
    },

    /// Invalid filter directive
    #[error("invalid filter directive: {directive}")]
    InvalidDirective {
        /// The rejected directive string
        directive: String,
    },
}

/// Result type for logging setup
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Configuration for the tracing subscriber
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter applied when `RUST_LOG` is unset
    pub default_directive: String,

    /// Include the event target (module path) in output
    pub with_target: bool,

    /// Include span timing in output
    pub with_timing: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_directive: "tunestore=info".to_string(),
            with_target: true,
            with_timing: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new builder for `LoggingConfig`
    #[must_use]
    pub fn builder() -> LoggingConfigBuilder {
        LoggingConfigBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        if self.default_directive.is_empty() {
            return Err(TelemetryError::InvalidDirective {
                directive: "default_directive cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for `LoggingConfig`
#[derive(Default)]
pub struct LoggingConfigBuilder {
    default_directive: Option<String>,
    with_target: Option<bool>,
    with_timing: Option<bool>,
}

impl LoggingConfigBuilder {
    /// Set the filter used when `RUST_LOG` is unset
    #[must_use]
    pub fn default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = Some(directive.into());
        self
    }

    /// Toggle event targets in output
    #[must_use]
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = Some(enabled);
        self
    }

    /// Toggle span timing in output
    #[must_use]
    pub fn with_timing(mut self, enabled: bool) -> Self {
        self.with_timing = Some(enabled);
        self
    }

    /// Build the `LoggingConfig`
    #[must_use]
    pub fn build(self) -> LoggingConfig {
        let default = LoggingConfig::default();
        LoggingConfig {
            default_directive: self.default_directive.unwrap_or(default.default_directive),
            with_target: self.with_target.unwrap_or(default.with_target),
            with_timing: self.with_timing.unwrap_or(default.with_timing),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured default directive.
/// Safe to call more than once: a second call is a no-op rather than a
/// panic, so tests and embedding applications can both initialize freely.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidDirective` if the configured directive
/// does not parse.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.default_directive).map_err(|e| {
            TelemetryError::InvalidDirective {
                directive: format!("{}: {e}", config.default_directive),
            }
        })
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = if config.with_timing {
        builder
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        // A subscriber is already installed; keep it
        tracing::debug!("logging already initialized, keeping existing subscriber");
    }

    Ok(())
}
