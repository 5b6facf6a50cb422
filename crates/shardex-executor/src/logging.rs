//! Logging and tracing setup
//!
//! The executor logs through `tracing` with structured fields. This module
//! installs a subscriber for binaries and test suites that embed it:
//! - Pretty console output for development
//! - JSON lines for production log shipping
//! - `RUST_LOG` overrides the configured filter

use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of pretty console output
    pub json: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close (per-batch timing)
    pub enable_spans: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,shardex_core=debug,shardex_executor=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON output, execution events above debug only
    pub fn production() -> Self {
        Self {
            json: true,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,shardex_core=info,shardex_executor=info".to_string(),
        }
    }

    /// Pretty console output, verbose
    pub fn development() -> Self {
        Self::default()
    }

    /// Console output routed through the test harness
    pub fn testing() -> Self {
        Self {
            json: false,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already set.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW fires once per span; ENTER would fire on every re-poll of a future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = if config.json {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    tracing::info!(
        json = config.json,
        filter = %config.default_filter,
        "logging initialized"
    );
    Ok(())
}

/// Initialize logging from the build profile
pub fn init_default() -> anyhow::Result<()> {
    let config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };
    init(config)
}

/// Route logs through the test harness. Safe to call from every test.
pub fn init_for_tests() {
    let config = LoggingConfig::testing();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
