//! Structured logging setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Environment variable that switches on JSON output.
pub const LOG_JSON_ENV: &str = "ANALYTICS_LOG_JSON";

/// `logging` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `analytics=debug,info`.
    /// `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub json: bool,
    /// Emit span open/close events (recompute and render spans).
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            span_events: false,
        }
    }
}

impl LoggingConfig {
    /// Applies `RUST_LOG` and `ANALYTICS_LOG_JSON` on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(filter) = std::env::var("RUST_LOG") {
            self.filter = filter;
        }
        if let Ok(json) = std::env::var(LOG_JSON_ENV) {
            self.json = parse_flag(&json);
        }
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

/// Installs the global subscriber. Returns `false` if one was already set.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let installed = if config.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(filter = %config.filter, json = config.json, "Tracing initialized");
    }
    installed
}

/// Initializes tracing from defaults plus environment overrides.
pub fn init_tracing_from_env() -> bool {
    init_tracing(&LoggingConfig::default().with_env_overrides())
}
