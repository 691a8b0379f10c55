//! # Logging
//!
//! `tracing` setup for `nova-wallet`. Every event goes to stderr; stdout
//! is reserved for the sync report and the metrics dump.
//!
//! ```text
//! RUST_LOG=nova_state=debug nova-wallet sync --fixture sample.json | jq .accounts
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when `RUST_LOG` is unset. Suppressed runs and dispatches log at
/// debug/trace and stay hidden.
pub const DEFAULT_FILTER: &str = "nova_wallet=info,nova_state=info";

/// How events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, one event per line with its fields.
    Pretty,
    /// Newline-delimited JSON, including the current span.
    Json,
}

impl LogFormat {
    /// `--log-format` value. Anything but "json" (any case) renders pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// `RUST_LOG` if it parses, otherwise `fallback`.
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Panics if one is already set, so the
/// binary calls it once per subcommand that logs.
pub fn init_logging(fallback: &str, format: LogFormat) {
    let filter = env_filter(fallback);

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_current_span(true),
                )
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_json_selects_json() {
        assert_eq!(LogFormat::from_str_lossy("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("ndjson"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy(""), LogFormat::Pretty);
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
