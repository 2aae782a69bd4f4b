//! Logging initialization for the tailstream agent.
//!
//! The configured level applies to the agent's own crates; HTTP and
//! runtime dependencies stay at `warn`. `RUST_LOG`, when set, replaces
//! the whole filter.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tailstream_core::config::GeneralConfig;

const AGENT_TARGETS: [&str; 3] = ["tailstream_agent", "tailstream_core", "tailstream_log_shipper"];

/// Filter directive for a configured level, e.g. `warn,tailstream_agent=debug,...`.
pub fn filter_directive(level: &str) -> String {
    let mut directive = String::from("warn");
    for target in AGENT_TARGETS {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any shipper task is spawned.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&config.log_level)))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            ));
        }
    };

    installed.map_err(|e| {
        anyhow::anyhow!(
            "failed to initialize {} tracing subscriber: {}",
            config.log_format,
            e
        )
    })
}
