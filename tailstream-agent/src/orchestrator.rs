//! Agent orchestration -- configuration layering, assembly and lifecycle.
//!
//! Configuration is layered as defaults, then the YAML file, then
//! `TAILSTREAM_*` environment variables, then CLI flags. The
//! [`Orchestrator`] assembles the HTTP shipper and the log shipper
//! pipeline from the result, waits for a shutdown signal and stops the
//! pipeline. Stopping cancels the tailers first; each stream's
//! dispatcher then flushes what is left in its queue.
//!
//! Stdin mode ([`run_stdin`]) skips discovery and ships piped lines to a
//! single stream until EOF or a signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use tailstream_core::config::{AgentConfig, StreamConfig, default_config_path};
use tailstream_core::pipeline::{HealthStatus, Pipeline};
use tailstream_log_shipper::{
    HttpShipper, LogShipper, LogShipperBuilder, ShipperConfig, ship_stdin,
};

use crate::cli::AgentCli;
use crate::metrics_server;

/// Stream name used in stdin mode when `--stream-name` is absent.
pub const STDIN_STREAM_NAME: &str = "stdin";

/// Load the layered configuration for this invocation.
///
/// An explicit `--config` path must exist. Without it, the default path
/// is optional and a missing file means defaults.
pub async fn load_config(cli: &AgentCli) -> Result<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => AgentConfig::load(path).await.map_err(|e| {
            anyhow::anyhow!("failed to load config '{}': {}", path.display(), e)
        })?,
        None => {
            let path = default_config_path();
            AgentConfig::load_or_default(&path).await.map_err(|e| {
                anyhow::anyhow!("failed to load config '{}': {}", path.display(), e)
            })?
        }
    };

    apply_cli_overrides(&mut config, cli).await?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}

/// Apply CLI flags on top of an already loaded configuration.
pub async fn apply_cli_overrides(config: &mut AgentConfig, cli: &AgentCli) -> Result<()> {
    if let Some(env) = &cli.env {
        config.env = env.clone();
    }
    if let Some(url) = &cli.ship_url {
        config.ship.url = url.clone();
    }
    if cli.debug {
        config.general.log_level = "debug".to_owned();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(path) = &cli.key_file {
        config.key_file = path.display().to_string();
        config
            .resolve_key_file()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read key file: {}", e))?;
    }
    Ok(())
}

/// Build the single stream used in stdin mode.
///
/// `--stream-id` wins over `ship.stream_id`; the legacy `ship.url` is
/// used as the URL override when set.
pub fn stdin_stream(config: &AgentConfig, cli: &AgentCli) -> Result<StreamConfig> {
    let stream = StreamConfig {
        name: cli
            .stream_name
            .clone()
            .unwrap_or_else(|| STDIN_STREAM_NAME.to_owned()),
        stream_id: cli
            .stream_id
            .clone()
            .unwrap_or_else(|| config.ship.stream_id.clone()),
        url: (!config.ship.url.is_empty()).then(|| config.ship.url.clone()),
        ..Default::default()
    };
    if !stream.has_destination() {
        return Err(anyhow::anyhow!(
            "stdin mode needs --stream-id, ship.stream_id or ship.url"
        ));
    }
    Ok(stream)
}

/// The agent orchestrator.
///
/// Owns the configured log shipper and drives it from start to a
/// signal-triggered shutdown.
pub struct Orchestrator {
    config: AgentConfig,
    shipper: LogShipper<HttpShipper>,
    start_time: Instant,
}

impl Orchestrator {
    /// Assemble the pipeline from a validated configuration.
    ///
    /// Installs the Prometheus recorder first when `metrics.enabled`.
    pub fn build_from_config(config: AgentConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let shipper_config = ShipperConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("failed to build shipper config: {}", e))?;
        let sink = Arc::new(
            HttpShipper::new(shipper_config.ship_timeout())
                .map_err(|e| anyhow::anyhow!("failed to build HTTP shipper: {}", e))?,
        );

        let streams = config.resolved_streams();
        tracing::info!(
            streams = streams.len(),
            env = %config.env,
            base_url = %shipper_config.base_url,
            "assembling log shipper"
        );

        let shipper = LogShipperBuilder::new()
            .config(shipper_config)
            .streams(streams)
            .sink(sink)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log shipper: {}", e))?;

        Ok(Self {
            config,
            shipper,
            start_time: Instant::now(),
        })
    }

    /// Start shipping and block until SIGINT or SIGTERM.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start shipping and block until `shutdown` resolves.
    ///
    /// The future yields the name of the trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.shipper
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log shipper: {}", e))?;
        tracing::info!(
            streams = self.shipper.active_streams(),
            files = self.shipper.tailed_files(),
            "log shipper started"
        );
        let health = self.health().await;
        if !health.is_healthy() {
            tracing::warn!(%health, "agent started in degraded state");
        }

        let stop_updater = CancellationToken::new();
        let uptime_updater = if self.config.metrics.enabled {
            record_agent_metrics();
            Some(spawn_uptime_updater(self.start_time, stop_updater.clone()))
        } else {
            None
        };

        let result = shutdown.await;
        match &result {
            Ok(signal) => tracing::info!(signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown wait failed, stopping"),
        }

        stop_updater.cancel();
        if let Some(task) = uptime_updater {
            let _ = task.await;
        }

        self.shutdown().await?;
        result.map(|_| ())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping log shipper");
        self.shipper
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log shipper: {}", e))?;

        for (stream, stats) in self.shipper.dispatch_stats() {
            tracing::info!(
                stream = %stream,
                batches = stats.batches_shipped(),
                failed = stats.batches_failed(),
                events = stats.events_shipped(),
                dropped = stats.events_dropped(),
                "stream totals"
            );
        }
        Ok(())
    }

    /// Aggregated pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.shipper.health_check().await
    }

    pub fn shipper(&self) -> &LogShipper<HttpShipper> {
        &self.shipper
    }
}

/// Ship standard input to one stream until EOF or a shutdown signal.
///
/// Returns the number of lines read.
pub async fn run_stdin(config: &AgentConfig, stream: &StreamConfig) -> Result<u64> {
    let shipper_config = ShipperConfig::from_core(config)
        .map_err(|e| anyhow::anyhow!("failed to build shipper config: {}", e))?;
    let sink = Arc::new(
        HttpShipper::new(shipper_config.ship_timeout())
            .map_err(|e| anyhow::anyhow!("failed to build HTTP shipper: {}", e))?,
    );

    let cancel = CancellationToken::new();
    let ship = ship_stdin(&shipper_config, stream, sink, cancel.clone());
    tokio::pin!(ship);

    let lines = tokio::select! {
        result = &mut ship => result,
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(name) => tracing::info!(signal = name, "shutdown signal received, flushing stdin stream"),
                Err(e) => tracing::error!(error = %e, "shutdown wait failed, flushing stdin stream"),
            }
            cancel.cancel();
            ship.await
        }
    }
    .map_err(|e| anyhow::anyhow!("stdin shipping failed: {}", e))?;

    tracing::info!(stream = %stream.display_name(), lines, "stdin input finished");
    Ok(lines)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {}", e))?;
    Ok("ctrl-c")
}

fn record_agent_metrics() {
    use tailstream_core::metrics as m;

    metrics::gauge!(m::AGENT_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "agent metrics recorded");
}

/// Refresh the uptime gauge every 10 seconds until cancelled.
fn spawn_uptime_updater(
    start_time: Instant,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use tailstream_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::AGENT_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> AgentCli {
        let mut argv = vec!["tailstream"];
        argv.extend_from_slice(args);
        AgentCli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn cli_overrides_win_over_file_values() {
        let mut config = AgentConfig::parse(
            r#"
env: staging
general:
  log_level: warn
  log_format: json
ship:
  url: "https://old.example.com/ingest"
"#,
        )
        .unwrap();

        let cli = cli(&[
            "--env",
            "production",
            "--ship-url",
            "https://new.example.com/ingest",
            "--debug",
            "--log-format",
            "pretty",
        ]);
        apply_cli_overrides(&mut config, &cli).await.unwrap();

        assert_eq!(config.env, "production");
        assert_eq!(config.ship.url, "https://new.example.com/ingest");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
    }

    #[tokio::test]
    async fn key_file_flag_replaces_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key");
        std::fs::write(&key_path, "  secret-from-file\n").unwrap();

        let mut config = AgentConfig::parse("key: inline-key").unwrap();
        let cli = cli(&["--key-file", key_path.to_str().unwrap()]);
        apply_cli_overrides(&mut config, &cli).await.unwrap();

        assert_eq!(config.key, "secret-from-file");
    }

    #[tokio::test]
    async fn missing_key_file_is_an_error() {
        let mut config = AgentConfig::default();
        let cli = cli(&["--key-file", "/nonexistent/tailstream/key"]);
        assert!(apply_cli_overrides(&mut config, &cli).await.is_err());
    }

    #[test]
    fn stdin_stream_prefers_cli_id() {
        let config = AgentConfig::parse("ship:\n  stream_id: from-file").unwrap();

        let stream = stdin_stream(&config, &cli(&["--stdin", "--stream-id", "from-cli"])).unwrap();
        assert_eq!(stream.stream_id, "from-cli");
        assert_eq!(stream.name, STDIN_STREAM_NAME);

        let stream = stdin_stream(&config, &cli(&["--stdin", "--stream-name", "pipe"])).unwrap();
        assert_eq!(stream.stream_id, "from-file");
        assert_eq!(stream.name, "pipe");
        assert!(stream.url.is_none());
    }

    #[test]
    fn stdin_stream_without_destination_is_rejected() {
        let config = AgentConfig::default();
        assert!(stdin_stream(&config, &cli(&["--stdin"])).is_err());
    }

    #[test]
    fn stdin_stream_uses_legacy_url() {
        let config = AgentConfig::parse("ship:\n  url: \"https://in.example.com/x\"").unwrap();
        let stream = stdin_stream(&config, &cli(&["--stdin"])).unwrap();
        assert_eq!(stream.url.as_deref(), Some("https://in.example.com/x"));
    }
}
