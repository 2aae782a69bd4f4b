//! CLI argument definitions for the tailstream agent.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Flags are the last configuration layer and win over the file and
//! environment variables.

use std::path::PathBuf;

use clap::Parser;

/// Tailstream log shipping agent.
///
/// Discovers log files, tails them across rotations, normalizes each
/// line and ships per-stream NDJSON batches to the ingest endpoint.
#[derive(Parser, Debug)]
#[command(name = "tailstream")]
#[command(version, about, long_about = None)]
pub struct AgentCli {
    /// Path to the YAML configuration file.
    ///
    /// When omitted, the first existing system path is used, falling
    /// back to `./tailstream.yaml`. A missing default file means defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Environment name reported with the agent (e.g. production).
    #[arg(long)]
    pub env: Option<String>,

    /// Legacy single-stream ingest URL.
    #[arg(long)]
    pub ship_url: Option<String>,

    /// File holding the access key. Its trimmed contents replace `key`.
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Shorthand for `general.log_level = debug`.
    #[arg(long)]
    pub debug: bool,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without shipping anything.
    #[arg(long)]
    pub validate: bool,

    /// Read lines from standard input instead of tailing files.
    #[arg(long)]
    pub stdin: bool,

    /// Stream id used in stdin mode (defaults to `ship.stream_id`).
    #[arg(long, requires = "stdin")]
    pub stream_id: Option<String>,

    /// Stream name used in stdin mode for logs and metrics.
    #[arg(long, requires = "stdin")]
    pub stream_name: Option<String>,
}
