use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Anthropic-Messages-compatible API proxy in front of AWS Bedrock's
/// Converse API.
#[derive(Debug, Parser)]
#[command(name = "proxy", version, about)]
pub struct Args {
    /// Path to a TOML configuration file, overlaid on top of the compiled
    /// defaults. Overridden in turn by `BEDROCK_PROXY_*` environment
    /// variables (see `config::loader`).
    #[arg(short, long, value_name = "file", env = "BEDROCK_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Socket address to listen on, overriding both the config file and the
    /// `BEDROCK_PROXY_LISTEN_ADDRESS` environment variable.
    #[arg(short, long, value_name = "address")]
    pub listen_address: Option<SocketAddr>,

    /// Log filter string (e.g. "info" or "sandbox=debug,ptc=debug"),
    /// overriding both the config file and `BEDROCK_PROXY_LOG_LEVEL`.
    #[arg(long, value_name = "filter")]
    pub log_level: Option<String>,
}
