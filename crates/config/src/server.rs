use std::net::SocketAddr;

/// Top-level HTTP server configuration.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the proxy binds to.
    pub listen_address: SocketAddr,

    /// Log filter string (e.g. "info" or "sandbox=debug,ptc=debug").
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: ([0, 0, 0, 0], 8080).into(),
            log_level: "info".to_string(),
        }
    }
}
