//! HTTP surface (C10): wires the Bedrock client and the two sandboxed
//! orchestrators into a router, and runs it to completion with graceful
//! shutdown on `SIGINT`/`SIGTERM`.

mod error;
pub mod error_mapping;
mod extract;
pub mod logger;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use codeexec::CodeExecService;
use config::Config;
use llm::BedrockClient;
use ptc::PtcService;
use tokio::net::TcpListener;

pub use error::Error;
pub use state::AppState;

/// Configuration for serving the proxy.
pub struct ServeConfig {
    /// Socket address the server binds to.
    pub listen_address: SocketAddr,
    /// Fully loaded and validated configuration.
    pub config: Config,
    /// Log filter string (e.g. `"info"` or `"server=debug,sandbox=debug"`).
    pub log_filter: String,
    /// Version string logged on startup.
    pub version: String,
    /// Optional sender notified with the bound address once the listener is
    /// up — useful for tests that bind to port 0.
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Builds the Bedrock client and the sandbox orchestrators, assembles the
/// router, and serves it until a shutdown signal arrives.
pub async fn serve(
    ServeConfig { listen_address, config, log_filter, version, bound_addr_sender }: ServeConfig,
) -> anyhow::Result<()> {
    logger::init(&log_filter);
    log::info!("bedrock-proxy {version}");

    let bedrock = Arc::new(BedrockClient::new(&config.aws, config.llm.clone()).await?);
    let model_mapping = Arc::new(config.model_mapping.clone());

    let ptc = if config.ptc.enabled {
        let service = Arc::new(PtcService::new(&config.ptc));
        tokio::spawn(service.session_store().run_reaper(Duration::from_secs(config.ptc.cleanup_interval_seconds)));
        log::info!("Programmatic Tool Calling enabled (image={})", config.ptc.sandbox_image);
        Some(service)
    } else {
        None
    };

    let codeexec = if config.standalone.enabled {
        let service = Arc::new(CodeExecService::new(&config.standalone));
        tokio::spawn(service.session_store().run_reaper(Duration::from_secs(config.standalone.cleanup_interval_seconds)));
        log::info!("standalone code execution enabled (image={})", config.standalone.sandbox_image);
        Some(service)
    } else {
        None
    };

    let state = AppState::new(bedrock, model_mapping, ptc.clone(), codeexec.clone());
    let app: Router<()> = routes::router().with_state(state);

    let listener = TcpListener::bind(listen_address).await.map_err(error::Error::Bind)?;

    if let Some(sender) = bound_addr_sender {
        let _ = sender.send(listener.local_addr()?);
    }

    log::info!("listening on http://{listen_address}");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.map_err(error::Error::Server)?;
        }
        _ = shutdown_signal() => {
            log::info!("received shutdown signal, shutting down gracefully");
        }
    }

    if let Some(ptc) = ptc {
        ptc.shutdown().await;
    }
    if let Some(codeexec) = codeexec {
        codeexec.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
