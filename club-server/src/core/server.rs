//! HTTP server startup and shutdown

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::api;
use crate::core::{Config, Result, ServerState};

pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Serve an already wired state, e.g. one with an in-memory store
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config)?,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Club server listening on {}", addr);

        let app = api::build_app(&state);
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
            shutdown.cancel();
        });

        let grace = self.config.shutdown_timeout();
        let until_cancelled = state.shutdown.clone();
        let serve = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move { until_cancelled.cancelled().await });

        tokio::select! {
            result = serve => result?,
            _ = async {
                state.shutdown.cancelled().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!("Graceful shutdown timed out after {:?}", grace);
            }
        }
        Ok(())
    }
}
