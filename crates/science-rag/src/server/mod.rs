//! HTTP server for the orchestration API

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::types::{HealthResponse, ReadinessResponse};
use state::AppState;

/// Orchestration HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server talking to the services named in `config`
    pub fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        let state = self.state.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, finishing in-flight requests");
                state.trigger_shutdown();
            }
        });

        tracing::info!("Starting server on http://{}", addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown is triggered
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        let mut shutdown = self.state.shutdown_signal();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stopping| *stopping).await;
            })
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over `state`, with tracing and optional CORS
pub fn build_router(state: AppState) -> Router {
    let config = state.config().server.clone();

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(config.max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let (documents, llm) = tokio::join!(state.documents().health_check(), state.llm().health_check());
    let document_service = documents.unwrap_or(false);
    let completion_service = llm.unwrap_or(false);
    let ready = document_service && completion_service && !state.is_shutting_down();

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            document_service,
            completion_service,
        }),
    )
}
