//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing)
//! - Bind server to listener and run the bridge drain next to it
//! - Stop the runner and persist settings once serving ends

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::http::websocket::ws_handler;
use crate::lifecycle::startup::Runtime;
use crate::lifecycle::Shutdown;
use crate::pipeline::CallbackRegistry;
use crate::pool::{ConnectionPool, ConnectionTracker};
use crate::runner::{BridgeDrain, RunnerSlot};
use crate::settings::{SettingsStore, ROOT_NODE_NAME};

const INDEX_HTML: &str = include_str!("index.html");

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub pool: Arc<ConnectionPool>,
    pub runners: Arc<RunnerSlot>,
    pub callbacks: Arc<CallbackRegistry>,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
    /// Outbound messages queued per client before eviction.
    pub send_buffer: usize,
    pub platform: String,
}

/// HTTP server for the control UI and websocket clients.
pub struct HttpServer {
    router: Router,
    state: AppState,
    drain: BridgeDrain,
}

impl HttpServer {
    /// Create a new HTTP server over assembled subsystems.
    pub fn new(runtime: Runtime) -> Self {
        let router = Self::build_router(runtime.state.clone());
        Self {
            router,
            state: runtime.state,
            drain: runtime.drain,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/settings", get(settings_page))
            .route("/settings.json", get(settings_json))
            .route("/status", get(status))
            .route("/ws/{topic}", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until the shutdown signal fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state;
        let drain = tokio::spawn(self.drain.run(state.pool.clone(), state.shutdown.subscribe()));

        let mut signal = state.shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = signal.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        state.runners.deactivate();
        if let Err(e) = state.settings.dump() {
            tracing::error!(error = %e, "Failed to persist settings on shutdown");
        }
        if let Err(e) = drain.await {
            tracing::warn!(error = %e, "Bridge drain task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// The settings form, rendered from the whole tree.
async fn settings_page(State(state): State<AppState>) -> Response {
    match state.settings.render(ROOT_NODE_NAME) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render settings");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn settings_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.settings.read(|root| root.to_nested()))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let runner = state.runners.current();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "platform": state.platform,
        "runner": {
            "running": runner.as_ref().is_some_and(|r| r.is_running()),
            "generation": runner.map(|r| r.generation()),
        },
        "clients": state.tracker.active_count(),
        "topics": state.pool.topics(),
        "callbacks": state.callbacks.names(),
    }))
}
