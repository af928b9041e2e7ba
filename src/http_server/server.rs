//! # HTTP Server
//!
//! Assembles the router, shared state, CORS policy, and the background
//! notification listener into one serving unit.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::ingest_routes::ingest_routes;
use super::query_routes::query_routes;
use super::status_routes::status_routes;
use super::ws_routes::ws_routes;
use crate::config::ServiceConfig;
use crate::cot::CotPublisher;
use crate::liveness::LivenessTracker;
use crate::realtime::{NotificationListener, SubscriberRegistry};
use crate::store::SignalStore;

/// State shared across all handlers
pub struct AppState {
    pub config: ServiceConfig,
    pub store: SignalStore,
    pub registry: Arc<SubscriberRegistry>,
    pub listener: Arc<NotificationListener>,
    pub cot: Arc<CotPublisher>,
    pub liveness: LivenessTracker,
}

impl AppState {
    /// Build fresh process-scoped state
    pub fn new(config: ServiceConfig, store: SignalStore) -> Self {
        Self {
            config,
            store,
            registry: Arc::new(SubscriberRegistry::new()),
            listener: Arc::new(NotificationListener::new()),
            cot: Arc::new(CotPublisher::new()),
            liveness: LivenessTracker::new(),
        }
    }
}

/// HTTP server for the ingestion and fan-out pipeline
pub struct HttpServer {
    state: Arc<AppState>,
    router: Router,
}

impl HttpServer {
    /// Create a server from configuration and a connected store
    pub fn new(config: ServiceConfig, store: SignalStore) -> Self {
        let state = Arc::new(AppState::new(config, store));
        let router = Self::build_router(Arc::clone(&state));
        Self { state, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(state: Arc<AppState>) -> Router {
        let cors = if state.config.cors_origins.is_empty() {
            // No origins configured: permissive, for development
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            use tower_http::cors::AllowOrigin;
            let origins: Vec<_> = state
                .config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(status_routes())
            .merge(ingest_routes())
            .merge(query_routes())
            .merge(ws_routes())
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the router (for tests)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the background loops (as configured) and serve forever
    pub async fn start(self) -> Result<(), io::Error> {
        if self.state.config.enable_listen {
            self.state.listener.spawn(
                Arc::clone(&self.state.registry),
                self.state.config.database_url.clone(),
            );
        } else {
            tracing::info!("notification listener disabled by configuration");
        }

        if let Some(target) = self.state.config.tak.clone() {
            self.state
                .cot
                .spawn(Arc::clone(&self.state.registry), target);
        }

        let addr: SocketAddr = self
            .state
            .config
            .socket_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        tracing::info!(%addr, "starting skytrack HTTP server");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await
    }
}
