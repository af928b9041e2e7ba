//! # HTTP Server Module
//!
//! Axum router, route handlers, and the HTTP-facing error mapping.
//!
//! # Endpoints
//!
//! - `POST /ingest` - authenticated signal ingestion (single object or array)
//! - `GET /health` - health check
//! - `GET /latest`, `GET /latest_in_view` - newest position per sensor
//! - `GET /tracks`, `GET /tracks_window` - position history grouped by sensor
//! - `POST /node_heartbeat`, `GET /data` - node liveness and dashboard stats
//! - `GET /ws` - WebSocket push channel

pub mod errors;
pub mod ingest_routes;
pub mod query_routes;
pub mod server;
pub mod status_routes;
pub mod ws_routes;

pub use errors::ApiError;
pub use server::{AppState, HttpServer};
