//! # HTTP Server Module
//!
//! axum application serving live filtered pagination over server-sent
//! events.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `POST /orders/sse` - Stage a filter, returns a token
//! - `GET /orders/sse/count` - Count stream
//! - `GET /orders/sse?position&size` - Window stream
//! - `/observability/*` - Health and counters

pub mod config;
pub mod observability_routes;
pub mod server;
pub mod sync_routes;

pub use config::{ConfigError, ServerConfig};
pub use server::{HttpServer, RESOURCE_PATH};
pub use sync_routes::SyncState;
