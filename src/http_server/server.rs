//! # HTTP Server
//!
//! Wires the record store, the sync core and the routers into one axum
//! application, and runs the background tasks (random order generator,
//! staging sweeper) for the lifetime of the server.

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::config::ServerConfig;
use super::observability_routes::{health_routes, observability_routes};
use super::sync_routes::{sync_routes, SyncState};
use crate::observability::{log_event, log_event_with_fields, Event, MetricsRegistry};
use crate::records::MemoryOrderStore;
use crate::sync::{ChangeNotifier, FilterStagingCache, QueryReexecutor, StreamSessionHandler};

/// Path the order resource is mounted under
pub const RESOURCE_PATH: &str = "/orders";

/// HTTP server for live order pagination
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
    store: Arc<MemoryOrderStore>,
    staging: Arc<FilterStagingCache>,
    metrics: Arc<MetricsRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new HTTP server with custom configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let notifier = Arc::new(ChangeNotifier::new());
        let store = Arc::new(MemoryOrderStore::new(Arc::clone(&notifier)));
        let staging = Arc::new(FilterStagingCache::new(Arc::clone(&metrics)));
        let reexecutor = Arc::new(QueryReexecutor::new(store.clone(), Arc::clone(&metrics)));

        let sessions = StreamSessionHandler::new(
            Arc::clone(&staging),
            notifier,
            reexecutor,
            Arc::clone(&metrics),
        )
        .with_dedupe(config.dedupe_unchanged);

        let sync_state = Arc::new(SyncState {
            staging: Arc::clone(&staging),
            sessions,
            default_window_size: config.default_window_size,
            keep_alive: config.keep_alive(),
        });

        let router = Self::build_router(&config, sync_state, Arc::clone(&metrics));
        Self {
            config,
            router,
            store,
            staging,
            metrics,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(
        config: &ServerConfig,
        sync_state: Arc<SyncState>,
        metrics: Arc<MetricsRegistry>,
    ) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
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
            .merge(health_routes())
            .nest("/observability", observability_routes(metrics))
            .nest(RESOURCE_PATH, sync_routes(sync_state))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// The order store behind the streams
    pub fn store(&self) -> &Arc<MemoryOrderStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid socket address: {}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let seeded = self.store.seed_if_empty(self.config.seed_count).map_err(io::Error::other)?;
        if seeded > 0 {
            log_event_with_fields(Event::StoreSeeded, &[("count", &seeded.to_string())]);
        }

        let background = self.spawn_background_tasks();

        let local = listener.local_addr()?.to_string();
        log_event_with_fields(Event::Serving, &[
            ("addr", local.as_str()),
            ("resource", RESOURCE_PATH),
        ]);

        // Event streams never finish on their own, so shutdown stops the
        // accept loop instead of draining connections
        let result = tokio::select! {
            served = axum::serve(listener, self.router).into_future() => served,
            _ = shutdown => Ok(()),
        };

        log_event(Event::ShutdownStart);
        for task in background {
            task.abort();
        }
        result
    }

    fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(interval) = self.config.insert_interval() {
            tasks.push(MemoryOrderStore::spawn_random_inserter(Arc::clone(&self.store), interval));
        }
        if let Some(interval) = self.config.sweep_interval() {
            tasks.push(FilterStagingCache::spawn_sweeper(Arc::clone(&self.staging), interval));
        }
        tasks
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = HttpServer::new();
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
        assert!(server.store().is_empty());
    }

    #[test]
    fn test_server_with_custom_port() {
        let config = ServerConfig::default().with_port(9090);
        let server = HttpServer::with_config(config);
        assert_eq!(server.socket_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn test_router_builds() {
        let server = HttpServer::new();
        let _router = server.router();
    }

    #[tokio::test]
    async fn test_serve_seeds_and_stops() {
        let config = ServerConfig {
            seed_count: 25,
            insert_interval_secs: 0,
            sweep_interval_secs: 0,
            ..Default::default()
        };
        let server = HttpServer::with_config(config);
        let store = Arc::clone(server.store());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = stop_rx.await;
        }));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.len(), 25);

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
