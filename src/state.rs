use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::HostConfig;
use crate::dashboard::Dashboard;
use crate::loader::{ContentLoader, HttpContentLoader};
use crate::registry::FrameRegistry;
use crate::routes::AnalyticsRoutes;

/// Global state shared by the HTTP handlers.
pub struct AppState {
    /// Effective config after file, env and CLI layering
    pub(crate) config: HostConfig,
    pub(crate) dashboard: Arc<Dashboard>,
    /// Open `/api/stream` connections
    pub(crate) stream_clients: AtomicUsize,
    /// Shutdown sender for the HTTP server; send () to gracefully stop it
    pub(crate) server_shutdown: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl AppState {
    /// Build state backed by the analytics server named in `config`.
    /// Must be called inside a tokio runtime: mounting starts the first loads.
    pub fn new(config: HostConfig) -> Result<Arc<Self>, String> {
        let loader = HttpContentLoader::new(&config.analytics_base_url)?;
        Ok(Self::with_loader(config, Arc::new(loader)))
    }

    pub fn with_loader(config: HostConfig, loader: Arc<dyn ContentLoader>) -> Arc<Self> {
        let registry =
            Arc::new(FrameRegistry::new(loader).with_load_timeout(config.load_timeout()));
        let routes = Arc::new(AnalyticsRoutes::new(&config.route_prefix));
        let dashboard = Dashboard::mount(config.plugin_ids.clone(), registry, routes);
        Arc::new(Self {
            config,
            dashboard,
            stream_clients: AtomicUsize::new(0),
            server_shutdown: Mutex::new(None),
        })
    }

    pub(crate) fn stream_client_count(&self) -> usize {
        self.stream_clients.load(Ordering::Relaxed)
    }

    /// Ask a running server to stop. Returns false if none is running.
    pub fn shutdown(&self) -> bool {
        match self.server_shutdown.lock().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}
