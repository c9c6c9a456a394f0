//! Application state and shared resources.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use storage::TileCache;

use crate::config::ServerConfig;
use crate::metrics::MetricsCollector;
use crate::scheduler::Scheduler;

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    pub cache: Arc<TileCache>,
    pub scheduler: Arc<Scheduler>,
    pub metrics: Arc<MetricsCollector>,
    /// Present when a Prometheus recorder was installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: ServerConfig, prometheus: Option<PrometheusHandle>) -> Self {
        let cache = Arc::new(TileCache::new(config.max_cache_size));
        let scheduler = Arc::new(Scheduler::new(
            cache.clone(),
            config.tile_size,
            config.render_concurrency,
            config.tile_channel_capacity,
        ));

        Self {
            config,
            cache,
            scheduler,
            metrics: Arc::new(MetricsCollector::new()),
            prometheus,
        }
    }
}
