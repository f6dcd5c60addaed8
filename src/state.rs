use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::engine::fare::FareEstimator;
use crate::error::AppError;
use crate::geo::geocode::{Geocoder, HttpPageFetcher, PageFetcher};
use crate::geo::routing::{NoRouting, OsrmRouter, RouteProvider};
use crate::models::order::{Order, OrderChange};
use crate::observability::metrics::Metrics;
use crate::storage::blob::{BlobStore, DiskBlobStore, MemoryBlobStore};
use crate::storage::{MemoryStore, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub geocoder: Geocoder,
    pub estimator: FareEstimator,
    pub blobs: Arc<dyn BlobStore>,
    pub order_events_tx: broadcast::Sender<OrderChange>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn PageFetcher>,
        router: Arc<dyn RouteProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let (order_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            store,
            geocoder: Geocoder::new(fetcher),
            estimator: FareEstimator::new(router),
            blobs,
            order_events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let fetcher = Arc::new(HttpPageFetcher::new(config.geocode_hop_timeout)?);

        let router: Arc<dyn RouteProvider> = match &config.routing_url {
            Some(url) => {
                info!(routing_url = %url, "road routing enabled");
                Arc::new(OsrmRouter::new(url.clone(), config.routing_timeout)?)
            }
            None => Arc::new(NoRouting),
        };

        let blobs: Arc<dyn BlobStore> = match &config.upload_dir {
            Some(dir) => Arc::new(DiskBlobStore::new(dir)),
            None => Arc::new(MemoryBlobStore::new()),
        };

        Ok(Self::new(
            config.event_buffer_size,
            Arc::new(MemoryStore::new()),
            fetcher,
            router,
            blobs,
        ))
    }

    /// Fire-and-forget "orders changed" signal; having no listeners is fine.
    pub fn notify(&self, order: &Order) {
        let _ = self.order_events_tx.send(OrderChange {
            order_id: order.id,
            status: order.status,
            at: Utc::now(),
        });
        self.metrics
            .order_transitions_total
            .with_label_values(&[order.status.as_str()])
            .inc();
    }
}
