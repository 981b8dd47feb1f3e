//! Per-server recurring health poller

use crate::client::MediaServerApi;
use crate::server::ServerRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fixed cadence between polls of one server
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Recurring poll loop for a single server.
///
/// Each registered server gets its own poller. The loop has no backoff and
/// no staleness cutoff: a failed poll is logged and the previous snapshot
/// stays in place until a later poll succeeds.
pub struct HealthPoller {
    server: Arc<ServerRecord>,
    api: Arc<dyn MediaServerApi>,
    interval: Duration,
}

impl HealthPoller {
    pub fn new(server: Arc<ServerRecord>, api: Arc<dyn MediaServerApi>) -> Self {
        Self {
            server,
            api,
            interval: POLL_INTERVAL,
        }
    }

    /// Override the poll cadence, mainly for tests
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the loop on the current runtime until the handle is dropped
    /// or aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// One poll round: streams first, then the system summary. The two
    /// fetches fail independently; one bad endpoint does not block the
    /// other snapshot from refreshing.
    pub async fn poll_once(&self) {
        let host = self.server.host.as_str();
        match self.api.streams(host).await {
            Ok(snapshot) => {
                debug!("{}: {} active streams", host, snapshot.streams.len());
                self.server.set_streams(snapshot);
            }
            Err(e) => warn!("stream poll of {} failed: {}", host, e),
        }
        match self.api.summaries(host).await {
            Ok(snapshot) => {
                debug!("{}: load1m {:.2}", host, snapshot.load_1m);
                self.server.set_health(snapshot);
            }
            Err(e) => warn!("summary poll of {} failed: {}", host, e),
        }
    }
}
