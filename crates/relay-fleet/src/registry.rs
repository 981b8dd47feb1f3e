//! Fleet registry: registration, dispatch and the resort loop

use crate::client::{kick_off_with_retry, MediaServerApi};
use crate::poller::{HealthPoller, POLL_INTERVAL};
use crate::pool::RegionPool;
use crate::server::ServerRecord;
use crate::store::ServerStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use relay_common::{
    HealthSnapshot, RelayError, RelayResult, ServerRole, StreamSnapshot, ROLE_COUNT,
};
use relay_geo::{GeoIndex, ProvinceId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cadence of the background pass that re-sorts every pool bucket
pub const RESORT_INTERVAL: Duration = Duration::from_secs(60);

/// Point-in-time view of one server's poll data
#[derive(Debug, Clone, Default)]
pub struct ServerSnapshot {
    pub health: Option<Arc<HealthSnapshot>>,
    pub streams: Option<Arc<StreamSnapshot>>,
}

/// Registry of the whole server fleet.
///
/// Holds one [`RegionPool`] per province plus a per-role host index used
/// for duplicate detection and monitoring reads. Registration, dispatch
/// and polling all go through here.
pub struct FleetRegistry {
    geo: Arc<GeoIndex>,
    store: Arc<dyn ServerStore>,
    api: Arc<dyn MediaServerApi>,
    pools: Vec<RegionPool>,
    by_role: [DashMap<String, Arc<ServerRecord>>; ROLE_COUNT],
    pollers: Mutex<Vec<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl FleetRegistry {
    pub fn new(
        geo: Arc<GeoIndex>,
        store: Arc<dyn ServerStore>,
        api: Arc<dyn MediaServerApi>,
    ) -> Self {
        let pools = (0..geo.province_count()).map(RegionPool::new).collect();
        Self {
            geo,
            store,
            api,
            pools,
            by_role: std::array::from_fn(|_| DashMap::new()),
            pollers: Mutex::new(Vec::new()),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the per-server poll cadence, mainly for tests
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Repopulate the in-memory fleet from the store at boot. Rows that
    /// collide on (role, host) are logged and skipped, not fatal.
    pub async fn load_servers(&self) -> RelayResult<usize> {
        let rows = self.store.load_servers().await?;
        let mut admitted = 0;
        for row in rows {
            let record = self
                .build_record(&row.host, &row.desc, row.role)
                .with_id(row.id)
                .with_status(row.status);
            match self.admit(Arc::new(record)) {
                Ok(()) => admitted += 1,
                Err(e) => warn!("skipping stored server {}: {}", row.host, e),
            }
        }
        info!("fleet loaded: {} servers admitted", admitted);
        Ok(admitted)
    }

    /// Register a new server.
    ///
    /// The row is made durable before any in-memory state changes; a store
    /// failure leaves the fleet untouched. After the insert the server
    /// joins its pool bucket and its poller starts.
    pub async fn register_server(
        &self,
        host: &str,
        desc: &str,
        role: ServerRole,
    ) -> RelayResult<Arc<ServerRecord>> {
        if self.by_role[role.index()].contains_key(host) {
            return Err(RelayError::DuplicateServer(host.to_string()));
        }
        let id = self.store.insert_server(host, role, 0, desc).await?;
        let record = Arc::new(self.build_record(host, desc, role).with_id(id));
        self.admit(record.clone())?;
        info!(
            "registered {} server {} in {} ({})",
            role,
            host,
            self.province_name(record.province),
            record.isp
        );
        Ok(record)
    }

    /// Resolve a host to its province and carrier, falling back to the
    /// default province and Telecom when the address is off-map.
    fn build_record(&self, host: &str, desc: &str, role: ServerRole) -> ServerRecord {
        let (province, isp) = self.geo.resolve_or_default(host);
        ServerRecord::new(host, desc, role, province, isp)
    }

    /// Put a record into the fleet: host index, pool bucket, poller.
    fn admit(&self, record: Arc<ServerRecord>) -> RelayResult<()> {
        match self.by_role[record.role.index()].entry(record.host.clone()) {
            Entry::Occupied(_) => {
                return Err(RelayError::DuplicateServer(record.host.clone()));
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
        self.pools[record.province].add_server(record.clone());
        let handle = HealthPoller::new(record, self.api.clone())
            .with_interval(self.poll_interval)
            .spawn();
        self.pollers.lock().push(handle);
        Ok(())
    }

    /// Pick up to `count` servers for a client.
    ///
    /// The client address resolves to a home province and carrier; provinces
    /// are scanned by ascending capital distance, each bucket read in its
    /// current load order. Unavailable servers are skipped and hosts are
    /// never repeated. Dispatch cannot fail: an unserved request yields a
    /// short or empty list.
    pub fn dispatch(&self, client_addr: &str, role: ServerRole, count: usize) -> Vec<String> {
        let mut picked = Vec::new();
        if count == 0 {
            return picked;
        }
        let (home, isp) = self.geo.resolve_or_default(client_addr);
        let Some(node) = self.geo.province(home) else {
            return picked;
        };
        for hop in &node.targets {
            let bucket = self.pools[hop.target].bucket(role, isp);
            for server in bucket.read().iter() {
                if !server.is_available() {
                    continue;
                }
                if picked.iter().any(|h| h == &server.host) {
                    continue;
                }
                picked.push(server.host.clone());
                if picked.len() == count {
                    return picked;
                }
            }
        }
        picked
    }

    /// Monitoring view: the latest snapshots of every server in a role
    pub fn snapshot_for_role(&self, role: ServerRole) -> HashMap<String, ServerSnapshot> {
        self.by_role[role.index()]
            .iter()
            .map(|entry| {
                let server = entry.value();
                (
                    server.host.clone(),
                    ServerSnapshot {
                        health: server.health(),
                        streams: server.streams(),
                    },
                )
            })
            .collect()
    }

    /// Disconnect a publishing client from its edge server, with retries
    pub async fn kick_off_client(&self, host: &str, client_id: i64) -> RelayResult<()> {
        kick_off_with_retry(self.api.as_ref(), host, client_id).await
    }

    /// Start the background pass that re-sorts every bucket so pool order
    /// follows drifting poll data, not only insertion order.
    pub fn spawn_sorter(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RESORT_INTERVAL);
            loop {
                ticker.tick().await;
                registry.sort_pools();
            }
        })
    }

    /// One full resort pass over every province pool
    pub fn sort_pools(&self) {
        for pool in &self.pools {
            pool.sort_by_load();
        }
    }

    pub fn server(&self, role: ServerRole, host: &str) -> Option<Arc<ServerRecord>> {
        self.by_role[role.index()].get(host).map(|e| e.value().clone())
    }

    pub fn server_count(&self) -> usize {
        self.by_role.iter().map(|m| m.len()).sum()
    }

    pub fn pool(&self, province: ProvinceId) -> Option<&RegionPool> {
        self.pools.get(province)
    }

    pub fn geo(&self) -> &GeoIndex {
        &self.geo
    }

    fn province_name(&self, id: ProvinceId) -> &str {
        self.geo
            .province(id)
            .map(|node| node.name.as_str())
            .unwrap_or("?")
    }
}

impl Drop for FleetRegistry {
    fn drop(&mut self) {
        for handle in self.pollers.lock().drain(..) {
            handle.abort();
        }
    }
}
