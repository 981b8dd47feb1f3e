//! Per-province role/ISP server pools

use crate::server::ServerRecord;
use parking_lot::RwLock;
use relay_common::{IspType, ServerRole, ISP_COUNT, ROLE_COUNT};
use relay_geo::ProvinceId;
use std::cmp::Ordering;
use std::sync::Arc;

type Bucket = RwLock<Vec<Arc<ServerRecord>>>;

/// Role- and ISP-partitioned server lists for one province.
///
/// Every bucket has its own lock and is kept sorted ascending by
/// `ServerRecord::load_metric`. A server lives in exactly one bucket for
/// its entire lifetime; role and carrier are fixed at registration.
pub struct RegionPool {
    province: ProvinceId,
    buckets: [[Bucket; ISP_COUNT]; ROLE_COUNT],
}

impl RegionPool {
    pub fn new(province: ProvinceId) -> Self {
        Self {
            province,
            buckets: std::array::from_fn(|_| std::array::from_fn(|_| RwLock::new(Vec::new()))),
        }
    }

    pub fn province(&self) -> ProvinceId {
        self.province
    }

    /// Bucket lock for (role, carrier); dispatch scans under a read lock,
    /// insertion mutates under a write lock.
    #[inline]
    pub fn bucket(&self, role: ServerRole, isp: IspType) -> &Bucket {
        &self.buckets[role.index()][isp.index()]
    }

    /// Append a server to its bucket, then re-sort that bucket.
    ///
    /// The append and the sort are separate critical sections; a concurrent
    /// reader can observe the bucket appended but not yet re-sorted. That
    /// transient disorder is accepted for best-effort load balancing.
    pub fn add_server(&self, server: Arc<ServerRecord>) {
        let bucket = self.bucket(server.role, server.isp);
        bucket.write().push(server);
        sort_bucket(bucket);
    }

    /// Re-sort every bucket by the current load metric. Run periodically so
    /// pools track drifting poll data, not only insertions.
    pub fn sort_by_load(&self) {
        for row in &self.buckets {
            for bucket in row {
                sort_bucket(bucket);
            }
        }
    }

    /// Number of servers pooled for (role, carrier)
    pub fn len(&self, role: ServerRole, isp: IspType) -> usize {
        self.bucket(role, isp).read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets
            .iter()
            .all(|row| row.iter().all(|b| b.read().is_empty()))
    }
}

fn sort_bucket(bucket: &Bucket) {
    bucket.write().sort_by(|a, b| {
        a.load_metric()
            .partial_cmp(&b.load_metric())
            .unwrap_or(Ordering::Equal)
    });
}
