//! Registered server records

use arc_swap::ArcSwapOption;
use relay_common::{
    HealthSnapshot, IspType, ServerRole, StreamSnapshot, MAX_LOAD_AVG, MAX_OUTBOUND_BYTES,
};
use relay_geo::ProvinceId;
use std::fmt;
use std::sync::Arc;

/// One registered media server.
///
/// The snapshot pair is independently swapped wholesale by the server's own
/// poller; readers always load a complete, internally consistent snapshot.
pub struct ServerRecord {
    /// Persistence row id, 0 until inserted
    pub id: i64,
    /// Unique network address
    pub host: String,
    pub role: ServerRole,
    /// Carrier, inherited from the resolved subnet
    pub isp: IspType,
    /// Owning province node
    pub province: ProvinceId,
    /// Operational status flag stored alongside the row
    pub status: i32,
    pub desc: String,
    health: ArcSwapOption<HealthSnapshot>,
    streams: ArcSwapOption<StreamSnapshot>,
}

impl ServerRecord {
    pub fn new(
        host: impl Into<String>,
        desc: impl Into<String>,
        role: ServerRole,
        province: ProvinceId,
        isp: IspType,
    ) -> Self {
        Self {
            id: 0,
            host: host.into(),
            role,
            isp,
            province,
            status: 0,
            desc: desc.into(),
            health: ArcSwapOption::const_empty(),
            streams: ArcSwapOption::const_empty(),
        }
    }

    /// Set the persistence row id
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Set the stored status flag
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    /// Latest health snapshot, if any poll ever succeeded
    pub fn health(&self) -> Option<Arc<HealthSnapshot>> {
        self.health.load_full()
    }

    /// Latest stream snapshot, if any poll ever succeeded
    pub fn streams(&self) -> Option<Arc<StreamSnapshot>> {
        self.streams.load_full()
    }

    /// Replace the health snapshot wholesale
    pub fn set_health(&self, snapshot: HealthSnapshot) {
        self.health.store(Some(Arc::new(snapshot)));
    }

    /// Replace the stream snapshot wholesale
    pub fn set_streams(&self, snapshot: StreamSnapshot) {
        self.streams.store(Some(Arc::new(snapshot)));
    }

    /// Load metric used for ascending pool ordering:
    /// `load1m × outbound bytes`. Servers with no poll data rank first.
    pub fn load_metric(&self) -> f64 {
        match self.health.load_full() {
            Some(h) => h.load_1m * h.net_send_bytes as f64,
            None => 0.0,
        }
    }

    /// Availability predicate for dispatch: overloaded or saturated servers
    /// are excluded; a server that was never polled is available by default.
    pub fn is_available(&self) -> bool {
        match self.health.load_full() {
            Some(h) => {
                h.load_1m <= MAX_LOAD_AVG
                    && h.load_5m <= MAX_LOAD_AVG
                    && h.net_send_bytes <= MAX_OUTBOUND_BYTES
            }
            None => true,
        }
    }
}

impl fmt::Debug for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRecord")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("role", &self.role)
            .field("isp", &self.isp)
            .field("province", &self.province)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ServerRecord {
        ServerRecord::new("10.0.0.1", "edge", ServerRole::EdgeDownload, 0, IspType::Telecom)
    }

    fn health(load_1m: f64, load_5m: f64, send_bytes: i64) -> HealthSnapshot {
        HealthSnapshot {
            host: "10.0.0.1".into(),
            load_1m,
            load_5m,
            net_send_bytes: send_bytes,
            ..Default::default()
        }
    }

    #[test]
    fn test_unpolled_server_is_available() {
        let r = record();
        assert!(r.health().is_none());
        assert!(r.is_available());
        assert_eq!(r.load_metric(), 0.0);
    }

    #[test]
    fn test_load_1m_over_threshold_excludes() {
        let r = record();
        r.set_health(health(70.0, 1.0, 0));
        assert!(!r.is_available());
    }

    #[test]
    fn test_load_5m_over_threshold_excludes() {
        let r = record();
        r.set_health(health(1.0, 64.5, 0));
        assert!(!r.is_available());
    }

    #[test]
    fn test_outbound_bytes_over_threshold_excludes() {
        let r = record();
        r.set_health(health(1.0, 1.0, MAX_OUTBOUND_BYTES + 1));
        assert!(!r.is_available());
        r.set_health(health(1.0, 1.0, MAX_OUTBOUND_BYTES));
        assert!(r.is_available());
    }

    #[test]
    fn test_snapshot_replaced_wholesale() {
        let r = record();
        r.set_health(health(2.0, 2.0, 100));
        let first = r.health().unwrap();
        r.set_health(health(3.0, 3.0, 200));
        let second = r.health().unwrap();
        // the old Arc is untouched; readers holding it still see 2.0
        assert_eq!(first.load_1m, 2.0);
        assert_eq!(second.load_1m, 3.0);
    }

    #[test]
    fn test_load_metric() {
        let r = record();
        r.set_health(health(2.0, 1.0, 50));
        assert_eq!(r.load_metric(), 100.0);
    }
}
