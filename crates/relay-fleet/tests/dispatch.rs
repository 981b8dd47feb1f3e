//! Registry behavior over a small three-province fleet

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_common::{
    HealthSnapshot, IspType, RelayError, RelayResult, ServerRole, StreamSnapshot,
};
use relay_fleet::{FleetRegistry, MediaServerApi, MemoryStore, ServerRecord, StoredServer};
use relay_geo::GeoIndex;
use std::sync::Arc;

// Class-A blocks so classful resolution lands on the recorded subnets.
const GEO_DB: &str = "\
E,1.0.0.0/8,ct,beijing_ct,39.92,116.46,beijing telecom
N,2.0.0.0/8,cnc,beijing_cnc,39.92,116.46,beijing unicom
E,60.0.0.0/8,ct,shanghai_ct,31.22,121.48,shanghai telecom
E,100.0.0.0/8,ct,guangdong_ct,23.13,113.26,guangdong telecom
";

struct QuietApi {
    kicked: Mutex<Vec<(String, i64)>>,
}

impl QuietApi {
    fn new() -> Self {
        Self {
            kicked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaServerApi for QuietApi {
    async fn streams(&self, host: &str) -> RelayResult<StreamSnapshot> {
        Err(RelayError::PollFailure {
            host: host.to_string(),
            reason: "not wired in this test".to_string(),
        })
    }

    async fn summaries(&self, host: &str) -> RelayResult<HealthSnapshot> {
        Err(RelayError::PollFailure {
            host: host.to_string(),
            reason: "not wired in this test".to_string(),
        })
    }

    async fn kick_off(&self, host: &str, client_id: i64) -> RelayResult<()> {
        self.kicked.lock().push((host.to_string(), client_id));
        Ok(())
    }
}

fn registry() -> FleetRegistry {
    let geo = Arc::new(GeoIndex::from_reader(GEO_DB.as_bytes(), "beijing").unwrap());
    FleetRegistry::new(geo, Arc::new(MemoryStore::new()), Arc::new(QuietApi::new()))
}

fn health(load_1m: f64) -> HealthSnapshot {
    HealthSnapshot {
        load_1m,
        net_send_bytes: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_dispatch_scans_provinces_by_distance() {
    let reg = registry();
    reg.register_server("1.0.0.10", "bj", ServerRole::EdgeDownload)
        .await
        .unwrap();
    reg.register_server("60.0.0.10", "sh", ServerRole::EdgeDownload)
        .await
        .unwrap();
    reg.register_server("100.0.0.10", "gd", ServerRole::EdgeDownload)
        .await
        .unwrap();

    // Shanghai client: home first, then Beijing, then Guangdong
    let picked = reg.dispatch("60.1.2.3", ServerRole::EdgeDownload, 3);
    assert_eq!(picked, vec!["60.0.0.10", "1.0.0.10", "100.0.0.10"]);

    // Guangdong client: home first, then Shanghai, then Beijing
    let picked = reg.dispatch("100.1.2.3", ServerRole::EdgeDownload, 3);
    assert_eq!(picked, vec!["100.0.0.10", "60.0.0.10", "1.0.0.10"]);
}

#[tokio::test]
async fn test_dispatch_excludes_unavailable_servers() {
    let reg = registry();
    let local = reg
        .register_server("60.0.0.10", "sh", ServerRole::EdgeDownload)
        .await
        .unwrap();
    reg.register_server("1.0.0.10", "bj", ServerRole::EdgeDownload)
        .await
        .unwrap();

    local.set_health(health(70.0));
    let picked = reg.dispatch("60.1.2.3", ServerRole::EdgeDownload, 1);
    assert_eq!(picked, vec!["1.0.0.10"]);

    // back under the threshold, the local server wins again
    local.set_health(health(1.0));
    let picked = reg.dispatch("60.1.2.3", ServerRole::EdgeDownload, 1);
    assert_eq!(picked, vec!["60.0.0.10"]);
}

#[tokio::test]
async fn test_dispatch_orders_by_load_within_bucket() {
    let reg = registry();
    let heavy = reg
        .register_server("1.0.0.90", "", ServerRole::EdgeDownload)
        .await
        .unwrap();
    let mid = reg
        .register_server("1.0.0.50", "", ServerRole::EdgeDownload)
        .await
        .unwrap();
    let light = reg
        .register_server("1.0.0.10", "", ServerRole::EdgeDownload)
        .await
        .unwrap();

    heavy.set_health(health(90.0)); // over threshold, excluded entirely
    mid.set_health(health(50.0));
    light.set_health(health(10.0));
    reg.sort_pools();

    let picked = reg.dispatch("1.2.3.4", ServerRole::EdgeDownload, 3);
    assert_eq!(picked, vec!["1.0.0.10", "1.0.0.50"]);
}

#[tokio::test]
async fn test_dispatch_dedups_repeated_host() {
    let reg = registry();
    let beijing = reg.geo().province_id("beijing").unwrap();
    let shanghai = reg.geo().province_id("shanghai").unwrap();
    // one host pooled in two provinces; a client scanning both must see it once
    let record = Arc::new(ServerRecord::new(
        "1.0.0.10",
        "",
        ServerRole::EdgeDownload,
        beijing,
        IspType::Telecom,
    ));
    reg.pool(beijing).unwrap().add_server(record.clone());
    reg.pool(shanghai).unwrap().add_server(record);

    let picked = reg.dispatch("60.1.2.3", ServerRole::EdgeDownload, 5);
    assert_eq!(picked, vec!["1.0.0.10"]);
}

#[tokio::test]
async fn test_dispatch_never_errors_when_short() {
    let reg = registry();
    assert!(reg.dispatch("1.2.3.4", ServerRole::EdgeDownload, 4).is_empty());

    reg.register_server("1.0.0.10", "", ServerRole::EdgeDownload)
        .await
        .unwrap();
    let picked = reg.dispatch("1.2.3.4", ServerRole::EdgeDownload, 4);
    assert_eq!(picked.len(), 1);
    assert!(reg.dispatch("1.2.3.4", ServerRole::EdgeDownload, 0).is_empty());
}

#[tokio::test]
async fn test_unresolvable_client_uses_default_province() {
    let reg = registry();
    reg.register_server("1.0.0.10", "bj", ServerRole::EdgeDownload)
        .await
        .unwrap();
    reg.register_server("60.0.0.10", "sh", ServerRole::EdgeDownload)
        .await
        .unwrap();

    // off-map and garbage addresses both behave like a Beijing Telecom client
    let fallback = reg.dispatch("9.9.9.9", ServerRole::EdgeDownload, 2);
    let garbage = reg.dispatch("not-an-ip", ServerRole::EdgeDownload, 2);
    let native = reg.dispatch("1.2.3.4", ServerRole::EdgeDownload, 2);
    assert_eq!(fallback, native);
    assert_eq!(garbage, native);
    assert_eq!(fallback, vec!["1.0.0.10", "60.0.0.10"]);
}

#[tokio::test]
async fn test_dispatch_partitions_by_role_and_carrier() {
    let reg = registry();
    reg.register_server("1.0.0.10", "down", ServerRole::EdgeDownload)
        .await
        .unwrap();
    reg.register_server("1.0.0.11", "up", ServerRole::EdgeUpload)
        .await
        .unwrap();
    // 2.0.0.0/8 is Beijing Unicom; invisible to a Telecom client
    reg.register_server("2.0.0.10", "down cnc", ServerRole::EdgeDownload)
        .await
        .unwrap();

    let picked = reg.dispatch("1.2.3.4", ServerRole::EdgeDownload, 5);
    assert_eq!(picked, vec!["1.0.0.10"]);
    let picked = reg.dispatch("2.0.0.99", ServerRole::EdgeDownload, 5);
    assert_eq!(picked, vec!["2.0.0.10"]);
    let picked = reg.dispatch("1.2.3.4", ServerRole::EdgeUpload, 5);
    assert_eq!(picked, vec!["1.0.0.11"]);
}

#[tokio::test]
async fn test_register_rejects_duplicate_host_in_role() {
    let reg = registry();
    reg.register_server("1.0.0.10", "", ServerRole::Origin)
        .await
        .unwrap();
    let err = reg
        .register_server("1.0.0.10", "", ServerRole::Origin)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::DuplicateServer(_)));

    // same host under another role is a distinct server
    reg.register_server("1.0.0.10", "", ServerRole::EdgeUpload)
        .await
        .unwrap();
    assert_eq!(reg.server_count(), 2);
}

#[tokio::test]
async fn test_boot_load_repopulates_fleet() {
    let geo = Arc::new(GeoIndex::from_reader(GEO_DB.as_bytes(), "beijing").unwrap());
    let store = Arc::new(MemoryStore::new());
    store.push(StoredServer {
        id: 7,
        host: "60.0.0.10".to_string(),
        role: ServerRole::EdgeDownload,
        status: 1,
        desc: "sh".to_string(),
    });
    store.push(StoredServer {
        id: 8,
        host: "1.0.0.10".to_string(),
        role: ServerRole::Origin,
        status: 0,
        desc: "bj".to_string(),
    });

    let reg = FleetRegistry::new(geo, store, Arc::new(QuietApi::new()));
    let admitted = reg.load_servers().await.unwrap();
    assert_eq!(admitted, 2);

    let sh = reg.server(ServerRole::EdgeDownload, "60.0.0.10").unwrap();
    assert_eq!(sh.id, 7);
    assert_eq!(sh.status, 1);
    assert_eq!(
        reg.dispatch("60.1.2.3", ServerRole::EdgeDownload, 1),
        vec!["60.0.0.10"]
    );
}

#[tokio::test]
async fn test_snapshot_view_and_kickoff() {
    let api = Arc::new(QuietApi::new());
    let geo = Arc::new(GeoIndex::from_reader(GEO_DB.as_bytes(), "beijing").unwrap());
    let reg = FleetRegistry::new(geo, Arc::new(MemoryStore::new()), api.clone());

    let server = reg
        .register_server("1.0.0.10", "", ServerRole::EdgeUpload)
        .await
        .unwrap();
    server.set_health(health(3.0));

    let view = reg.snapshot_for_role(ServerRole::EdgeUpload);
    assert_eq!(view.len(), 1);
    let snap = &view["1.0.0.10"];
    assert_eq!(snap.health.as_ref().unwrap().load_1m, 3.0);
    assert!(snap.streams.is_none());

    reg.kick_off_client("1.0.0.10", 129).await.unwrap();
    assert_eq!(api.kicked.lock().as_slice(), &[("1.0.0.10".to_string(), 129)]);
}
