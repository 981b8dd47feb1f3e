//! Remote media-server management API
//!
//! Every fleet server exposes an SRS-style HTTP API: a stream listing, a
//! system summary and a client kickoff endpoint. The trait boundary lets
//! tests substitute a stub for the wire client.

use async_trait::async_trait;
use relay_common::{HealthSnapshot, RelayError, RelayResult, StreamInfo, StreamSnapshot};
use serde::Deserialize;
use tracing::warn;

pub const STREAMS_PATH: &str = "api/v1/streams";
pub const SUMMARIES_PATH: &str = "api/v1/summaries";
pub const CLIENTS_PATH: &str = "api/v1/clients";

/// Kickoff attempts before the failure is surfaced to the caller
pub const KICKOFF_ATTEMPTS: usize = 3;

/// Management API exposed by every fleet server
#[async_trait]
pub trait MediaServerApi: Send + Sync {
    /// Fetch the active stream listing
    async fn streams(&self, host: &str) -> RelayResult<StreamSnapshot>;

    /// Fetch the system summary
    async fn summaries(&self, host: &str) -> RelayResult<HealthSnapshot>;

    /// Disconnect one client from the server
    async fn kick_off(&self, host: &str, client_id: i64) -> RelayResult<()>;
}

/// Kick a publishing client off its edge server.
///
/// Retried up to [`KICKOFF_ATTEMPTS`] times with no backoff; after
/// exhausting retries the last failure is surfaced to the caller.
pub async fn kick_off_with_retry(
    api: &dyn MediaServerApi,
    host: &str,
    client_id: i64,
) -> RelayResult<()> {
    let mut last = None;
    for attempt in 1..=KICKOFF_ATTEMPTS {
        match api.kick_off(host, client_id).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(
                    "kickoff of client {} on {} failed (attempt {}): {}",
                    client_id, host, attempt, e
                );
                last = Some(e);
            }
        }
    }
    Err(last.unwrap_or_else(|| RelayError::RemoteCall {
        host: host.to_string(),
        reason: "kickoff attempts exhausted".to_string(),
    }))
}

/// reqwest-backed implementation of the management API
pub struct HttpMediaApi {
    client: reqwest::Client,
}

impl HttpMediaApi {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        host: &str,
        path: &str,
    ) -> RelayResult<T> {
        let url = format!("http://{}/{}", host, path);
        let rsp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| remote_err(host, e.to_string()))?;
        if !rsp.status().is_success() {
            return Err(remote_err(host, format!("http status {}", rsp.status())));
        }
        rsp.json::<T>()
            .await
            .map_err(|e| remote_err(host, format!("bad response body: {}", e)))
    }
}

impl Default for HttpMediaApi {
    fn default() -> Self {
        Self::new()
    }
}

fn remote_err(host: &str, reason: String) -> RelayError {
    RelayError::RemoteCall {
        host: host.to_string(),
        reason,
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl MediaServerApi for HttpMediaApi {
    async fn streams(&self, host: &str) -> RelayResult<StreamSnapshot> {
        let rsp: RspStreams = self.get_json(host, STREAMS_PATH).await?;
        if rsp.code != 0 {
            return Err(remote_err(host, format!("api code {}", rsp.code)));
        }
        Ok(StreamSnapshot {
            host: host.to_string(),
            updated_at: now_unix(),
            streams: rsp.streams.into_iter().map(StreamInfo::from).collect(),
        })
    }

    async fn summaries(&self, host: &str) -> RelayResult<HealthSnapshot> {
        let rsp: RspSummaries = self.get_json(host, SUMMARIES_PATH).await?;
        if rsp.code != 0 {
            return Err(remote_err(host, format!("api code {}", rsp.code)));
        }
        let sys = rsp.data.system;
        Ok(HealthSnapshot {
            host: host.to_string(),
            updated_at: now_unix(),
            load_1m: sys.load_1m,
            load_5m: sys.load_5m,
            load_15m: sys.load_15m,
            net_recv_bytes: sys.net_recv_bytes,
            net_send_bytes: sys.net_send_bytes,
            cpu_percent: sys.cpu_percent,
            mem_ram_kbyte: sys.mem_ram_kbyte,
            mem_ram_percent: sys.mem_ram_percent,
            conn_sys: sys.conn_sys,
            conn_media: sys.conn_srs,
            uptime: sys.uptime,
        })
    }

    async fn kick_off(&self, host: &str, client_id: i64) -> RelayResult<()> {
        let url = format!("http://{}/{}/{}", host, CLIENTS_PATH, client_id);
        let rsp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| remote_err(host, e.to_string()))?;
        if !rsp.status().is_success() {
            return Err(remote_err(host, format!("http status {}", rsp.status())));
        }
        let body: RspBase = rsp
            .json()
            .await
            .map_err(|e| remote_err(host, format!("bad response body: {}", e)))?;
        if body.code != 0 {
            return Err(remote_err(host, format!("api code {}", body.code)));
        }
        Ok(())
    }
}

// Wire payloads, mirroring the SRS management API.

#[derive(Debug, Deserialize)]
struct RspBase {
    code: i32,
}

#[derive(Debug, Deserialize)]
struct RspStreams {
    code: i32,
    #[serde(default)]
    streams: Vec<WireStream>,
}

#[derive(Debug, Default, Deserialize)]
struct WireStream {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    vhost: i64,
    #[serde(default)]
    app: String,
    #[serde(default)]
    live_ms: i64,
    #[serde(default)]
    clients: i64,
    #[serde(default)]
    send_bytes: i64,
    #[serde(default)]
    recv_bytes: i64,
    #[serde(default)]
    kbps: WireKbps,
    #[serde(default)]
    publish: WirePublish,
}

#[derive(Debug, Default, Deserialize)]
struct WireKbps {
    #[serde(default)]
    recv_30s: i64,
    #[serde(default)]
    send_30s: i64,
}

#[derive(Debug, Default, Deserialize)]
struct WirePublish {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    cid: i64,
}

impl From<WireStream> for StreamInfo {
    fn from(w: WireStream) -> Self {
        Self {
            id: w.id,
            name: w.name,
            vhost: w.vhost,
            app: w.app,
            live_ms: w.live_ms,
            clients: w.clients,
            send_bytes: w.send_bytes,
            recv_bytes: w.recv_bytes,
            recv_kbps_30s: w.kbps.recv_30s,
            send_kbps_30s: w.kbps.send_30s,
            publisher_id: w.publish.cid,
            publisher_active: w.publish.active,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RspSummaries {
    code: i32,
    data: WireSummary,
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    system: WireSystem,
}

#[derive(Debug, Default, Deserialize)]
struct WireSystem {
    #[serde(default)]
    load_1m: f64,
    #[serde(default)]
    load_5m: f64,
    #[serde(default)]
    load_15m: f64,
    #[serde(default)]
    net_recv_bytes: i64,
    #[serde(default)]
    net_send_bytes: i64,
    #[serde(default)]
    cpu_percent: f64,
    #[serde(default)]
    mem_ram_kbyte: i64,
    #[serde(default)]
    mem_ram_percent: f64,
    #[serde(default)]
    conn_sys: i64,
    #[serde(default)]
    conn_srs: i64,
    #[serde(default)]
    uptime: f64,
}
