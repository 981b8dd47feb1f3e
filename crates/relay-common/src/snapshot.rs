//! Health and stream snapshots
//!
//! Value objects replaced wholesale on each successful poll; readers always
//! observe an internally consistent snapshot.

use serde::{Deserialize, Serialize};

/// Load-average ceiling for dispatchable servers
pub const MAX_LOAD_AVG: f64 = 64.0;

/// Outbound byte-counter ceiling for dispatchable servers (100 MiB)
pub const MAX_OUTBOUND_BYTES: i64 = 100 * 1024 * 1024;

/// Point-in-time system summary of one server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Server address the summary was polled from
    pub host: String,
    /// Unix seconds of the successful poll
    pub updated_at: i64,
    /// 1-minute load average
    pub load_1m: f64,
    /// 5-minute load average
    pub load_5m: f64,
    /// 15-minute load average
    pub load_15m: f64,
    /// Inbound byte counter
    pub net_recv_bytes: i64,
    /// Outbound byte counter
    pub net_send_bytes: i64,
    pub cpu_percent: f64,
    pub mem_ram_kbyte: i64,
    pub mem_ram_percent: f64,
    /// System-wide connection count
    pub conn_sys: i64,
    /// Connections held by the media server process
    pub conn_media: i64,
    pub uptime: f64,
}

/// Point-in-time listing of one server's active streams
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub host: String,
    /// Unix seconds of the successful poll
    pub updated_at: i64,
    pub streams: Vec<StreamInfo>,
}

/// One active stream as reported by a media server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: i64,
    pub name: String,
    pub vhost: i64,
    pub app: String,
    pub live_ms: i64,
    pub clients: i64,
    pub send_bytes: i64,
    pub recv_bytes: i64,
    /// Inbound bitrate over the last 30 s window, kbps
    pub recv_kbps_30s: i64,
    /// Outbound bitrate over the last 30 s window, kbps
    pub send_kbps_30s: i64,
    /// Client id of the publisher
    pub publisher_id: i64,
    /// Whether the publisher is currently pushing
    pub publisher_active: bool,
}
