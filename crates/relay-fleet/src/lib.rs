//! Fleet registry and geo/ISP dispatch engine
//!
//! Tracks a fleet of media-streaming edge/origin servers: each registered
//! server lands in exactly one (province, role, carrier) pool bucket and
//! gets its own recurring health poller. Dispatch walks the client's home
//! province distance ranking and returns an ordered, deduplicated,
//! availability-filtered server list.

pub mod client;
pub mod poller;
pub mod pool;
pub mod registry;
pub mod server;
pub mod store;

pub use client::{kick_off_with_retry, HttpMediaApi, MediaServerApi, KICKOFF_ATTEMPTS};
pub use poller::{HealthPoller, POLL_INTERVAL};
pub use pool::RegionPool;
pub use registry::{FleetRegistry, ServerSnapshot, RESORT_INTERVAL};
pub use server::ServerRecord;
pub use store::{MemoryStore, ServerStore, StoredServer};
