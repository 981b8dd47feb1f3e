//! Shared types for the openrelay control plane
//!
//! Error taxonomy, role/carrier partitions and the snapshot value objects
//! exchanged between the fleet registry and its collaborators.

pub mod error;
pub mod role;
pub mod snapshot;

pub use error::{RelayError, RelayResult};
pub use role::{IspType, ServerRole, ISP_COUNT, ROLE_COUNT};
pub use snapshot::{
    HealthSnapshot, StreamInfo, StreamSnapshot, MAX_LOAD_AVG, MAX_OUTBOUND_BYTES,
};
