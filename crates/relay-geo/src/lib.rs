//! Geographic index for the openrelay fleet
//!
//! Parses the flat subnet database once at startup, resolves raw addresses
//! to their owning subnet record and precomputes, for every province, the
//! full list of other provinces ordered by capital-to-capital distance.
//! Immutable after construction; safe to share without locking.

pub mod distance;
pub mod index;
pub mod subnet;

pub use distance::{earth_distance, EARTH_RADIUS_M};
pub use index::{GeoIndex, ProvinceDistance, ProvinceId, ProvinceNode};
pub use subnet::{classful_key, SubnetRecord};
