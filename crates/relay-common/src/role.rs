//! Server roles and carrier partitions

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of server roles
pub const ROLE_COUNT: usize = 3;

/// Number of carrier partitions
pub const ISP_COUNT: usize = 3;

/// A server's function in the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServerRole {
    /// Ingest edge (publishers push here)
    EdgeUpload = 0,
    /// Egress edge (viewers pull from here)
    EdgeDownload = 1,
    /// Origin server
    Origin = 2,
}

impl ServerRole {
    /// All roles in bucket-index order
    pub const ALL: [Self; ROLE_COUNT] = [Self::EdgeUpload, Self::EdgeDownload, Self::Origin];

    /// Bucket index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire name used by the management surface
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EdgeUpload => "edgeup",
            Self::EdgeDownload => "edgedown",
            Self::Origin => "origin",
        }
    }

    /// Parse a wire name
    pub fn from_name(name: &str) -> Result<Self, RelayError> {
        match name {
            "edgeup" => Ok(Self::EdgeUpload),
            "edgedown" => Ok(Self::EdgeDownload),
            "origin" => Ok(Self::Origin),
            other => Err(RelayError::UnknownRole(other.to_string())),
        }
    }

    /// Numeric code stored in the server table
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Parse a stored numeric code
    pub fn from_code(code: i64) -> Result<Self, RelayError> {
        match code {
            0 => Ok(Self::EdgeUpload),
            1 => Ok(Self::EdgeDownload),
            2 => Ok(Self::Origin),
            other => Err(RelayError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Carrier classification used to partition server pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IspType {
    Telecom = 0,
    Unicom = 1,
    Mobile = 2,
}

impl Default for IspType {
    fn default() -> Self {
        Self::Telecom
    }
}

impl IspType {
    /// All carriers in bucket-index order
    pub const ALL: [Self; ISP_COUNT] = [Self::Telecom, Self::Unicom, Self::Mobile];

    /// Bucket index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Map a subnet-database carrier label; unrecognized labels normalize
    /// to Telecom.
    pub fn from_label(label: &str) -> Self {
        match label {
            "ct" => Self::Telecom,
            "cnc" => Self::Unicom,
            "cmcc" => Self::Mobile,
            _ => Self::Telecom,
        }
    }

    /// Carrier label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telecom => "ct",
            Self::Unicom => "cnc",
            Self::Mobile => "cmcc",
        }
    }
}

impl fmt::Display for IspType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_round_trip() {
        for role in ServerRole::ALL {
            assert_eq!(ServerRole::from_name(role.as_str()).unwrap(), role);
            assert_eq!(ServerRole::from_code(role.code()).unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(matches!(
            ServerRole::from_name("cdn"),
            Err(RelayError::UnknownRole(_))
        ));
        assert!(ServerRole::from_code(7).is_err());
    }

    #[test]
    fn test_isp_label_normalizes_to_telecom() {
        assert_eq!(IspType::from_label("ct"), IspType::Telecom);
        assert_eq!(IspType::from_label("cnc"), IspType::Unicom);
        assert_eq!(IspType::from_label("cmcc"), IspType::Mobile);
        assert_eq!(IspType::from_label("drpeng"), IspType::Telecom);
        assert_eq!(IspType::from_label(""), IspType::Telecom);
    }

    #[test]
    fn test_indexes_are_dense() {
        for (i, role) in ServerRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
        for (i, isp) in IspType::ALL.iter().enumerate() {
            assert_eq!(isp.index(), i);
        }
    }
}
