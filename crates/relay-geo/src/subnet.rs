//! Subnet database records

use ipnetwork::Ipv4Network;
use relay_common::{IspType, RelayError, RelayResult};
use std::net::Ipv4Addr;

/// One line of the subnet database.
///
/// Line format is 7 comma-separated fields:
/// `{capitalFlag,cidr,ispLabel,ispName,latitude,longitude,description}`.
/// `capitalFlag == "E"` marks a province capital. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SubnetRecord {
    /// CIDR block as recorded in the database
    pub network: Ipv4Network,
    /// Carrier, normalized from the label field
    pub isp: IspType,
    /// Raw carrier label (`ct` / `cnc` / `cmcc` / ...)
    pub isp_label: String,
    /// Qualified name, `{province}_{carrier}`
    pub isp_name: String,
    /// Province name extracted from `isp_name`
    pub province: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    /// Whether this record represents the province capital
    pub capital: bool,
}

impl SubnetRecord {
    /// Parse one database line; malformed lines are reported, not fatal.
    pub fn parse(line: &str) -> RelayResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 7 {
            return Err(RelayError::MalformedRecord(format!(
                "{} fields in {:?}",
                fields.len(),
                line
            )));
        }

        let network: Ipv4Network = fields[1].parse().map_err(|e| {
            RelayError::MalformedRecord(format!("bad cidr {:?}: {}", fields[1], e))
        })?;

        let isp_name = fields[3].to_string();
        let province = match isp_name.split('_').collect::<Vec<_>>()[..] {
            [province, _] => province.to_string(),
            _ => String::new(),
        };

        Ok(Self {
            network,
            isp: IspType::from_label(fields[2]),
            isp_label: fields[2].to_string(),
            isp_name,
            province,
            latitude: fields[4].trim().parse().unwrap_or(0.0),
            longitude: fields[5].trim().parse().unwrap_or(0.0),
            description: fields[6].to_string(),
            capital: fields[0] == "E",
        })
    }

    /// Normalized lookup key: the network address plus prefix length.
    pub fn key(&self) -> String {
        format!("{}/{}", self.network.network(), self.network.prefix())
    }
}

/// Lookup key for an address under its default classful mask (A/8, B/16,
/// C/24; anything above class C gets a host mask and will simply miss).
///
/// The recorded prefix length of the matching subnet is deliberately not
/// consulted; resolution only succeeds when the classful granularity lines
/// up with the database.
pub fn classful_key(ip: Ipv4Addr) -> String {
    let prefix: u8 = match ip.octets()[0] {
        0..=127 => 8,
        128..=191 => 16,
        192..=223 => 24,
        _ => 32,
    };
    let mask = (u32::MAX >> (32 - prefix as u32)) << (32 - prefix as u32);
    let network = Ipv4Addr::from(u32::from(ip) & mask);
    format!("{}/{}", network, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capital_record() {
        let rec =
            SubnetRecord::parse("E,1.0.0.0/8,ct,beijing_ct,39.92,116.46,beijing telecom\n")
                .unwrap();
        assert!(rec.capital);
        assert_eq!(rec.province, "beijing");
        assert_eq!(rec.isp, IspType::Telecom);
        assert_eq!(rec.key(), "1.0.0.0/8");
        assert!((rec.latitude - 39.92).abs() < 1e-9);
    }

    #[test]
    fn test_parse_normalizes_network_address() {
        // Host bits in the CIDR field are masked off in the key
        let rec = SubnetRecord::parse("N,10.1.2.3/16,cnc,hebei_cnc,38.04,114.51,x").unwrap();
        assert_eq!(rec.key(), "10.1.0.0/16");
        assert!(!rec.capital);
        assert_eq!(rec.isp, IspType::Unicom);
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(matches!(
            SubnetRecord::parse("E,1.0.0.0/8,ct,beijing_ct,39.92,116.46"),
            Err(RelayError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_cidr() {
        assert!(SubnetRecord::parse("E,notacidr,ct,beijing_ct,39.92,116.46,x").is_err());
    }

    #[test]
    fn test_parse_province_requires_two_part_name() {
        let rec = SubnetRecord::parse("N,2.0.0.0/8,ct,nounderscore,1.0,2.0,x").unwrap();
        assert_eq!(rec.province, "");
    }

    #[test]
    fn test_classful_key_per_class() {
        assert_eq!(classful_key("111.204.243.7".parse().unwrap()), "111.0.0.0/8");
        assert_eq!(classful_key("130.10.20.30".parse().unwrap()), "130.10.0.0/16");
        assert_eq!(classful_key("203.0.113.9".parse().unwrap()), "203.0.113.0/24");
        assert_eq!(classful_key("224.0.0.5".parse().unwrap()), "224.0.0.5/32");
    }
}
