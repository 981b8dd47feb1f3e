//! Subnet lookup table and the province distance graph

use crate::distance::earth_distance;
use crate::subnet::{classful_key, SubnetRecord};
use relay_common::{IspType, RelayError, RelayResult};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Identifier of a province node: index into the node table
pub type ProvinceId = usize;

/// Fallback province when an address cannot be resolved
pub const DEFAULT_PROVINCE: &str = "beijing";

/// Distance from one province's capital to another's
#[derive(Debug, Clone)]
pub struct ProvinceDistance {
    pub target: ProvinceId,
    pub name: String,
    pub meters: f64,
}

/// Geographic partition unit: a province and its proximity ranking
#[derive(Debug, Clone)]
pub struct ProvinceNode {
    pub id: ProvinceId,
    pub name: String,
    /// The capital-flagged subnet record representing this province
    pub capital: Arc<SubnetRecord>,
    /// Every province (self included, first at distance 0) ordered by
    /// ascending capital distance
    pub targets: Vec<ProvinceDistance>,
}

/// Immutable subnet/province index, built once at startup.
#[derive(Debug)]
pub struct GeoIndex {
    subnets: HashMap<String, Arc<SubnetRecord>>,
    provinces: Vec<ProvinceNode>,
    by_name: HashMap<String, ProvinceId>,
    default_province: ProvinceId,
}

impl GeoIndex {
    /// Load the subnet database from a file. A missing or unreadable file
    /// is fatal; individual malformed lines are skipped with a warning.
    pub fn load<P: AsRef<Path>>(path: P, default_province: &str) -> RelayResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, default_province)
    }

    /// Build the index from any line-oriented source.
    pub fn from_reader<R: Read>(reader: R, default_province: &str) -> RelayResult<Self> {
        let mut subnets: HashMap<String, Arc<SubnetRecord>> = HashMap::new();
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match SubnetRecord::parse(&line) {
                Ok(record) => {
                    subnets.insert(record.key(), Arc::new(record));
                }
                Err(e) => warn!("skipping subnet record at line {}: {}", lineno + 1, e),
            }
        }

        // One node per province, discovered from capital-flagged records.
        // Sorted by name so province ids are stable across runs.
        let mut capitals: Vec<Arc<SubnetRecord>> = subnets
            .values()
            .filter(|record| record.capital && !record.province.is_empty())
            .cloned()
            .collect();
        capitals.sort_by(|a, b| a.province.cmp(&b.province));
        capitals.dedup_by(|a, b| a.province == b.province);

        let mut provinces: Vec<ProvinceNode> = capitals
            .into_iter()
            .enumerate()
            .map(|(id, capital)| ProvinceNode {
                id,
                name: capital.province.clone(),
                capital,
                targets: Vec::new(),
            })
            .collect();

        let by_name: HashMap<String, ProvinceId> = provinces
            .iter()
            .map(|node| (node.name.clone(), node.id))
            .collect();

        // Complete distance graph: every capital to every other capital,
        // ascending. Self-distance is 0 by construction and sorts first.
        let coords: Vec<(f64, f64, String)> = provinces
            .iter()
            .map(|node| (node.capital.latitude, node.capital.longitude, node.name.clone()))
            .collect();
        for node in provinces.iter_mut() {
            let (src_lat, src_lon) = (node.capital.latitude, node.capital.longitude);
            let mut targets: Vec<ProvinceDistance> = coords
                .iter()
                .enumerate()
                .map(|(target, (lat, lon, name))| {
                    let mut meters = earth_distance(src_lat, src_lon, *lat, *lon);
                    if meters.is_nan() {
                        meters = 0.0;
                    }
                    ProvinceDistance {
                        target,
                        name: name.clone(),
                        meters,
                    }
                })
                .collect();
            targets.sort_by(|a, b| {
                a.meters
                    .partial_cmp(&b.meters)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            node.targets = targets;
        }

        let default_province = *by_name.get(default_province).ok_or_else(|| {
            RelayError::Config(format!(
                "default province {:?} has no capital record",
                default_province
            ))
        })?;

        info!(
            "geo index built: {} subnets, {} provinces",
            subnets.len(),
            provinces.len()
        );

        Ok(Self {
            subnets,
            provinces,
            by_name,
            default_province,
        })
    }

    /// Resolve a raw address to its owning subnet record via the default
    /// classful mask of its class. Misses when the classful granularity
    /// does not line up with the recorded blocks.
    pub fn resolve(&self, addr: &str) -> RelayResult<Arc<SubnetRecord>> {
        let ip: Ipv4Addr = addr
            .parse()
            .map_err(|_| RelayError::UnresolvedAddress(addr.to_string()))?;
        self.subnets
            .get(&classful_key(ip))
            .cloned()
            .ok_or_else(|| RelayError::UnresolvedAddress(addr.to_string()))
    }

    /// Resolve with the fallback policy: an unresolvable address maps to
    /// the default province and Telecom, as does a resolved record whose
    /// province has no capital node.
    pub fn resolve_or_default(&self, addr: &str) -> (ProvinceId, IspType) {
        match self.resolve(addr) {
            Ok(record) => {
                let id = self
                    .by_name
                    .get(&record.province)
                    .copied()
                    .unwrap_or(self.default_province);
                (id, record.isp)
            }
            Err(_) => (self.default_province, IspType::Telecom),
        }
    }

    pub fn province(&self, id: ProvinceId) -> Option<&ProvinceNode> {
        self.provinces.get(id)
    }

    pub fn provinces(&self) -> &[ProvinceNode] {
        &self.provinces
    }

    pub fn province_id(&self, name: &str) -> Option<ProvinceId> {
        self.by_name.get(name).copied()
    }

    pub fn province_count(&self) -> usize {
        self.provinces.len()
    }

    pub fn subnet_count(&self) -> usize {
        self.subnets.len()
    }

    pub fn default_province(&self) -> ProvinceId {
        self.default_province
    }
}
