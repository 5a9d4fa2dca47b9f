use super::cidr::Cidr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Status assumed for prefixes and aggregates whose owner does not report one
pub const DEFAULT_NETWORK_STATUS: &str = "active";

/// Prefix status marking a container network, which never owns addresses
pub const CONTAINER_STATUS: &str = "container";

/// Flattened extensibility attributes (slugified key -> value)
pub type ExtAttrs = BTreeMap<String, String>;

fn default_network_status() -> String {
    DEFAULT_NETWORK_STATUS.to_string()
}

/// A VLAN referenced by a prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRef {
    pub vid: u16,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPrefix {
    pub network: Cidr,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_network_status")]
    pub status: String,
    #[serde(default)]
    pub ext_attrs: ExtAttrs,
    /// VLANs keyed by VID
    #[serde(default)]
    pub vlans: BTreeMap<u16, VlanRef>,
}

impl NetworkPrefix {
    pub fn new(network: Cidr) -> Self {
        Self {
            network,
            description: String::new(),
            status: default_network_status(),
            ext_attrs: ExtAttrs::new(),
            vlans: BTreeMap::new(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.status == CONTAINER_STATUS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: IpAddr,
    /// Most specific non-container prefix holding the address
    pub prefix: Cidr,
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub ext_attrs: ExtAttrs,
}

impl IpAddress {
    /// Always the length of the parent prefix.
    pub fn prefix_length(&self) -> u8 {
        self.prefix.prefix_len()
    }

    /// Only addresses with a DNS name take part in reconciliation.
    pub fn is_reconcilable(&self) -> bool {
        !self.dns_name.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ext_attrs: ExtAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub vid: u16,
    #[serde(default)]
    pub vlangroup: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub ext_attrs: ExtAttrs,
}

/// An address block aggregate (network container on the DDI side)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub network: Cidr,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_network_status")]
    pub status: String,
    #[serde(default)]
    pub ext_attrs: ExtAttrs,
}

impl Aggregate {
    pub fn new(network: Cidr) -> Self {
        Self {
            network,
            description: String::new(),
            status: default_network_status(),
            ext_attrs: ExtAttrs::new(),
        }
    }
}
