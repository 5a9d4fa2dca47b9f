use crate::adapter::AdapterError;
use crate::model::ExtAttrs;
use crate::utils::slugify;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One extensibility attribute as the appliance reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtAttrValue {
    pub value: Value,
}

/// `{ "<Key>": { "value": <any> } }`
pub type RawExtAttrs = BTreeMap<String, ExtAttrValue>;

/// A VLAN assigned to a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVlanAssignment {
    /// Reference of the VLAN object
    pub vlan: String,
    pub id: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNetwork {
    #[serde(rename = "_ref", default)]
    pub reference: String,
    pub network: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub extattrs: RawExtAttrs,
    #[serde(default)]
    pub vlans: Vec<RawVlanAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNetworkContainer {
    #[serde(rename = "_ref", default)]
    pub reference: String,
    pub network: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub extattrs: RawExtAttrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIpAddress {
    #[serde(rename = "_ref", default)]
    pub reference: String,
    pub ip_address: String,
    /// Network the appliance files the address under
    pub network: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub extattrs: RawExtAttrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVlanView {
    #[serde(rename = "_ref", default)]
    pub reference: String,
    pub name: String,
    #[serde(default)]
    pub start_vlan: u16,
    #[serde(default)]
    pub end_vlan: u16,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub extattrs: RawExtAttrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVlan {
    /// `vlan/<opaque>:<View>/<name>/<vid>`
    #[serde(rename = "_ref")]
    pub reference: String,
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub status: String,
    #[serde(default)]
    pub extattrs: RawExtAttrs,
}

/// Access to the DDI appliance's records.
///
/// Networks are addressed by their CIDR string.
#[async_trait]
pub trait DdiClient: Send + Sync {
    async fn get_networks(&self) -> Result<Vec<RawNetwork>, AdapterError>;

    async fn get_network_containers(&self) -> Result<Vec<RawNetworkContainer>, AdapterError>;

    /// Addresses filed under `network`
    async fn get_ipv4_addresses(&self, network: &str) -> Result<Vec<RawIpAddress>, AdapterError>;

    async fn get_vlan_views(&self) -> Result<Vec<RawVlanView>, AdapterError>;

    async fn get_vlans(&self) -> Result<Vec<RawVlan>, AdapterError>;

    async fn create_network(&self, network: RawNetwork) -> Result<RawNetwork, AdapterError>;

    async fn update_network(&self, network: RawNetwork) -> Result<RawNetwork, AdapterError>;

    async fn delete_network(&self, network: &str) -> Result<(), AdapterError>;

    async fn create_network_container(
        &self,
        container: RawNetworkContainer,
    ) -> Result<RawNetworkContainer, AdapterError>;

    async fn update_network_container(
        &self,
        container: RawNetworkContainer,
    ) -> Result<RawNetworkContainer, AdapterError>;

    async fn delete_network_container(&self, network: &str) -> Result<(), AdapterError>;
}

/// Flatten appliance attributes to `slugify(key) -> value`, leaving out
/// `skip` keys. Non-string values keep their JSON rendering.
pub fn flatten_ext_attrs(raw: &RawExtAttrs, skip: &BTreeSet<String>) -> ExtAttrs {
    raw.iter()
        .map(|(key, attr)| {
            let value = match &attr.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (slugify(key), value)
        })
        .filter(|(key, _)| !skip.contains(key))
        .collect()
}

pub fn expand_ext_attrs(ext_attrs: &ExtAttrs) -> RawExtAttrs {
    ext_attrs
        .iter()
        .map(|(key, value)| {
            (
                key.clone(),
                ExtAttrValue {
                    value: Value::String(value.clone()),
                },
            )
        })
        .collect()
}

/// Name of the VLAN view a VLAN reference points into.
///
/// `vlan/ZG5zLnZsYW4kLmNvbS52bGFuX3ZpZXcuVkwxLjEuMTAuMTA:VL1/Test1/10` -> `VL1`
pub fn vlan_view_name(reference: &str) -> Option<String> {
    let segment = reference.split('/').nth(1)?;
    let view = segment.rsplit(':').next()?;
    if view.is_empty() {
        None
    } else {
        Some(view.to_string())
    }
}

/// Reference for a VLAN assignment built from the source of truth.
pub fn vlan_reference(view: Option<&str>, name: &str, vid: u16) -> String {
    format!("vlan/ssot:{}/{}/{}", view.unwrap_or_default(), name, vid)
}
