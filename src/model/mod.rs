//! Typed inventory records compared between the two sides of a run.
//!
//! Every record is an immutable value. Its identifier fields (see
//! [`TypeSpec::identifiers`]) form an [`EntityId`]; everything else is exposed
//! as a flat attribute map so the diff engine can compare records field by
//! field without knowing their concrete type.

mod cidr;
mod registry;
mod types;

pub use cidr::Cidr;
pub use registry::{EntityKind, TypeSpec};
pub use types::{
    Aggregate, ExtAttrs, IpAddress, NetworkPrefix, Vlan, VlanGroup, VlanRef, CONTAINER_STATUS,
    DEFAULT_NETWORK_STATUS,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Unknown entity type: {0}")]
    UnknownKind(String),

    #[error("Invalid attributes for {kind} {id}: {source}")]
    InvalidAttributes {
        kind: EntityKind,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Attribute name -> value
pub type Attrs = BTreeMap<String, Value>;

/// Identifier tuple of an entity, unique per type within one snapshot
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityId {
    VlanGroup { name: String },
    Vlan { vid: u16, vlangroup: Option<String> },
    Aggregate { network: Cidr },
    Prefix { network: Cidr },
    IpAddress { address: IpAddr, prefix: Cidr },
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::VlanGroup { .. } => EntityKind::VlanGroup,
            EntityId::Vlan { .. } => EntityKind::Vlan,
            EntityId::Aggregate { .. } => EntityKind::Aggregate,
            EntityId::Prefix { .. } => EntityKind::Prefix,
            EntityId::IpAddress { .. } => EntityKind::IpAddress,
        }
    }

    /// Identifier fields in the order declared by the type's `TypeSpec`
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        match self {
            EntityId::VlanGroup { name } => vec![("name", Value::from(name.as_str()))],
            EntityId::Vlan { vid, vlangroup } => vec![
                ("vid", Value::from(*vid)),
                (
                    "vlangroup",
                    vlangroup
                        .as_deref()
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                ),
            ],
            EntityId::Aggregate { network } | EntityId::Prefix { network } => {
                vec![("network", Value::from(network.to_string()))]
            }
            EntityId::IpAddress { address, prefix } => vec![
                ("address", Value::from(address.to_string())),
                ("prefix", Value::from(prefix.to_string())),
            ],
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::VlanGroup { name } => write!(f, "{}", name),
            EntityId::Vlan { vid, vlangroup } => match vlangroup {
                Some(group) => write!(f, "{}__{}", vid, group),
                None => write!(f, "{}", vid),
            },
            EntityId::Aggregate { network } | EntityId::Prefix { network } => {
                write!(f, "{}", network)
            }
            EntityId::IpAddress { address, prefix } => {
                write!(f, "{}/{}__{}", address, prefix.prefix_len(), prefix)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    VlanGroup(VlanGroup),
    Vlan(Vlan),
    Aggregate(Aggregate),
    Prefix(NetworkPrefix),
    IpAddress(IpAddress),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::VlanGroup(_) => EntityKind::VlanGroup,
            Entity::Vlan(_) => EntityKind::Vlan,
            Entity::Aggregate(_) => EntityKind::Aggregate,
            Entity::Prefix(_) => EntityKind::Prefix,
            Entity::IpAddress(_) => EntityKind::IpAddress,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Entity::VlanGroup(g) => EntityId::VlanGroup {
                name: g.name.clone(),
            },
            Entity::Vlan(v) => EntityId::Vlan {
                vid: v.vid,
                vlangroup: v.vlangroup.clone(),
            },
            Entity::Aggregate(a) => EntityId::Aggregate { network: a.network },
            Entity::Prefix(p) => EntityId::Prefix { network: p.network },
            Entity::IpAddress(ip) => EntityId::IpAddress {
                address: ip.address,
                prefix: ip.prefix,
            },
        }
    }

    /// All non-identifier fields as a flat map.
    pub fn attrs(&self) -> Attrs {
        let value = match self {
            Entity::VlanGroup(g) => serde_json::to_value(g),
            Entity::Vlan(v) => serde_json::to_value(v),
            Entity::Aggregate(a) => serde_json::to_value(a),
            Entity::Prefix(p) => serde_json::to_value(p),
            Entity::IpAddress(ip) => serde_json::to_value(ip),
        };

        let mut object = match value {
            Ok(Value::Object(object)) => object,
            _ => Map::new(),
        };
        for field in self.kind().spec().identifiers {
            object.remove(*field);
        }
        object.into_iter().collect()
    }

    /// Rebuild an entity from its identifier and attribute map.
    ///
    /// Attributes missing from `attrs` take the type's defaults.
    pub fn from_parts(id: &EntityId, attrs: &Attrs) -> Result<Self, ModelError> {
        let mut object: Map<String, Value> = attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (field, value) in id.fields() {
            object.insert(field.to_string(), value);
        }

        let value = Value::Object(object);
        let invalid = |source| ModelError::InvalidAttributes {
            kind: id.kind(),
            id: id.to_string(),
            source,
        };

        let entity = match id.kind() {
            EntityKind::VlanGroup => {
                Entity::VlanGroup(serde_json::from_value(value).map_err(invalid)?)
            }
            EntityKind::Vlan => Entity::Vlan(serde_json::from_value(value).map_err(invalid)?),
            EntityKind::Aggregate => {
                Entity::Aggregate(serde_json::from_value(value).map_err(invalid)?)
            }
            EntityKind::Prefix => Entity::Prefix(serde_json::from_value(value).map_err(invalid)?),
            EntityKind::IpAddress => {
                Entity::IpAddress(serde_json::from_value(value).map_err(invalid)?)
            }
        };
        Ok(entity)
    }

    /// A copy of this entity with `changed` attributes overlaid.
    pub fn with_changes(&self, changed: &Attrs) -> Result<Self, ModelError> {
        let mut attrs = self.attrs();
        for (key, value) in changed {
            attrs.insert(key.clone(), value.clone());
        }
        Self::from_parts(&self.id(), &attrs)
    }

    pub fn as_prefix(&self) -> Option<&NetworkPrefix> {
        match self {
            Entity::Prefix(p) => Some(p),
            _ => None,
        }
    }
}

impl From<VlanGroup> for Entity {
    fn from(value: VlanGroup) -> Self {
        Entity::VlanGroup(value)
    }
}

impl From<Vlan> for Entity {
    fn from(value: Vlan) -> Self {
        Entity::Vlan(value)
    }
}

impl From<Aggregate> for Entity {
    fn from(value: Aggregate) -> Self {
        Entity::Aggregate(value)
    }
}

impl From<NetworkPrefix> for Entity {
    fn from(value: NetworkPrefix) -> Self {
        Entity::Prefix(value)
    }
}

impl From<IpAddress> for Entity {
    fn from(value: IpAddress) -> Self {
        Entity::IpAddress(value)
    }
}
