//! Per-type declarations: identifier fields, attribute fields, children and
//! the top-level processing order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    VlanGroup,
    Vlan,
    Aggregate,
    Prefix,
    IpAddress,
}

/// Static description of one entity type
#[derive(Debug)]
pub struct TypeSpec {
    pub kind: EntityKind,
    pub identifiers: &'static [&'static str],
    pub attributes: &'static [&'static str],
    /// Child types owned by this type, with the relation name
    pub children: &'static [(EntityKind, &'static str)],
}

static VLAN_GROUP: TypeSpec = TypeSpec {
    kind: EntityKind::VlanGroup,
    identifiers: &["name"],
    attributes: &["description", "ext_attrs"],
    children: &[(EntityKind::Vlan, "vlans")],
};

static VLAN: TypeSpec = TypeSpec {
    kind: EntityKind::Vlan,
    identifiers: &["vid", "vlangroup"],
    attributes: &["name", "description", "status", "ext_attrs"],
    children: &[],
};

static AGGREGATE: TypeSpec = TypeSpec {
    kind: EntityKind::Aggregate,
    identifiers: &["network"],
    attributes: &["description", "status", "ext_attrs"],
    children: &[],
};

static PREFIX: TypeSpec = TypeSpec {
    kind: EntityKind::Prefix,
    identifiers: &["network"],
    attributes: &["description", "status", "ext_attrs", "vlans"],
    children: &[(EntityKind::IpAddress, "ip_addresses")],
};

static IP_ADDRESS: TypeSpec = TypeSpec {
    kind: EntityKind::IpAddress,
    identifiers: &["address", "prefix"],
    attributes: &["status", "description", "dns_name", "ext_attrs"],
    children: &[],
};

impl EntityKind {
    /// Top-level processing order: every type appears after the types it
    /// depends on. Creates walk it forwards, deletes backwards.
    pub const ORDER: [EntityKind; 5] = [
        EntityKind::VlanGroup,
        EntityKind::Vlan,
        EntityKind::Aggregate,
        EntityKind::Prefix,
        EntityKind::IpAddress,
    ];

    pub fn spec(self) -> &'static TypeSpec {
        match self {
            EntityKind::VlanGroup => &VLAN_GROUP,
            EntityKind::Vlan => &VLAN,
            EntityKind::Aggregate => &AGGREGATE,
            EntityKind::Prefix => &PREFIX,
            EntityKind::IpAddress => &IP_ADDRESS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::VlanGroup => "vlangroup",
            EntityKind::Vlan => "vlan",
            EntityKind::Aggregate => "aggregate",
            EntityKind::Prefix => "prefix",
            EntityKind::IpAddress => "ipaddress",
        }
    }

    /// Position in [`EntityKind::ORDER`]
    pub fn rank(self) -> usize {
        Self::ORDER
            .iter()
            .position(|k| *k == self)
            .unwrap_or(Self::ORDER.len())
    }

    /// The parent type, if this type is declared as another type's child.
    pub fn parent(self) -> Option<EntityKind> {
        Self::ORDER
            .iter()
            .copied()
            .find(|k| k.spec().children.iter().any(|(child, _)| *child == self))
    }

    /// VLANs and VLAN groups are only deleted when explicitly enabled.
    pub fn is_vlan_type(self) -> bool {
        matches!(self, EntityKind::VlanGroup | EntityKind::Vlan)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ORDER
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownKind(s.to_string()))
    }
}
