//! Maps free-form extensibility attributes onto structured destination fields.
//!
//! Reserved keys (site/facility, vrf, role, tenant/dept/department) are
//! resolved by exact name against the destination's reference tables. Every
//! key, reserved or not, is also kept verbatim as a generic custom field.

use crate::model::{EntityKind, ExtAttrs};
use crate::utils::slugify;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Destination reference tables an attribute may point into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceTable {
    Site,
    Vrf,
    Role,
    Tenant,
}

impl fmt::Display for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceTable::Site => "Site",
            ReferenceTable::Vrf => "VRF",
            ReferenceTable::Role => "Role",
            ReferenceTable::Tenant => "Tenant",
        };
        f.write_str(name)
    }
}

/// Exact-name lookup into the destination's own reference tables.
pub trait ReferenceLookup {
    fn lookup(&self, table: ReferenceTable, name: &str) -> Option<Uuid>;
}

/// A reserved attribute whose value names no known reference. Recorded and
/// logged; never stops a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unable to find {table} '{value}' found in extensibility attribute '{key}'")]
pub struct ReferenceLookupFailed {
    pub table: ReferenceTable,
    pub key: String,
    pub value: String,
}

/// Fixed IP address roles, matched case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpRole {
    Loopback,
    Secondary,
    Anycast,
    Vip,
    Vrrp,
    Hsrp,
    Glbp,
    Carp,
}

impl IpRole {
    pub const ALL: [IpRole; 8] = [
        IpRole::Loopback,
        IpRole::Secondary,
        IpRole::Anycast,
        IpRole::Vip,
        IpRole::Vrrp,
        IpRole::Hsrp,
        IpRole::Glbp,
        IpRole::Carp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IpRole::Loopback => "loopback",
            IpRole::Secondary => "secondary",
            IpRole::Anycast => "anycast",
            IpRole::Vip => "vip",
            IpRole::Vrrp => "vrrp",
            IpRole::Hsrp => "hsrp",
            IpRole::Glbp => "glbp",
            IpRole::Carp => "carp",
        }
    }

    pub fn parse_ci(value: &str) -> Option<IpRole> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(value))
    }
}

/// Structured fields derived from one record's extensibility attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedAttrs {
    pub site: Option<Uuid>,
    pub vrf: Option<Uuid>,
    pub tenant: Option<Uuid>,
    /// Role reference (prefixes, VLANs, ...)
    pub role: Option<Uuid>,
    /// Role enumeration value (IP addresses only)
    pub ip_role: Option<IpRole>,
    /// slugified key -> (raw key used as label, raw value)
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
    pub unresolved: Vec<ReferenceLookupFailed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldValue {
    pub label: String,
    pub value: String,
}

impl NormalizedAttrs {
    /// Custom fields as a plain key -> value map
    pub fn custom_field_values(&self) -> BTreeMap<String, String> {
        self.custom_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

/// Reference table a reserved key points into
fn classify(key: &str) -> Option<ReferenceTable> {
    let key = key.to_lowercase();
    match key.as_str() {
        "site" | "facility" => Some(ReferenceTable::Site),
        "vrf" => Some(ReferenceTable::Vrf),
        "tenant" | "dept" | "department" => Some(ReferenceTable::Tenant),
        _ if key.contains("role") => Some(ReferenceTable::Role),
        _ => None,
    }
}

/// Normalize one record's extensibility attributes for a destination entity
/// of type `kind`.
pub fn normalize_ext_attrs(
    kind: EntityKind,
    ext_attrs: &ExtAttrs,
    lookup: &dyn ReferenceLookup,
) -> NormalizedAttrs {
    let mut normalized = NormalizedAttrs::default();

    for (key, value) in ext_attrs {
        match classify(key) {
            // IP addresses carry a role enumeration, not a role reference
            Some(ReferenceTable::Role) if kind == EntityKind::IpAddress => {
                match IpRole::parse_ci(value) {
                    Some(role) => normalized.ip_role = Some(role),
                    None => {
                        warn!(
                            key = %key,
                            value = %value,
                            "'{}' is not an IP address role; keeping it as a custom field only",
                            value
                        );
                    }
                }
            }
            Some(table) => {
                let found = resolve(lookup, table, key, value, &mut normalized.unresolved);
                if let Some(found) = found {
                    let slot = match table {
                        ReferenceTable::Site => &mut normalized.site,
                        ReferenceTable::Vrf => &mut normalized.vrf,
                        ReferenceTable::Role => &mut normalized.role,
                        ReferenceTable::Tenant => &mut normalized.tenant,
                    };
                    *slot = Some(found);
                }
            }
            None => {}
        }

        normalized.custom_fields.insert(
            slugify(key),
            CustomFieldValue {
                label: key.clone(),
                value: value.clone(),
            },
        );
    }

    normalized
}

fn resolve(
    lookup: &dyn ReferenceLookup,
    table: ReferenceTable,
    key: &str,
    value: &str,
    unresolved: &mut Vec<ReferenceLookupFailed>,
) -> Option<Uuid> {
    let found = lookup.lookup(table, value);
    if found.is_none() {
        let failure = ReferenceLookupFailed {
            table,
            key: key.to_string(),
            value: value.to_string(),
        };
        warn!(table = %table, key = %key, value = %value, "{}", failure);
        unresolved.push(failure);
    }
    found
}
