use crate::adapter::AdapterError;
use crate::model::{Cidr, EntityId, EntityKind, ExtAttrs};
use crate::normalize::{
    IpRole, NormalizedAttrs, ReferenceLookup, ReferenceLookupFailed, ReferenceTable,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

/// RIR attached to aggregates created by a sync
pub const DEFAULT_RIR: &str = "RFC1918";

/// Prefix and aggregate statuses the source of truth accepts
pub const NETWORK_STATUSES: &[&str] = &["active", "reserved", "deprecated", "container"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRecord {
    pub id: Uuid,
    pub name: String,
}

impl NamedRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldType {
    Text,
    Date,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldRecord {
    pub id: Uuid,
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub content_types: BTreeSet<EntityKind>,
}

/// Structural references, tags and custom field data shared by all records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Uuid>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixRecord {
    pub id: Uuid,
    pub prefix: Cidr,
    pub status: String,
    #[serde(default)]
    pub description: String,
    /// Primary VLAN
    #[serde(default)]
    pub vlan: Option<Uuid>,
    /// All associated VLANs
    #[serde(default)]
    pub vlans: Vec<Uuid>,
    #[serde(default)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressRecord {
    pub id: Uuid,
    pub address: IpAddr,
    pub prefix_length: u8,
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub role: Option<IpRole>,
    #[serde(default)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VlanGroupRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VlanRecord {
    pub id: Uuid,
    pub vid: u16,
    pub name: String,
    #[serde(default)]
    pub group: Option<Uuid>,
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub id: Uuid,
    pub prefix: Cidr,
    #[serde(default)]
    pub rir: Option<Uuid>,
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: RecordMeta,
}

/// The source of truth's records and reference tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SotDatabase {
    #[serde(default)]
    pub sites: Vec<NamedRecord>,
    #[serde(default)]
    pub vrfs: Vec<NamedRecord>,
    #[serde(default)]
    pub roles: Vec<NamedRecord>,
    #[serde(default)]
    pub tenants: Vec<NamedRecord>,
    #[serde(default)]
    pub rirs: Vec<NamedRecord>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldRecord>,
    #[serde(default)]
    pub prefixes: Vec<PrefixRecord>,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddressRecord>,
    #[serde(default)]
    pub vlan_groups: Vec<VlanGroupRecord>,
    #[serde(default)]
    pub vlans: Vec<VlanRecord>,
    #[serde(default)]
    pub aggregates: Vec<AggregateRecord>,
    /// Reference lookups that failed since the adapter last drained them
    #[serde(skip)]
    pub unresolved: Vec<ReferenceLookupFailed>,
}

impl SotDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a database file; a missing file is an empty database.
    pub async fn read(path: &Path) -> Result<Self, AdapterError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).await?;
        let db: SotDatabase = serde_json::from_str(&content)?;
        Ok(db)
    }

    /// Write the database atomically (temp file + rename).
    pub async fn write(&self, path: &Path) -> Result<(), AdapterError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    pub fn find_prefix(&self, prefix: &Cidr) -> Option<usize> {
        self.prefixes.iter().position(|p| &p.prefix == prefix)
    }

    pub fn find_aggregate(&self, prefix: &Cidr) -> Option<usize> {
        self.aggregates.iter().position(|a| &a.prefix == prefix)
    }

    pub fn find_ip_address(&self, address: IpAddr, prefix_length: u8) -> Option<usize> {
        self.ip_addresses
            .iter()
            .position(|ip| ip.address == address && ip.prefix_length == prefix_length)
    }

    pub fn find_vlan_group(&self, name: &str) -> Option<usize> {
        self.vlan_groups.iter().position(|g| g.name == name)
    }

    pub fn vlan_group_id(&self, name: Option<&str>) -> Result<Option<Uuid>, AdapterError> {
        match name {
            Some(name) => self
                .find_vlan_group(name)
                .map(|idx| Some(self.vlan_groups[idx].id))
                .ok_or_else(|| AdapterError::NotFound(format!("VLAN group {}", name))),
            None => Ok(None),
        }
    }

    pub fn vlan_group_name(&self, id: Option<Uuid>) -> Option<String> {
        id.and_then(|id| self.vlan_groups.iter().find(|g| g.id == id))
            .map(|g| g.name.clone())
    }

    /// A VLAN by VID within a group (or outside any group).
    pub fn find_vlan(&self, vid: u16, group: Option<&str>) -> Option<usize> {
        let group_id = match group {
            Some(name) => Some(self.vlan_groups.get(self.find_vlan_group(name)?)?.id),
            None => None,
        };
        self.vlans
            .iter()
            .position(|v| v.vid == vid && v.group == group_id)
    }

    /// Index of the record behind an entity identifier.
    pub fn find(&self, id: &EntityId) -> Option<usize> {
        match id {
            EntityId::VlanGroup { name } => self.find_vlan_group(name),
            EntityId::Vlan { vid, vlangroup } => self.find_vlan(*vid, vlangroup.as_deref()),
            EntityId::Aggregate { network } => self.find_aggregate(network),
            EntityId::Prefix { network } => self.find_prefix(network),
            EntityId::IpAddress { address, prefix } => {
                self.find_ip_address(*address, prefix.prefix_len())
            }
        }
    }

    pub fn meta_mut(&mut self, id: &EntityId) -> Option<&mut RecordMeta> {
        let idx = self.find(id)?;
        let meta = match id.kind() {
            EntityKind::VlanGroup => &mut self.vlan_groups[idx].meta,
            EntityKind::Vlan => &mut self.vlans[idx].meta,
            EntityKind::Aggregate => &mut self.aggregates[idx].meta,
            EntityKind::Prefix => &mut self.prefixes[idx].meta,
            EntityKind::IpAddress => &mut self.ip_addresses[idx].meta,
        };
        Some(meta)
    }

    pub fn ensure_tag(
        &mut self,
        slug: &str,
        name: &str,
        description: &str,
        color: &str,
    ) -> &TagRecord {
        let idx = match self.tags.iter().position(|t| t.slug == slug) {
            Some(idx) => idx,
            None => {
                self.tags.push(TagRecord {
                    id: Uuid::new_v4(),
                    slug: slug.to_string(),
                    name: name.to_string(),
                    description: description.to_string(),
                    color: color.to_string(),
                });
                self.tags.len() - 1
            }
        };
        &self.tags[idx]
    }

    /// Get-or-create a custom field definition and register `kind` on it.
    pub fn ensure_custom_field(
        &mut self,
        key: &str,
        label: &str,
        field_type: CustomFieldType,
        kind: EntityKind,
    ) -> &CustomFieldRecord {
        let idx = match self.custom_fields.iter().position(|f| f.key == key) {
            Some(idx) => idx,
            None => {
                self.custom_fields.push(CustomFieldRecord {
                    id: Uuid::new_v4(),
                    key: key.to_string(),
                    label: label.to_string(),
                    field_type,
                    content_types: BTreeSet::new(),
                });
                self.custom_fields.len() - 1
            }
        };
        let field = &mut self.custom_fields[idx];
        field.content_types.insert(kind);
        field
    }

    pub fn get_or_create_rir(&mut self, name: &str) -> Uuid {
        if let Some(rir) = self.rirs.iter().find(|r| r.name == name) {
            return rir.id;
        }
        let rir = NamedRecord::new(name);
        let id = rir.id;
        self.rirs.push(rir);
        id
    }

    /// Custom fields that are not plain text (for example the "last synced"
    /// date) are bookkeeping, not extensibility attributes.
    fn is_bookkeeping_field(&self, key: &str) -> bool {
        self.custom_fields
            .iter()
            .any(|f| f.key == key && f.field_type != CustomFieldType::Text)
    }

    /// Extensibility attributes stored on a record
    pub fn ext_attrs(&self, meta: &RecordMeta) -> ExtAttrs {
        meta.custom_fields
            .iter()
            .filter(|(key, _)| !self.is_bookkeeping_field(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Write normalized attributes onto a record's metadata.
    ///
    /// Extensibility custom fields are replaced wholesale; bookkeeping fields
    /// are kept. Structural references are only set when they resolved.
    pub fn apply_normalized(
        &mut self,
        kind: EntityKind,
        meta: &mut RecordMeta,
        normalized: &NormalizedAttrs,
    ) {
        for (key, field) in &normalized.custom_fields {
            self.ensure_custom_field(key, &field.label, CustomFieldType::Text, kind);
        }

        let kept: BTreeMap<String, String> = meta
            .custom_fields
            .iter()
            .filter(|(key, _)| self.is_bookkeeping_field(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        meta.custom_fields = kept;
        meta.custom_fields.extend(normalized.custom_field_values());

        if normalized.site.is_some() {
            meta.site = normalized.site;
        }
        if normalized.vrf.is_some() {
            meta.vrf = normalized.vrf;
        }
        if normalized.tenant.is_some() {
            meta.tenant = normalized.tenant;
        }
        if normalized.role.is_some() {
            meta.role = normalized.role;
        }
    }
}

impl ReferenceLookup for SotDatabase {
    fn lookup(&self, table: ReferenceTable, name: &str) -> Option<Uuid> {
        let records = match table {
            ReferenceTable::Site => &self.sites,
            ReferenceTable::Vrf => &self.vrfs,
            ReferenceTable::Role => &self.roles,
            ReferenceTable::Tenant => &self.tenants,
        };
        records.iter().find(|r| r.name == name).map(|r| r.id)
    }
}
