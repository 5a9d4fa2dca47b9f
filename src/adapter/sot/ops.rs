use super::database::{
    AggregateRecord, IpAddressRecord, PrefixRecord, RecordMeta, SotDatabase, VlanGroupRecord,
    VlanRecord, DEFAULT_RIR, NETWORK_STATUSES,
};
use super::{
    aggregate_from_record, ip_from_record, prefix_from_record, vlan_from_record,
    vlan_group_from_record,
};
use crate::adapter::{AdapterError, EntityOps};
use crate::model::{
    Aggregate, Attrs, Entity, EntityId, EntityKind, ExtAttrs, IpAddress, NetworkPrefix, Vlan,
    VlanGroup, CONTAINER_STATUS,
};
use crate::normalize::{normalize_ext_attrs, NormalizedAttrs};
use crate::utils::slugify;
use crate::vocab::{ip_address_status, vlan_status, Direction, VocabError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub(super) type SharedDb = Arc<Mutex<SotDatabase>>;

fn not_found(id: &EntityId) -> AdapterError {
    AdapterError::NotFound(format!("{} {}", id.kind(), id))
}

fn wrong_type(id: &EntityId) -> AdapterError {
    AdapterError::Invalid(format!("attributes for {} {} built another entity type", id.kind(), id))
}

fn check_network_status(value: &str) -> Result<(), AdapterError> {
    if NETWORK_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(VocabError::UnknownStatus {
            concept: "prefix status",
            value: value.to_string(),
        }
        .into())
    }
}

fn ext_attrs_changed(changed: &Attrs) -> bool {
    changed.contains_key("ext_attrs")
}

fn apply_ext_attrs(
    db: &mut SotDatabase,
    kind: EntityKind,
    meta: &mut RecordMeta,
    ext_attrs: &ExtAttrs,
) -> NormalizedAttrs {
    let normalized = normalize_ext_attrs(kind, ext_attrs, &*db);
    db.apply_normalized(kind, meta, &normalized);
    db.unresolved.extend(normalized.unresolved.iter().cloned());
    normalized
}

pub struct PrefixOps {
    db: SharedDb,
}

impl PrefixOps {
    pub(super) fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

fn write_prefix(
    db: &mut SotDatabase,
    record: &mut PrefixRecord,
    prefix: &NetworkPrefix,
    ext_changed: bool,
) -> Result<(), AdapterError> {
    check_network_status(&prefix.status)?;

    record.status = prefix.status.clone();
    record.description = prefix.description.clone();
    record.vlans = prefix
        .vlans
        .values()
        .filter_map(|vlan| {
            let found = db
                .find_vlan(vlan.vid, vlan.group.as_deref())
                .filter(|&idx| db.vlans[idx].name == vlan.name);
            match found {
                Some(idx) => Some(db.vlans[idx].id),
                None => {
                    warn!(
                        prefix = %prefix.network,
                        vid = vlan.vid,
                        name = %vlan.name,
                        "VLAN {} ({}) is not known; leaving it off the prefix",
                        vlan.vid,
                        vlan.name
                    );
                    None
                }
            }
        })
        .collect();
    record.vlan = record.vlans.first().copied();

    if ext_changed {
        apply_ext_attrs(db, EntityKind::Prefix, &mut record.meta, &prefix.ext_attrs);
    }
    Ok(())
}

#[async_trait]
impl EntityOps for PrefixOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let prefix = match &entity {
            Entity::Prefix(p) => p,
            _ => return Err(wrong_type(id)),
        };

        let mut db = self.db.lock().await;
        if db.find_prefix(&prefix.network).is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let mut record = PrefixRecord {
            id: Uuid::new_v4(),
            prefix: prefix.network,
            status: String::new(),
            description: String::new(),
            vlan: None,
            vlans: Vec::new(),
            meta: RecordMeta::default(),
        };
        write_prefix(&mut db, &mut record, prefix, true)?;
        db.prefixes.push(record);

        debug!(prefix = %prefix.network, "Created prefix");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;

        let current = Entity::from(prefix_from_record(&db, &db.prefixes[idx]));
        let updated = current.with_changes(changed)?;
        let prefix = match &updated {
            Entity::Prefix(p) => p,
            _ => return Err(wrong_type(id)),
        };

        let mut record = db.prefixes[idx].clone();
        write_prefix(&mut db, &mut record, prefix, ext_attrs_changed(changed))?;
        db.prefixes[idx] = record;

        debug!(prefix = %prefix.network, "Updated prefix");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;
        let record = db.prefixes.remove(idx);

        debug!(prefix = %record.prefix, "Deleted prefix");
        Ok(())
    }
}

pub struct IpAddressOps {
    db: SharedDb,
}

impl IpAddressOps {
    pub(super) fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

fn write_ip_address(
    db: &mut SotDatabase,
    record: &mut IpAddressRecord,
    ip: &IpAddress,
    ext_changed: bool,
) -> Result<(), AdapterError> {
    let status = ip_address_status(&ip.status, Direction::ToSot)?;

    let parent = db
        .find_prefix(&ip.prefix)
        .ok_or_else(|| AdapterError::NotFound(format!("parent prefix {}", ip.prefix)))?;
    if db.prefixes[parent].status == CONTAINER_STATUS {
        return Err(AdapterError::Invalid(format!(
            "{} is a container and cannot hold {}",
            ip.prefix, ip.address
        )));
    }

    record.prefix_length = ip.prefix_length();
    record.status = status.to_string();
    record.description = ip.description.clone();
    record.dns_name = ip.dns_name.clone();

    if ext_changed {
        let normalized =
            apply_ext_attrs(db, EntityKind::IpAddress, &mut record.meta, &ip.ext_attrs);
        record.role = normalized.ip_role;
    }
    Ok(())
}

#[async_trait]
impl EntityOps for IpAddressOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let ip = match &entity {
            Entity::IpAddress(ip) => ip,
            _ => return Err(wrong_type(id)),
        };
        if !ip.prefix.contains(ip.address) {
            return Err(AdapterError::Invalid(format!(
                "{} is outside its prefix {}",
                ip.address, ip.prefix
            )));
        }

        let mut db = self.db.lock().await;
        if db.find(id).is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let mut record = IpAddressRecord {
            id: Uuid::new_v4(),
            address: ip.address,
            prefix_length: ip.prefix_length(),
            status: String::new(),
            description: String::new(),
            dns_name: String::new(),
            role: None,
            meta: RecordMeta::default(),
        };
        write_ip_address(&mut db, &mut record, ip, true)?;
        db.ip_addresses.push(record);

        debug!(address = %ip.address, prefix = %ip.prefix, "Created IP address");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let prefix = match id {
            EntityId::IpAddress { prefix, .. } => *prefix,
            _ => return Err(wrong_type(id)),
        };

        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;

        let current = Entity::from(ip_from_record(&db, &db.ip_addresses[idx], prefix));
        let updated = current.with_changes(changed)?;
        let ip = match &updated {
            Entity::IpAddress(ip) => ip,
            _ => return Err(wrong_type(id)),
        };

        let mut record = db.ip_addresses[idx].clone();
        write_ip_address(&mut db, &mut record, ip, ext_attrs_changed(changed))?;
        db.ip_addresses[idx] = record;

        debug!(address = %ip.address, "Updated IP address");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;
        let record = db.ip_addresses.remove(idx);

        debug!(address = %record.address, "Deleted IP address");
        Ok(())
    }
}

pub struct VlanGroupOps {
    db: SharedDb,
}

impl VlanGroupOps {
    pub(super) fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

fn write_vlan_group(
    db: &mut SotDatabase,
    record: &mut VlanGroupRecord,
    group: &VlanGroup,
    ext_changed: bool,
) {
    record.slug = slugify(&group.name);
    record.description = group.description.clone();
    if ext_changed {
        apply_ext_attrs(db, EntityKind::VlanGroup, &mut record.meta, &group.ext_attrs);
    }
}

#[async_trait]
impl EntityOps for VlanGroupOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let group = match &entity {
            Entity::VlanGroup(g) => g,
            _ => return Err(wrong_type(id)),
        };

        let mut db = self.db.lock().await;
        if db.find_vlan_group(&group.name).is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let mut record = VlanGroupRecord {
            id: Uuid::new_v4(),
            name: group.name.clone(),
            slug: String::new(),
            description: String::new(),
            meta: RecordMeta::default(),
        };
        write_vlan_group(&mut db, &mut record, group, true);
        db.vlan_groups.push(record);

        debug!(group = %group.name, "Created VLAN group");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;

        let current = Entity::from(vlan_group_from_record(&db, &db.vlan_groups[idx]));
        let updated = current.with_changes(changed)?;
        let group = match &updated {
            Entity::VlanGroup(g) => g,
            _ => return Err(wrong_type(id)),
        };

        let mut record = db.vlan_groups[idx].clone();
        write_vlan_group(&mut db, &mut record, group, ext_attrs_changed(changed));
        db.vlan_groups[idx] = record;

        debug!(group = %group.name, "Updated VLAN group");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;
        let record = db.vlan_groups.remove(idx);

        for vlan in db.vlans.iter_mut().filter(|v| v.group == Some(record.id)) {
            vlan.group = None;
        }

        debug!(group = %record.name, "Deleted VLAN group");
        Ok(())
    }
}

pub struct VlanOps {
    db: SharedDb,
}

impl VlanOps {
    pub(super) fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

fn write_vlan(
    db: &mut SotDatabase,
    record: &mut VlanRecord,
    vlan: &Vlan,
    ext_changed: bool,
) -> Result<(), AdapterError> {
    let status = vlan_status(&vlan.status, Direction::ToSot)?;
    let group = db.vlan_group_id(vlan.vlangroup.as_deref())?;

    record.vid = vlan.vid;
    record.name = vlan.name.clone();
    record.description = vlan.description.clone();
    record.status = status.to_string();
    record.group = group;

    if ext_changed {
        apply_ext_attrs(db, EntityKind::Vlan, &mut record.meta, &vlan.ext_attrs);
    }
    align_site(db, record);
    Ok(())
}

/// A VLAN and its group share a site: whichever side has one lends it to
/// the other.
fn align_site(db: &mut SotDatabase, record: &mut VlanRecord) {
    let group_id = match record.group {
        Some(id) => id,
        None => return,
    };
    let group = match db.vlan_groups.iter_mut().find(|g| g.id == group_id) {
        Some(group) => group,
        None => return,
    };

    match (record.meta.site, group.meta.site) {
        (None, Some(site)) => record.meta.site = Some(site),
        (Some(site), None) => {
            debug!(group = %group.name, vid = record.vid, "Assigning VLAN site to its group");
            group.meta.site = Some(site);
        }
        _ => {}
    }
}

#[async_trait]
impl EntityOps for VlanOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let vlan = match &entity {
            Entity::Vlan(v) => v,
            _ => return Err(wrong_type(id)),
        };

        let mut db = self.db.lock().await;
        if db.find(id).is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let mut record = VlanRecord {
            id: Uuid::new_v4(),
            vid: vlan.vid,
            name: String::new(),
            group: None,
            status: String::new(),
            description: String::new(),
            meta: RecordMeta::default(),
        };
        write_vlan(&mut db, &mut record, vlan, true)?;
        db.vlans.push(record);

        debug!(vid = vlan.vid, group = ?vlan.vlangroup, "Created VLAN");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;

        let current = Entity::from(vlan_from_record(&db, &db.vlans[idx]));
        let updated = current.with_changes(changed)?;
        let vlan = match &updated {
            Entity::Vlan(v) => v,
            _ => return Err(wrong_type(id)),
        };

        let mut record = db.vlans[idx].clone();
        write_vlan(&mut db, &mut record, vlan, ext_attrs_changed(changed))?;
        db.vlans[idx] = record;

        debug!(vid = vlan.vid, "Updated VLAN");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;
        let record = db.vlans.remove(idx);

        for prefix in db.prefixes.iter_mut() {
            prefix.vlans.retain(|v| *v != record.id);
            if prefix.vlan == Some(record.id) {
                prefix.vlan = prefix.vlans.first().copied();
            }
        }

        debug!(vid = record.vid, "Deleted VLAN");
        Ok(())
    }
}

pub struct AggregateOps {
    db: SharedDb,
}

impl AggregateOps {
    pub(super) fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

fn write_aggregate(
    db: &mut SotDatabase,
    record: &mut AggregateRecord,
    aggregate: &Aggregate,
    ext_changed: bool,
) -> Result<(), AdapterError> {
    check_network_status(&aggregate.status)?;

    record.status = aggregate.status.clone();
    record.description = aggregate.description.clone();
    if record.rir.is_none() {
        record.rir = Some(db.get_or_create_rir(DEFAULT_RIR));
    }
    if ext_changed {
        apply_ext_attrs(db, EntityKind::Aggregate, &mut record.meta, &aggregate.ext_attrs);
    }
    Ok(())
}

#[async_trait]
impl EntityOps for AggregateOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let aggregate = match &entity {
            Entity::Aggregate(a) => a,
            _ => return Err(wrong_type(id)),
        };

        let mut db = self.db.lock().await;
        if db.find_aggregate(&aggregate.network).is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let mut record = AggregateRecord {
            id: Uuid::new_v4(),
            prefix: aggregate.network,
            rir: None,
            status: String::new(),
            description: String::new(),
            meta: RecordMeta::default(),
        };
        write_aggregate(&mut db, &mut record, aggregate, true)?;
        db.aggregates.push(record);

        debug!(aggregate = %aggregate.network, "Created aggregate");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;

        let current = Entity::from(aggregate_from_record(&db, &db.aggregates[idx]));
        let updated = current.with_changes(changed)?;
        let aggregate = match &updated {
            Entity::Aggregate(a) => a,
            _ => return Err(wrong_type(id)),
        };

        let mut record = db.aggregates[idx].clone();
        write_aggregate(&mut db, &mut record, aggregate, ext_attrs_changed(changed))?;
        db.aggregates[idx] = record;

        debug!(aggregate = %aggregate.network, "Updated aggregate");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let mut db = self.db.lock().await;
        let idx = db.find(id).ok_or_else(|| not_found(id))?;
        let record = db.aggregates.remove(idx);

        debug!(aggregate = %record.prefix, "Deleted aggregate");
        Ok(())
    }
}
