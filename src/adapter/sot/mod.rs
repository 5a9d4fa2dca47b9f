//! In-process network source of truth.
//!
//! Records are kept in a JSON database file. Statuses are stored in this
//! side's own vocabulary and translated to and from the DDI vocabulary at the
//! adapter boundary, so snapshots from both sides compare directly.

mod database;
mod ops;

pub use database::{
    AggregateRecord, CustomFieldRecord, CustomFieldType, IpAddressRecord, NamedRecord,
    PrefixRecord, RecordMeta, SotDatabase, TagRecord, VlanGroupRecord, VlanRecord, DEFAULT_RIR,
    NETWORK_STATUSES,
};
pub use ops::{AggregateOps, IpAddressOps, PrefixOps, VlanGroupOps, VlanOps};

use super::{
    AdapterError, DestinationAdapter, EntityOps, FieldHandle, SourceAdapter, SyncMarkers,
    SyncMetadata, TagHandle,
};
use crate::model::{
    Aggregate, Cidr, Entity, EntityId, EntityKind, IpAddress, NetworkPrefix, Vlan, VlanGroup,
    VlanRef,
};
use crate::normalize::ReferenceLookupFailed;
use crate::store::EntityStore;
use crate::utils::SYNC_TAG_COLOR;
use crate::vocab::{ip_address_status, vlan_status, Direction, VocabError};
use async_trait::async_trait;
use chrono::NaiveDate;
use ops::SharedDb;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SYNC_TAG_DESCRIPTION: &str = "Tag for objects synced from the DDI appliance";

/// Statuses this side cannot translate are passed through untouched so a
/// single bad record does not sink the whole snapshot.
fn status_to_ddi(translated: Result<&'static str, VocabError>, raw: &str) -> String {
    match translated {
        Ok(status) => status.to_string(),
        Err(e) => {
            warn!(error = %e, "Passing untranslated status through");
            raw.to_string()
        }
    }
}

pub(crate) fn vlan_group_from_record(db: &SotDatabase, record: &VlanGroupRecord) -> VlanGroup {
    VlanGroup {
        name: record.name.clone(),
        description: record.description.clone(),
        ext_attrs: db.ext_attrs(&record.meta),
    }
}

pub(crate) fn vlan_from_record(db: &SotDatabase, record: &VlanRecord) -> Vlan {
    Vlan {
        vid: record.vid,
        vlangroup: db.vlan_group_name(record.group),
        name: record.name.clone(),
        description: record.description.clone(),
        status: status_to_ddi(vlan_status(&record.status, Direction::ToDdi), &record.status),
        ext_attrs: db.ext_attrs(&record.meta),
    }
}

pub(crate) fn aggregate_from_record(db: &SotDatabase, record: &AggregateRecord) -> Aggregate {
    Aggregate {
        network: record.prefix,
        description: record.description.clone(),
        status: record.status.clone(),
        ext_attrs: db.ext_attrs(&record.meta),
    }
}

pub(crate) fn prefix_from_record(db: &SotDatabase, record: &PrefixRecord) -> NetworkPrefix {
    let vlans: BTreeMap<u16, VlanRef> = record
        .vlans
        .iter()
        .filter_map(|id| db.vlans.iter().find(|v| v.id == *id))
        .map(|v| {
            (
                v.vid,
                VlanRef {
                    vid: v.vid,
                    name: v.name.clone(),
                    group: db.vlan_group_name(v.group),
                },
            )
        })
        .collect();

    NetworkPrefix {
        network: record.prefix,
        description: record.description.clone(),
        status: record.status.clone(),
        ext_attrs: db.ext_attrs(&record.meta),
        vlans,
    }
}

pub(crate) fn ip_from_record(
    db: &SotDatabase,
    record: &IpAddressRecord,
    prefix: Cidr,
) -> IpAddress {
    IpAddress {
        address: record.address,
        prefix,
        status: status_to_ddi(ip_address_status(&record.status, Direction::ToDdi), &record.status),
        description: record.description.clone(),
        dns_name: record.dns_name.clone(),
        ext_attrs: db.ext_attrs(&record.meta),
    }
}

/// Source-of-truth adapter over a shared [`SotDatabase`]
pub struct SotAdapter {
    name: String,
    db: SharedDb,
    prefixes: PrefixOps,
    ip_addresses: IpAddressOps,
    vlan_groups: VlanGroupOps,
    vlans: VlanOps,
    aggregates: AggregateOps,
}

impl SotAdapter {
    pub fn new(db: SotDatabase) -> Self {
        let db = Arc::new(Mutex::new(db));
        Self {
            name: "sot".to_string(),
            prefixes: PrefixOps::new(db.clone()),
            ip_addresses: IpAddressOps::new(db.clone()),
            vlan_groups: VlanGroupOps::new(db.clone()),
            vlans: VlanOps::new(db.clone()),
            aggregates: AggregateOps::new(db.clone()),
            db,
        }
    }

    /// Open a database file; a missing file starts empty.
    pub async fn open(path: &Path) -> Result<Self, AdapterError> {
        let db = SotDatabase::read(path).await?;
        Ok(Self::new(db))
    }

    pub async fn save(&self, path: &Path) -> Result<(), AdapterError> {
        let db = self.db.lock().await;
        db.write(path).await
    }

    /// A copy of the current database contents
    pub async fn database(&self) -> SotDatabase {
        self.db.lock().await.clone()
    }
}

#[async_trait]
impl SourceAdapter for SotAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<EntityStore, AdapterError> {
        let db = self.db.lock().await;
        let mut store = EntityStore::new();

        for record in &db.vlan_groups {
            store.add(Entity::from(vlan_group_from_record(&db, record)))?;
        }
        for record in &db.vlans {
            store.add(Entity::from(vlan_from_record(&db, record)))?;
        }
        for record in &db.aggregates {
            store.add(Entity::from(aggregate_from_record(&db, record)))?;
        }
        for record in &db.prefixes {
            store.add(Entity::from(prefix_from_record(&db, record)))?;
        }

        for record in &db.ip_addresses {
            if record.dns_name.trim().is_empty() {
                debug!(address = %record.address, "Skipping IP address without a DNS name");
                continue;
            }

            let parent = match store.resolve_parent_prefix(record.address) {
                Some(prefix) => prefix.network,
                None => {
                    warn!(address = %record.address, "No parent prefix for IP address; skipping");
                    continue;
                }
            };
            if parent.prefix_len() != record.prefix_length {
                warn!(
                    address = %record.address,
                    prefix_length = record.prefix_length,
                    parent = %parent,
                    "IP address length does not match its parent prefix; skipping"
                );
                continue;
            }

            store.add(Entity::from(ip_from_record(&db, record, parent)))?;
        }

        info!(adapter = %self.name, entities = %store.summary(), "Loaded snapshot");
        Ok(store)
    }
}

#[async_trait]
impl DestinationAdapter for SotAdapter {
    fn ops(&self, kind: EntityKind) -> Option<&dyn EntityOps> {
        let ops: &dyn EntityOps = match kind {
            EntityKind::VlanGroup => &self.vlan_groups,
            EntityKind::Vlan => &self.vlans,
            EntityKind::Aggregate => &self.aggregates,
            EntityKind::Prefix => &self.prefixes,
            EntityKind::IpAddress => &self.ip_addresses,
        };
        Some(ops)
    }

    async fn ensure_sync_metadata(
        &self,
        markers: &SyncMarkers,
    ) -> Result<SyncMetadata, AdapterError> {
        let mut db = self.db.lock().await;

        let tag = db.ensure_tag(
            &markers.tag_slug,
            &markers.tag_name,
            SYNC_TAG_DESCRIPTION,
            SYNC_TAG_COLOR,
        );
        let tag = TagHandle {
            slug: tag.slug.clone(),
            name: tag.name.clone(),
        };

        for kind in EntityKind::ORDER {
            db.ensure_custom_field(
                &markers.field_key,
                &markers.field_label,
                CustomFieldType::Date,
                kind,
            );
        }

        Ok(SyncMetadata {
            tag,
            last_synced: FieldHandle {
                key: markers.field_key.clone(),
                label: markers.field_label.clone(),
            },
        })
    }

    async fn mark_synced(
        &self,
        id: &EntityId,
        metadata: &SyncMetadata,
        synced_on: NaiveDate,
    ) -> Result<(), AdapterError> {
        let mut db = self.db.lock().await;
        let meta = db
            .meta_mut(id)
            .ok_or_else(|| AdapterError::NotFound(format!("{} {}", id.kind(), id)))?;

        meta.tags.insert(metadata.tag.slug.clone());
        meta.custom_fields.insert(
            metadata.last_synced.key.clone(),
            synced_on.format("%Y-%m-%d").to_string(),
        );
        Ok(())
    }

    async fn take_unresolved(&self) -> Vec<ReferenceLookupFailed> {
        std::mem::take(&mut self.db.lock().await.unresolved)
    }
}
