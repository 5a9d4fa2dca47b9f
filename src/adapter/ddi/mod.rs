//! DDI appliance side.
//!
//! Snapshots are built from the appliance's networks, network containers,
//! addresses, VLAN views and VLANs. As a destination the appliance only takes
//! networks (prefixes) and network containers (aggregates).

mod client;
mod memory;

pub use client::{
    expand_ext_attrs, flatten_ext_attrs, vlan_reference, vlan_view_name, DdiClient, ExtAttrValue,
    RawExtAttrs, RawIpAddress, RawNetwork, RawNetworkContainer, RawVlan, RawVlanAssignment,
    RawVlanView,
};
pub use memory::{DdiDump, MemoryDdiClient};

use super::{
    AdapterError, DestinationAdapter, EntityOps, FieldHandle, SourceAdapter, SyncMarkers,
    SyncMetadata, TagHandle,
};
use crate::model::{
    Aggregate, Attrs, Cidr, Entity, EntityId, EntityKind, IpAddress, NetworkPrefix, Vlan,
    VlanGroup, VlanRef, DEFAULT_NETWORK_STATUS,
};
use crate::store::EntityStore;
use crate::utils::slugify;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extensibility attribute keys the adapter writes for its own bookkeeping
fn bookkeeping_keys(markers: &SyncMarkers) -> BTreeSet<String> {
    [slugify(&markers.tag_slug), slugify(&markers.field_key)]
        .into_iter()
        .collect()
}

fn network_to_prefix(
    raw: &RawNetwork,
    skip: &BTreeSet<String>,
) -> Result<NetworkPrefix, AdapterError> {
    let network: Cidr = raw.network.parse()?;
    let mut prefix = NetworkPrefix::new(network);
    prefix.description = raw.comment.clone();
    prefix.status = raw
        .status
        .clone()
        .unwrap_or_else(|| DEFAULT_NETWORK_STATUS.to_string());
    prefix.ext_attrs = flatten_ext_attrs(&raw.extattrs, skip);
    prefix.vlans = raw
        .vlans
        .iter()
        .map(|assignment| {
            (
                assignment.id,
                VlanRef {
                    vid: assignment.id,
                    name: assignment.name.clone(),
                    group: vlan_view_name(&assignment.vlan),
                },
            )
        })
        .collect();
    Ok(prefix)
}

fn container_to_aggregate(
    raw: &RawNetworkContainer,
    skip: &BTreeSet<String>,
) -> Result<Aggregate, AdapterError> {
    let network: Cidr = raw.network.parse()?;
    let mut aggregate = Aggregate::new(network);
    aggregate.description = raw.comment.clone();
    aggregate.status = raw
        .status
        .clone()
        .unwrap_or_else(|| DEFAULT_NETWORK_STATUS.to_string());
    aggregate.ext_attrs = flatten_ext_attrs(&raw.extattrs, skip);
    Ok(aggregate)
}

fn optional_status(status: &str) -> Option<String> {
    if status == DEFAULT_NETWORK_STATUS {
        None
    } else {
        Some(status.to_string())
    }
}

/// Keep the appliance's bookkeeping attributes when replacing ext attrs.
fn merge_ext_attrs(
    current: &RawExtAttrs,
    desired: RawExtAttrs,
    skip: &BTreeSet<String>,
) -> RawExtAttrs {
    let mut merged: RawExtAttrs = current
        .iter()
        .filter(|(key, _)| skip.contains(&slugify(key)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(desired);
    merged
}

fn not_found(id: &EntityId) -> AdapterError {
    AdapterError::NotFound(format!("{} {}", id.kind(), id))
}

fn wrong_type(id: &EntityId) -> AdapterError {
    AdapterError::Invalid(format!("attributes for {} {} built another entity type", id.kind(), id))
}

/// Networks, as prefixes
pub struct NetworkOps {
    client: Arc<dyn DdiClient>,
    skip: BTreeSet<String>,
}

impl NetworkOps {
    async fn find(&self, network: &Cidr) -> Result<Option<RawNetwork>, AdapterError> {
        let wanted = network.to_string();
        let networks = self.client.get_networks().await?;
        Ok(networks.into_iter().find(|n| {
            n.network == wanted || n.network.parse::<Cidr>().map(|c| c == *network).unwrap_or(false)
        }))
    }

    fn to_raw(
        prefix: &NetworkPrefix,
        current: Option<&RawNetwork>,
        skip: &BTreeSet<String>,
    ) -> Result<RawNetwork, AdapterError> {
        if prefix.is_container() {
            return Err(AdapterError::Invalid(format!(
                "{} is a container; containers are network containers on the appliance",
                prefix.network
            )));
        }

        let extattrs = expand_ext_attrs(&prefix.ext_attrs);
        Ok(RawNetwork {
            reference: current.map(|c| c.reference.clone()).unwrap_or_default(),
            network: current
                .map(|c| c.network.clone())
                .unwrap_or_else(|| prefix.network.to_string()),
            comment: prefix.description.clone(),
            status: optional_status(&prefix.status),
            extattrs: match current {
                Some(current) => merge_ext_attrs(&current.extattrs, extattrs, skip),
                None => extattrs,
            },
            vlans: prefix
                .vlans
                .values()
                .map(|vlan| RawVlanAssignment {
                    vlan: vlan_reference(vlan.group.as_deref(), &vlan.name, vlan.vid),
                    id: vlan.vid,
                    name: vlan.name.clone(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl EntityOps for NetworkOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let prefix = entity.as_prefix().ok_or_else(|| wrong_type(id))?;

        if self.find(&prefix.network).await?.is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let raw = Self::to_raw(prefix, None, &self.skip)?;
        self.client.create_network(raw).await?;
        debug!(network = %prefix.network, "Created network");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let network = match id {
            EntityId::Prefix { network } => network,
            _ => return Err(wrong_type(id)),
        };
        let current = self.find(network).await?.ok_or_else(|| not_found(id))?;

        let updated = Entity::from(network_to_prefix(&current, &self.skip)?).with_changes(changed)?;
        let prefix = updated.as_prefix().ok_or_else(|| wrong_type(id))?;
        let raw = Self::to_raw(prefix, Some(&current), &self.skip)?;
        self.client.update_network(raw).await?;

        debug!(network = %network, "Updated network");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let network = match id {
            EntityId::Prefix { network } => network,
            _ => return Err(wrong_type(id)),
        };
        let current = self.find(network).await?.ok_or_else(|| not_found(id))?;
        self.client.delete_network(&current.network).await?;

        debug!(network = %network, "Deleted network");
        Ok(())
    }
}

/// Network containers, as aggregates
pub struct ContainerOps {
    client: Arc<dyn DdiClient>,
    skip: BTreeSet<String>,
}

impl ContainerOps {
    async fn find(&self, network: &Cidr) -> Result<Option<RawNetworkContainer>, AdapterError> {
        let wanted = network.to_string();
        let containers = self.client.get_network_containers().await?;
        Ok(containers.into_iter().find(|c| {
            c.network == wanted || c.network.parse::<Cidr>().map(|n| n == *network).unwrap_or(false)
        }))
    }

    fn to_raw(
        aggregate: &Aggregate,
        current: Option<&RawNetworkContainer>,
        skip: &BTreeSet<String>,
    ) -> RawNetworkContainer {
        let extattrs = expand_ext_attrs(&aggregate.ext_attrs);
        RawNetworkContainer {
            reference: current.map(|c| c.reference.clone()).unwrap_or_default(),
            network: current
                .map(|c| c.network.clone())
                .unwrap_or_else(|| aggregate.network.to_string()),
            comment: aggregate.description.clone(),
            status: optional_status(&aggregate.status),
            extattrs: match current {
                Some(current) => merge_ext_attrs(&current.extattrs, extattrs, skip),
                None => extattrs,
            },
        }
    }
}

#[async_trait]
impl EntityOps for ContainerOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        let entity = Entity::from_parts(id, attrs)?;
        let aggregate = match &entity {
            Entity::Aggregate(a) => a,
            _ => return Err(wrong_type(id)),
        };

        if self.find(&aggregate.network).await?.is_some() {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }

        let raw = Self::to_raw(aggregate, None, &self.skip);
        self.client.create_network_container(raw).await?;
        debug!(network = %aggregate.network, "Created network container");
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        let network = match id {
            EntityId::Aggregate { network } => network,
            _ => return Err(wrong_type(id)),
        };
        let current = self.find(network).await?.ok_or_else(|| not_found(id))?;

        let updated =
            Entity::from(container_to_aggregate(&current, &self.skip)?).with_changes(changed)?;
        let aggregate = match &updated {
            Entity::Aggregate(a) => a,
            _ => return Err(wrong_type(id)),
        };
        let raw = Self::to_raw(aggregate, Some(&current), &self.skip);
        self.client.update_network_container(raw).await?;

        debug!(network = %network, "Updated network container");
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        let network = match id {
            EntityId::Aggregate { network } => network,
            _ => return Err(wrong_type(id)),
        };
        let current = self.find(network).await?.ok_or_else(|| not_found(id))?;
        self.client.delete_network_container(&current.network).await?;

        debug!(network = %network, "Deleted network container");
        Ok(())
    }
}

pub struct DdiAdapter {
    name: String,
    client: Arc<dyn DdiClient>,
    skip: BTreeSet<String>,
    networks: NetworkOps,
    containers: ContainerOps,
}

impl DdiAdapter {
    /// `markers` name the attributes written by [`DestinationAdapter::mark_synced`];
    /// they are left out of loaded extensibility attributes.
    pub fn new(client: Arc<dyn DdiClient>, markers: &SyncMarkers) -> Self {
        let skip = bookkeeping_keys(markers);
        Self {
            name: "ddi".to_string(),
            networks: NetworkOps {
                client: client.clone(),
                skip: skip.clone(),
            },
            containers: ContainerOps {
                client: client.clone(),
                skip: skip.clone(),
            },
            client,
            skip,
        }
    }

    fn ip_from_raw(&self, raw: &RawIpAddress, store: &EntityStore) -> Option<IpAddress> {
        let dns_name = raw.names.first().cloned().unwrap_or_default();
        if dns_name.trim().is_empty() {
            debug!(address = %raw.ip_address, "Skipping IP address without a DNS name");
            return None;
        }

        let address: IpAddr = match raw.ip_address.parse() {
            Ok(address) => address,
            Err(e) => {
                warn!(address = %raw.ip_address, error = %e, "Skipping unparseable IP address");
                return None;
            }
        };
        let prefix = match store.resolve_parent_prefix(address) {
            Some(prefix) => prefix.network,
            None => {
                warn!(
                    address = %address,
                    network = %raw.network,
                    "No parent prefix for IP address; skipping"
                );
                return None;
            }
        };

        Some(IpAddress {
            address,
            prefix,
            status: raw.status.clone(),
            description: raw.comment.clone(),
            dns_name,
            ext_attrs: flatten_ext_attrs(&raw.extattrs, &self.skip),
        })
    }
}

#[async_trait]
impl SourceAdapter for DdiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<EntityStore, AdapterError> {
        let (networks, containers, views, vlans) = tokio::try_join!(
            self.client.get_networks(),
            self.client.get_network_containers(),
            self.client.get_vlan_views(),
            self.client.get_vlans(),
        )?;

        let mut store = EntityStore::new();

        for view in &views {
            store.add(Entity::from(VlanGroup {
                name: view.name.clone(),
                description: view.comment.clone(),
                ext_attrs: flatten_ext_attrs(&view.extattrs, &self.skip),
            }))?;
        }

        for vlan in &vlans {
            store.add(Entity::from(Vlan {
                vid: vlan.id,
                vlangroup: vlan_view_name(&vlan.reference),
                name: vlan.name.clone(),
                description: vlan.comment.clone(),
                status: vlan.status.clone(),
                ext_attrs: flatten_ext_attrs(&vlan.extattrs, &self.skip),
            }))?;
        }

        for container in &containers {
            store.add(Entity::from(container_to_aggregate(container, &self.skip)?))?;
        }

        for network in &networks {
            store.add(Entity::from(network_to_prefix(network, &self.skip)?))?;
        }

        for network in &networks {
            for raw in self.client.get_ipv4_addresses(&network.network).await? {
                if let Some(ip) = self.ip_from_raw(&raw, &store) {
                    store.add(Entity::from(ip))?;
                }
            }
        }

        info!(adapter = %self.name, entities = %store.summary(), "Loaded snapshot");
        Ok(store)
    }
}

#[async_trait]
impl DestinationAdapter for DdiAdapter {
    fn ops(&self, kind: EntityKind) -> Option<&dyn EntityOps> {
        match kind {
            EntityKind::Prefix => Some(&self.networks as &dyn EntityOps),
            EntityKind::Aggregate => Some(&self.containers as &dyn EntityOps),
            _ => None,
        }
    }

    /// The appliance has no tag or custom field objects; markers become
    /// extensibility attributes, which need no setup.
    async fn ensure_sync_metadata(
        &self,
        markers: &SyncMarkers,
    ) -> Result<SyncMetadata, AdapterError> {
        Ok(SyncMetadata {
            tag: TagHandle {
                slug: slugify(&markers.tag_slug),
                name: markers.tag_name.clone(),
            },
            last_synced: FieldHandle {
                key: slugify(&markers.field_key),
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
        let date = Value::String(synced_on.format("%Y-%m-%d").to_string());
        let tag = Value::String(metadata.tag.name.clone());

        match id {
            EntityId::Prefix { network } => {
                let mut raw = self.networks.find(network).await?.ok_or_else(|| not_found(id))?;
                raw.extattrs.insert(metadata.tag.slug.clone(), ExtAttrValue { value: tag });
                raw.extattrs
                    .insert(metadata.last_synced.key.clone(), ExtAttrValue { value: date });
                self.client.update_network(raw).await?;
            }
            EntityId::Aggregate { network } => {
                let mut raw = self.containers.find(network).await?.ok_or_else(|| not_found(id))?;
                raw.extattrs.insert(metadata.tag.slug.clone(), ExtAttrValue { value: tag });
                raw.extattrs
                    .insert(metadata.last_synced.key.clone(), ExtAttrValue { value: date });
                self.client.update_network_container(raw).await?;
            }
            _ => {
                return Err(AdapterError::Unsupported {
                    adapter: self.name.clone(),
                    kind: id.kind(),
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{LAST_SYNCED_FIELD, LAST_SYNCED_LABEL, SYNC_TAG_NAME, SYNC_TAG_SLUG};
    use serde_json::json;

    fn markers() -> SyncMarkers {
        SyncMarkers {
            tag_slug: SYNC_TAG_SLUG.to_string(),
            tag_name: SYNC_TAG_NAME.to_string(),
            field_key: LAST_SYNCED_FIELD.to_string(),
            field_label: LAST_SYNCED_LABEL.to_string(),
        }
    }

    fn dump() -> DdiDump {
        serde_json::from_value(json!({
            "networks": [
                {
                    "_ref": "network/abc:10.0.0.0/24/default",
                    "network": "10.0.0.0/24",
                    "comment": "lab",
                    "extattrs": {"Site": {"value": "HQ"}},
                    "vlans": [{"vlan": "vlan/xyz:Campus/users/10", "id": 10, "name": "users"}]
                }
            ],
            "networkContainers": [{"network": "10.0.0.0/8", "comment": "private"}],
            "ipAddresses": [
                {"ip_address": "10.0.0.5", "network": "10.0.0.0/24",
                 "names": ["host.example.com"], "status": "USED"},
                {"ip_address": "10.0.0.6", "network": "10.0.0.0/24",
                 "names": [], "status": "UNUSED"}
            ],
            "vlanViews": [{"name": "Campus", "start_vlan": 1, "end_vlan": 4094}],
            "vlans": [
                {"_ref": "vlan/xyz:Campus/users/10", "id": 10, "name": "users",
                 "status": "ASSIGNED"}
            ]
        }))
        .unwrap()
    }

    fn adapter() -> (Arc<MemoryDdiClient>, DdiAdapter) {
        let client = Arc::new(MemoryDdiClient::new(dump()));
        let adapter = DdiAdapter::new(client.clone(), &markers());
        (client, adapter)
    }

    #[tokio::test]
    async fn test_load_builds_every_type() {
        let (_, adapter) = adapter();
        let store = adapter.load().await.unwrap();

        assert_eq!(store.count(EntityKind::VlanGroup), 1);
        assert_eq!(store.count(EntityKind::Vlan), 1);
        assert_eq!(store.count(EntityKind::Aggregate), 1);
        assert_eq!(store.count(EntityKind::Prefix), 1);
        // The address without a DNS name is excluded.
        assert_eq!(store.count(EntityKind::IpAddress), 1);

        let prefix = store
            .get(&EntityId::Prefix {
                network: "10.0.0.0/24".parse().unwrap(),
            })
            .unwrap()
            .as_prefix()
            .unwrap()
            .clone();
        assert_eq!(prefix.description, "lab");
        assert_eq!(prefix.status, DEFAULT_NETWORK_STATUS);
        assert_eq!(prefix.ext_attrs.get("site"), Some(&"HQ".to_string()));
        assert_eq!(prefix.vlans[&10].group.as_deref(), Some("Campus"));

        let vlan = store
            .get(&EntityId::Vlan {
                vid: 10,
                vlangroup: Some("Campus".to_string()),
            })
            .unwrap();
        assert_eq!(vlan.kind(), EntityKind::Vlan);
    }

    #[tokio::test]
    async fn test_only_networks_and_containers_are_writable() {
        let (_, adapter) = adapter();
        assert!(adapter.ops(EntityKind::Prefix).is_some());
        assert!(adapter.ops(EntityKind::Aggregate).is_some());
        assert!(adapter.ops(EntityKind::Vlan).is_none());
        assert!(adapter.ops(EntityKind::IpAddress).is_none());
    }

    #[tokio::test]
    async fn test_create_update_delete_network() {
        let (client, adapter) = adapter();
        let ops = adapter.ops(EntityKind::Prefix).unwrap();
        let id = EntityId::Prefix {
            network: "10.1.0.0/24".parse().unwrap(),
        };

        let mut attrs = Attrs::new();
        attrs.insert("description".to_string(), json!("new"));
        ops.create(&id, &attrs).await.unwrap();
        assert!(matches!(
            ops.create(&id, &attrs).await.unwrap_err(),
            AdapterError::Duplicate { .. }
        ));

        let mut changed = Attrs::new();
        changed.insert("description".to_string(), json!("changed"));
        ops.update(&id, &changed).await.unwrap();
        let networks = client.get_networks().await.unwrap();
        let raw = networks.iter().find(|n| n.network == "10.1.0.0/24").unwrap();
        assert_eq!(raw.comment, "changed");

        ops.delete(&id).await.unwrap();
        assert!(matches!(ops.delete(&id).await.unwrap_err(), AdapterError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_synced_is_hidden_from_snapshot() {
        let (client, adapter) = adapter();
        let metadata = adapter.ensure_sync_metadata(&markers()).await.unwrap();
        let id = EntityId::Prefix {
            network: "10.0.0.0/24".parse().unwrap(),
        };
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        adapter.mark_synced(&id, &metadata, date).await.unwrap();

        let raw = client.get_networks().await.unwrap().remove(0);
        assert_eq!(
            raw.extattrs.get(LAST_SYNCED_FIELD).map(|a| a.value.clone()),
            Some(json!("2024-03-09"))
        );

        let store = adapter.load().await.unwrap();
        let prefix = store.get(&id).unwrap().as_prefix().unwrap().clone();
        assert_eq!(prefix.ext_attrs.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_synced_on_vlan_is_unsupported() {
        let (_, adapter) = adapter();
        let metadata = adapter.ensure_sync_metadata(&markers()).await.unwrap();
        let id = EntityId::Vlan {
            vid: 10,
            vlangroup: Some("Campus".to_string()),
        };
        let err = adapter
            .mark_synced(&id, &metadata, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_bookkeeping_attributes() {
        let (client, adapter) = adapter();
        let metadata = adapter.ensure_sync_metadata(&markers()).await.unwrap();
        let id = EntityId::Prefix {
            network: "10.0.0.0/24".parse().unwrap(),
        };
        adapter
            .mark_synced(&id, &metadata, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
            .await
            .unwrap();

        let mut changed = Attrs::new();
        changed.insert("ext_attrs".to_string(), json!({"site": "DC1"}));
        adapter.ops(EntityKind::Prefix).unwrap().update(&id, &changed).await.unwrap();

        let raw = client.get_networks().await.unwrap().remove(0);
        assert!(raw.extattrs.contains_key(LAST_SYNCED_FIELD));
        assert_eq!(raw.extattrs.get("site").map(|a| a.value.clone()), Some(json!("DC1")));
        assert!(!raw.extattrs.contains_key("Site"));
    }
}
