#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use ddi_ssot::adapter::{
    AdapterError, DestinationAdapter, EntityOps, FieldHandle, SourceAdapter, SyncMarkers,
    SyncMetadata, TagHandle,
};
use ddi_ssot::model::{
    Aggregate, Attrs, Entity, EntityId, EntityKind, ExtAttrs, IpAddress, NetworkPrefix, Vlan,
    VlanGroup,
};
use ddi_ssot::store::EntityStore;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

pub fn prefix(network: &str) -> Entity {
    Entity::from(NetworkPrefix::new(network.parse().expect("valid CIDR")))
}

pub fn prefix_with_description(network: &str, description: &str) -> Entity {
    let mut prefix = NetworkPrefix::new(network.parse().expect("valid CIDR"));
    prefix.description = description.to_string();
    Entity::from(prefix)
}

pub fn container(network: &str) -> Entity {
    let mut prefix = NetworkPrefix::new(network.parse().expect("valid CIDR"));
    prefix.status = "container".to_string();
    Entity::from(prefix)
}

pub fn ip(address: &str, prefix: &str) -> Entity {
    Entity::from(IpAddress {
        address: address.parse().expect("valid address"),
        prefix: prefix.parse().expect("valid CIDR"),
        status: "USED".to_string(),
        description: String::new(),
        dns_name: format!("host-{}.example.com", address.replace('.', "-")),
        ext_attrs: ExtAttrs::new(),
    })
}

pub fn vlan_group(name: &str) -> Entity {
    Entity::from(VlanGroup {
        name: name.to_string(),
        description: String::new(),
        ext_attrs: ExtAttrs::new(),
    })
}

pub fn vlan(vid: u16, group: Option<&str>, status: &str) -> Entity {
    Entity::from(Vlan {
        vid,
        vlangroup: group.map(str::to_string),
        name: format!("vlan{}", vid),
        description: String::new(),
        status: status.to_string(),
        ext_attrs: ExtAttrs::new(),
    })
}

pub fn aggregate(network: &str) -> Entity {
    Entity::from(Aggregate::new(network.parse().expect("valid CIDR")))
}

pub fn store(entities: Vec<Entity>) -> EntityStore {
    EntityStore::from_entities(entities).expect("no duplicates in fixture")
}

pub fn prefix_id(network: &str) -> EntityId {
    EntityId::Prefix {
        network: network.parse().expect("valid CIDR"),
    }
}

pub fn markers() -> SyncMarkers {
    SyncMarkers {
        tag_slug: "ssot-synced-from-infoblox".to_string(),
        tag_name: "SSoT Synced from Infoblox".to_string(),
        field_key: "ssot-synced-to-nautobot".to_string(),
        field_label: "Last synced from Infoblox on".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Everything the destination holds
    pub records: EntityStore,
    /// Held but not reported by `load`
    pub hidden: BTreeSet<EntityId>,
    /// Mutations of these identifiers fail
    pub failing: BTreeSet<EntityId>,
    /// Creates of these identifiers fail once they have been deleted
    pub failing_recreate: BTreeSet<EntityId>,
    /// ("create" | "update" | "delete", id) in call order
    pub calls: Vec<(String, EntityId)>,
    pub marked: Vec<EntityId>,
    /// `load` calls served so far
    pub loads: usize,
    /// Every `load` after this many fails
    pub load_limit: Option<usize>,
}

#[derive(Clone)]
pub struct MockOps {
    state: Arc<Mutex<MockState>>,
}

impl MockOps {
    fn check(&self, action: &str, id: &EntityId) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((action.to_string(), id.clone()));
        if state.failing.contains(id) {
            return Err(AdapterError::Client(format!("injected failure for {}", id)));
        }
        let deleted_before = state
            .calls
            .iter()
            .any(|(done, called)| done == "delete" && called == id);
        if action == "create" && deleted_before && state.failing_recreate.contains(id) {
            return Err(AdapterError::Client(format!("injected re-create failure for {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityOps for MockOps {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError> {
        self.check("create", id)?;
        let entity = Entity::from_parts(id, attrs)?;
        let mut state = self.state.lock().unwrap();
        if state.records.contains(id) {
            return Err(AdapterError::Duplicate {
                kind: id.kind(),
                id: id.clone(),
            });
        }
        state.records.add(entity.clone())?;
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError> {
        self.check("update", id)?;
        let mut state = self.state.lock().unwrap();
        let current = state
            .records
            .get(id)
            .map_err(|e| AdapterError::NotFound(e.to_string()))?
            .clone();
        let updated = current.with_changes(changed)?;
        state.records.remove(id)?;
        state.records.add(updated.clone())?;
        Ok(updated)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError> {
        self.check("delete", id)?;
        let mut state = self.state.lock().unwrap();
        state.hidden.remove(id);
        state
            .records
            .remove(id)
            .map(|_| ())
            .map_err(|e| AdapterError::NotFound(e.to_string()))
    }
}

/// In-memory destination with failure injection
pub struct MockDestination {
    pub state: Arc<Mutex<MockState>>,
    ops: MockOps,
    unsupported: BTreeSet<EntityKind>,
}

impl MockDestination {
    pub fn new(records: EntityStore) -> Self {
        let state = Arc::new(Mutex::new(MockState {
            records,
            ..MockState::default()
        }));
        Self {
            ops: MockOps {
                state: state.clone(),
            },
            state,
            unsupported: BTreeSet::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(EntityStore::new())
    }

    pub fn fail_on(self, id: EntityId) -> Self {
        self.state.lock().unwrap().failing.insert(id);
        self
    }

    /// Hold `entity` without reporting it in snapshots
    pub fn hide(self, entity: Entity) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.hidden.insert(entity.id());
            state.records.add(entity).unwrap();
        }
        self
    }

    pub fn fail_recreate(self, id: EntityId) -> Self {
        self.state.lock().unwrap().failing_recreate.insert(id);
        self
    }

    /// Serve the first snapshot, then fail every reload
    pub fn fail_reloads(self) -> Self {
        self.state.lock().unwrap().load_limit = Some(1);
        self
    }

    pub fn without(mut self, kind: EntityKind) -> Self {
        self.unsupported.insert(kind);
        self
    }

    pub fn calls(&self) -> Vec<(String, EntityId)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn records(&self) -> EntityStore {
        self.state.lock().unwrap().records.clone()
    }

    pub fn marked(&self) -> Vec<EntityId> {
        self.state.lock().unwrap().marked.clone()
    }
}

#[async_trait]
impl SourceAdapter for MockDestination {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self) -> Result<EntityStore, AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.loads += 1;
        if matches!(state.load_limit, Some(limit) if state.loads > limit) {
            return Err(AdapterError::Client("reload timed out".to_string()));
        }
        let mut snapshot = state.records.clone();
        for id in &state.hidden {
            snapshot.remove(id)?;
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl DestinationAdapter for MockDestination {
    fn ops(&self, kind: EntityKind) -> Option<&dyn EntityOps> {
        if self.unsupported.contains(&kind) {
            None
        } else {
            Some(&self.ops as &dyn EntityOps)
        }
    }

    async fn ensure_sync_metadata(
        &self,
        markers: &SyncMarkers,
    ) -> Result<SyncMetadata, AdapterError> {
        Ok(SyncMetadata {
            tag: TagHandle {
                slug: markers.tag_slug.clone(),
                name: markers.tag_name.clone(),
            },
            last_synced: FieldHandle {
                key: markers.field_key.clone(),
                label: markers.field_label.clone(),
            },
        })
    }

    async fn mark_synced(
        &self,
        id: &EntityId,
        _metadata: &SyncMetadata,
        _synced_on: NaiveDate,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        if !state.records.contains(id) {
            return Err(AdapterError::NotFound(id.to_string()));
        }
        state.marked.push(id.clone());
        Ok(())
    }
}
