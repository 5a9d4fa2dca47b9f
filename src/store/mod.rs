use crate::model::{Entity, EntityId, EntityKind, NetworkPrefix};
use std::collections::BTreeMap;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate {kind} entity: {id}")]
    DuplicateEntity { kind: EntityKind, id: EntityId },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },
}

/// One side's snapshot: entities keyed by type, then by identifier.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: BTreeMap<EntityKind, BTreeMap<EntityId, Entity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, failing on the first duplicate identifier.
    pub fn from_entities<I>(entities: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut store = Self::new();
        for entity in entities {
            store.add(entity)?;
        }
        Ok(store)
    }

    /// Insert an entity. A second entity with the same identifier is
    /// rejected, never merged.
    pub fn add(&mut self, entity: Entity) -> Result<(), StoreError> {
        let kind = entity.kind();
        let id = entity.id();
        let by_id = self.entities.entry(kind).or_default();
        if by_id.contains_key(&id) {
            return Err(StoreError::DuplicateEntity { kind, id });
        }
        by_id.insert(id, entity);
        Ok(())
    }

    pub fn get(&self, id: &EntityId) -> Result<&Entity, StoreError> {
        self.entities
            .get(&id.kind())
            .and_then(|by_id| by_id.get(id))
            .ok_or_else(|| StoreError::NotFound {
                kind: id.kind(),
                id: id.clone(),
            })
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.get(id).is_ok()
    }

    pub fn remove(&mut self, id: &EntityId) -> Result<Entity, StoreError> {
        self.entities
            .get_mut(&id.kind())
            .and_then(|by_id| by_id.remove(id))
            .ok_or_else(|| StoreError::NotFound {
                kind: id.kind(),
                id: id.clone(),
            })
    }

    /// All entities of one type, in identifier order.
    pub fn all(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.get(&kind).into_iter().flat_map(|m| m.values())
    }

    pub fn ids(&self, kind: EntityKind) -> impl Iterator<Item = &EntityId> {
        self.entities.get(&kind).into_iter().flat_map(|m| m.keys())
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).map(|m| m.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most specific non-container prefix containing `addr`.
    pub fn resolve_parent_prefix(&self, addr: IpAddr) -> Option<&NetworkPrefix> {
        self.all(EntityKind::Prefix)
            .filter_map(Entity::as_prefix)
            .filter(|p| !p.is_container() && p.network.contains(addr))
            .max_by_key(|p| p.network.prefix_len())
    }

    /// Per-type entity counts, for logging.
    pub fn summary(&self) -> String {
        EntityKind::ORDER
            .iter()
            .map(|kind| format!("{}={}", kind, self.count(*kind)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
