//! Adapter contract between the engine and the two inventory systems.
//!
//! Each side implements [`SourceAdapter`] to produce a complete snapshot. The
//! side being written to also implements [`DestinationAdapter`], which hands
//! out one [`EntityOps`] per entity type it can mutate.

pub mod ddi;
pub mod sot;

use crate::model::{Attrs, Entity, EntityId, EntityKind, ModelError};
use crate::normalize::ReferenceLookupFailed;
use crate::store::{EntityStore, StoreError};
use crate::vocab::VocabError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{kind} {id} already exists")]
    Duplicate { kind: EntityKind, id: EntityId },

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    UnknownStatus(#[from] VocabError),

    #[error("{adapter} does not support {kind}")]
    Unsupported { adapter: String, kind: EntityKind },

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Snapshot error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Client error: {0}")]
    Client(String),

    /// The existing record was deleted to make room, then the create failed
    #[error("Deleted the existing record but could not create it again: {0}")]
    ReplaceFailed(Box<AdapterError>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Per-type mutation interface, implemented independently by each adapter.
#[async_trait]
pub trait EntityOps: Send + Sync {
    async fn create(&self, id: &EntityId, attrs: &Attrs) -> Result<Entity, AdapterError>;

    /// Apply only the changed attributes to an existing record.
    async fn update(&self, id: &EntityId, changed: &Attrs) -> Result<Entity, AdapterError>;

    async fn delete(&self, id: &EntityId) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a complete snapshot, or fail the run.
    async fn load(&self) -> Result<EntityStore, AdapterError>;
}

#[async_trait]
pub trait DestinationAdapter: SourceAdapter {
    /// Mutation interface for `kind`, or `None` if this side cannot write it.
    fn ops(&self, kind: EntityKind) -> Option<&dyn EntityOps>;

    /// Get-or-create the synced tag and the "last synced" field. Idempotent;
    /// run once before reconciling.
    async fn ensure_sync_metadata(
        &self,
        markers: &SyncMarkers,
    ) -> Result<SyncMetadata, AdapterError>;

    /// Attach the synced tag and set the "last synced" date on a record.
    async fn mark_synced(
        &self,
        id: &EntityId,
        metadata: &SyncMetadata,
        synced_on: NaiveDate,
    ) -> Result<(), AdapterError>;

    /// Drain the reference lookups that failed while applying changes.
    async fn take_unresolved(&self) -> Vec<ReferenceLookupFailed> {
        Vec::new()
    }
}

/// Names of the audit markers requested by configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarkers {
    pub tag_slug: String,
    pub tag_name: String,
    pub field_key: String,
    pub field_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagHandle {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHandle {
    pub key: String,
    pub label: String,
}

/// Handles returned by [`DestinationAdapter::ensure_sync_metadata`] and
/// threaded through the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub tag: TagHandle,
    pub last_synced: FieldHandle,
}
