use crate::adapter::AdapterError;
use crate::model::{EntityId, EntityKind};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Classification of a recovered failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateEntity,
    NotFound,
    UnknownStatus,
    ReferenceLookupFailed,
    ApplyFailed,
}

impl ErrorKind {
    pub fn classify(err: &AdapterError) -> Self {
        match err {
            AdapterError::Duplicate { .. } => ErrorKind::DuplicateEntity,
            AdapterError::NotFound(_) => ErrorKind::NotFound,
            AdapterError::UnknownStatus(_) => ErrorKind::UnknownStatus,
            AdapterError::ReplaceFailed(inner) => Self::classify(inner),
            _ => ErrorKind::ApplyFailed,
        }
    }
}

fn serialize_display<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: fmt::Display,
{
    serializer.collect_str(value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl KindCounts {
    fn add(&mut self, other: &KindCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyFailure {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(rename = "identifier", serialize_with = "serialize_display")]
    pub id: EntityId,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    pub counts: BTreeMap<EntityKind, KindCounts>,
    pub failures: Vec<ApplyFailure>,
    /// Creates that collided with an existing record which was kept; the
    /// next run reconciles any drift with an update
    pub flagged_for_update: Vec<EntityId>,
    /// Types whose processing stopped at their first failure
    pub halted: Vec<EntityKind>,
    /// Attribute references that named nothing; the change itself applied
    pub unresolved_references: Vec<ApplyFailure>,
}

impl SyncResult {
    pub fn counts_for(&self, kind: EntityKind) -> KindCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub(crate) fn counts_mut(&mut self, kind: EntityKind) -> &mut KindCounts {
        self.counts.entry(kind).or_default()
    }

    pub fn totals(&self) -> KindCounts {
        let mut totals = KindCounts::default();
        for counts in self.counts.values() {
            totals.add(counts);
        }
        totals
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures_for(&self, kind: EntityKind) -> impl Iterator<Item = &ApplyFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    pub fn summary(&self) -> String {
        let totals = self.totals();
        format!(
            "created={} updated={} deleted={} skipped={} failed={}",
            totals.created,
            totals.updated,
            totals.deleted,
            totals.skipped,
            self.failures.len()
        )
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
