use crate::adapter::{AdapterError, DestinationAdapter, SyncMetadata};
use crate::model::{EntityId, EntityKind};
use crate::store::EntityStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditFailure {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: EntityId,
    pub message: String,
}

/// Outcome of marking reconciled records on the destination
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub tagged: BTreeMap<EntityKind, usize>,
    /// Source records with no counterpart in the destination yet
    pub not_found: usize,
    /// Records of types the destination cannot mark
    pub unsupported: usize,
    pub failures: Vec<AuditFailure>,
}

impl AuditReport {
    pub fn tagged_total(&self) -> usize {
        self.tagged.values().sum()
    }
}

/// Tag every source record of `kinds` whose counterpart is present in
/// `updated_destination`, and stamp its "last synced" date.
///
/// Missing counterparts are skipped; marking failures are logged and
/// reported, never raised.
pub async fn audit_synced(
    source: &EntityStore,
    updated_destination: &EntityStore,
    destination: &dyn DestinationAdapter,
    metadata: &SyncMetadata,
    kinds: &[EntityKind],
    synced_on: NaiveDate,
) -> AuditReport {
    let mut report = AuditReport::default();

    for kind in EntityKind::ORDER.iter().copied().filter(|k| kinds.contains(k)) {
        for id in source.ids(kind) {
            if !updated_destination.contains(id) {
                debug!(kind = %kind, id = %id, "No counterpart in destination; not marking");
                report.not_found += 1;
                continue;
            }

            match destination.mark_synced(id, metadata, synced_on).await {
                Ok(()) => *report.tagged.entry(kind).or_default() += 1,
                Err(AdapterError::Unsupported { .. }) => report.unsupported += 1,
                Err(e) => {
                    warn!(kind = %kind, id = %id, error = %e, "Failed to mark record as synced");
                    report.failures.push(AuditFailure {
                        kind,
                        id: id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    info!(
        tagged = report.tagged_total(),
        not_found = report.not_found,
        failed = report.failures.len(),
        "Marked synced records"
    );
    report
}
