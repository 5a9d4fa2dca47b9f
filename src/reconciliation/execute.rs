use super::plan::{Change, Plan, PlanItem};
use super::result::{ApplyFailure, ErrorKind, SyncResult};
use crate::adapter::{AdapterError, DestinationAdapter, EntityOps};
use crate::config::{DuplicatePolicy, SyncConfig};
use crate::model::EntityKind;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Apply-time policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyPolicy {
    pub continue_on_failure: bool,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            continue_on_failure: true,
            duplicate_policy: DuplicatePolicy::KeepExisting,
        }
    }
}

impl From<&SyncConfig> for ApplyPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            continue_on_failure: config.continue_on_failure,
            duplicate_policy: config.duplicate_policy,
        }
    }
}

enum Applied {
    Created,
    Updated,
    Deleted,
    /// Nothing left to do (delete of a record already gone)
    Skipped,
    /// Create collided and the existing record was kept
    KeptExisting,
}

async fn apply_item(
    ops: &dyn EntityOps,
    item: &PlanItem,
    policy: &ApplyPolicy,
) -> Result<Applied, AdapterError> {
    let id = &item.id;
    match &item.change {
        Change::Create(attrs) => match ops.create(id, attrs).await {
            Ok(_) => Ok(Applied::Created),
            Err(AdapterError::Duplicate { .. }) => match policy.duplicate_policy {
                DuplicatePolicy::KeepExisting => {
                    warn!(kind = %id.kind(), id = %id, "Record already exists; keeping it");
                    Ok(Applied::KeptExisting)
                }
                DuplicatePolicy::ReplaceExisting => {
                    warn!(kind = %id.kind(), id = %id, "Record already exists; replacing it");
                    ops.delete(id).await?;
                    if let Err(e) = ops.create(id, attrs).await {
                        error!(
                            kind = %id.kind(),
                            id = %id,
                            error = %e,
                            "Existing record was deleted but could not be created again"
                        );
                        return Err(AdapterError::ReplaceFailed(Box::new(e)));
                    }
                    Ok(Applied::Created)
                }
            },
            Err(e) => Err(e),
        },
        Change::Update(changed) => {
            ops.update(id, changed).await?;
            Ok(Applied::Updated)
        }
        Change::Delete => match ops.delete(id).await {
            Ok(()) => Ok(Applied::Deleted),
            Err(AdapterError::NotFound(_)) => {
                debug!(kind = %id.kind(), id = %id, "Already deleted");
                Ok(Applied::Skipped)
            }
            Err(e) => Err(e),
        },
    }
}

/// Apply `plan` to `destination` in plan order.
///
/// Failures are recorded per item. Without `continue_on_failure` the first
/// failure of a type skips that type's remaining items; other types proceed.
pub async fn execute_plan(
    plan: &Plan,
    destination: &dyn DestinationAdapter,
    policy: &ApplyPolicy,
) -> SyncResult {
    let mut result = SyncResult::default();
    let mut halted: BTreeSet<EntityKind> = BTreeSet::new();

    for item in plan.items() {
        let kind = item.kind();
        if halted.contains(&kind) {
            result.counts_mut(kind).skipped += 1;
            continue;
        }

        let outcome = match destination.ops(kind) {
            Some(ops) => apply_item(ops, item, policy).await,
            None => Err(AdapterError::Unsupported {
                adapter: destination.name().to_string(),
                kind,
            }),
        };

        let unresolved = destination.take_unresolved().await;
        if outcome.is_ok() {
            for failure in unresolved {
                result.unresolved_references.push(ApplyFailure {
                    kind,
                    id: item.id.clone(),
                    error_kind: ErrorKind::ReferenceLookupFailed,
                    message: failure.to_string(),
                });
            }
        }

        match outcome {
            Ok(Applied::Created) => result.counts_mut(kind).created += 1,
            Ok(Applied::Updated) => result.counts_mut(kind).updated += 1,
            Ok(Applied::Deleted) => result.counts_mut(kind).deleted += 1,
            Ok(Applied::Skipped) => result.counts_mut(kind).skipped += 1,
            Ok(Applied::KeptExisting) => {
                result.counts_mut(kind).skipped += 1;
                result.flagged_for_update.push(item.id.clone());
            }
            Err(e) => {
                let error_kind = ErrorKind::classify(&e);
                error!(
                    kind = %kind,
                    id = %item.id,
                    action = item.change.as_str(),
                    error = %e,
                    "Failed to apply change"
                );
                result.failures.push(ApplyFailure {
                    kind,
                    id: item.id.clone(),
                    error_kind,
                    message: e.to_string(),
                });

                if !policy.continue_on_failure {
                    warn!(kind = %kind, "Stopping further changes for this type");
                    halted.insert(kind);
                }
            }
        }
    }

    result.halted = halted.into_iter().collect();
    info!(result = %result, "Applied plan");
    result
}
