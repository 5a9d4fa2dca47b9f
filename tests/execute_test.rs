mod common;

use common::{ip, prefix, prefix_id, prefix_with_description, store, vlan, MockDestination};
use ddi_ssot::adapter::sot::{SotAdapter, SotDatabase};
use ddi_ssot::adapter::SourceAdapter;
use ddi_ssot::config::DuplicatePolicy;
use ddi_ssot::model::{EntityId, EntityKind};
use ddi_ssot::reconciliation::{build_plan, execute_plan, ApplyPolicy, DiffOptions, ErrorKind};

fn halting() -> ApplyPolicy {
    ApplyPolicy {
        continue_on_failure: false,
        ..ApplyPolicy::default()
    }
}

#[tokio::test]
async fn test_counts_per_type() {
    let destination = MockDestination::new(store(vec![
        prefix_with_description("10.0.1.0/24", "old"),
        prefix("10.0.2.0/24"),
    ]));
    let source = store(vec![
        prefix("10.0.0.0/24"),
        prefix_with_description("10.0.1.0/24", "new"),
        ip("10.0.0.5", "10.0.0.0/24"),
    ]);

    let plan = build_plan(&source, &destination.load().await.unwrap(), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    let prefixes = result.counts_for(EntityKind::Prefix);
    assert_eq!(prefixes.created, 1);
    assert_eq!(prefixes.updated, 1);
    assert_eq!(prefixes.deleted, 1);
    assert_eq!(result.counts_for(EntityKind::IpAddress).created, 1);
    assert_eq!(result.summary(), "created=2 updated=1 deleted=1 skipped=0 failed=0");
}

#[tokio::test]
async fn test_continue_on_failure_applies_remaining_items() {
    let destination = MockDestination::empty().fail_on(prefix_id("10.0.0.0/24"));
    let source = store(vec![
        prefix("10.0.0.0/24"),
        prefix("10.0.1.0/24"),
        prefix("10.0.2.0/24"),
    ]);

    let plan = build_plan(&source, &store(vec![]), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    assert_eq!(result.counts_for(EntityKind::Prefix).created, 2);
    assert_eq!(result.failures.len(), 1);
    let failure = &result.failures[0];
    assert_eq!(failure.kind, EntityKind::Prefix);
    assert_eq!(failure.id, prefix_id("10.0.0.0/24"));
    assert_eq!(failure.error_kind, ErrorKind::ApplyFailed);
    assert!(failure.message.contains("injected failure"));
    assert!(result.halted.is_empty());
}

#[tokio::test]
async fn test_without_continue_the_failed_type_stops() {
    let destination = MockDestination::empty().fail_on(prefix_id("10.0.0.0/24"));
    let source = store(vec![
        prefix("10.0.0.0/24"),
        prefix("10.0.1.0/24"),
        vlan(10, None, "ASSIGNED"),
    ]);

    let plan = build_plan(&source, &store(vec![]), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &halting()).await;

    let prefixes = result.counts_for(EntityKind::Prefix);
    assert_eq!(prefixes.created, 0);
    assert_eq!(prefixes.skipped, 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.halted, vec![EntityKind::Prefix]);

    // Other types are unaffected.
    assert_eq!(result.counts_for(EntityKind::Vlan).created, 1);
    assert!(!destination
        .calls()
        .iter()
        .any(|(_, id)| *id == prefix_id("10.0.1.0/24")));
}

#[tokio::test]
async fn test_duplicate_create_keeps_existing_and_flags_it() {
    let destination =
        MockDestination::empty().hide(prefix_with_description("10.0.0.0/24", "existing"));
    let source = store(vec![prefix_with_description("10.0.0.0/24", "incoming")]);

    let plan = build_plan(&source, &destination.load().await.unwrap(), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    assert!(!result.has_failures());
    assert_eq!(result.counts_for(EntityKind::Prefix).skipped, 1);
    assert_eq!(result.flagged_for_update, vec![prefix_id("10.0.0.0/24")]);

    let kept = destination.records();
    let entity = kept.get(&prefix_id("10.0.0.0/24")).unwrap();
    assert_eq!(entity.as_prefix().unwrap().description, "existing");
}

#[tokio::test]
async fn test_duplicate_create_can_replace_existing() {
    let destination =
        MockDestination::empty().hide(prefix_with_description("10.0.0.0/24", "existing"));
    let source = store(vec![prefix_with_description("10.0.0.0/24", "incoming")]);
    let policy = ApplyPolicy {
        duplicate_policy: DuplicatePolicy::ReplaceExisting,
        ..ApplyPolicy::default()
    };

    let plan = build_plan(&source, &destination.load().await.unwrap(), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &policy).await;

    assert!(!result.has_failures());
    assert_eq!(result.counts_for(EntityKind::Prefix).created, 1);
    assert!(result.flagged_for_update.is_empty());

    let actions: Vec<String> = destination.calls().into_iter().map(|(a, _)| a).collect();
    assert_eq!(actions, vec!["create", "delete", "create"]);
    let entity = destination.records().get(&prefix_id("10.0.0.0/24")).unwrap().clone();
    assert_eq!(entity.as_prefix().unwrap().description, "incoming");
}

#[tokio::test]
async fn test_failed_replacement_is_reported_as_such() {
    let destination = MockDestination::empty()
        .hide(prefix_with_description("10.0.0.0/24", "existing"))
        .fail_recreate(prefix_id("10.0.0.0/24"));
    let source = store(vec![prefix_with_description("10.0.0.0/24", "incoming")]);
    let policy = ApplyPolicy {
        duplicate_policy: DuplicatePolicy::ReplaceExisting,
        ..ApplyPolicy::default()
    };

    let plan = build_plan(&source, &destination.load().await.unwrap(), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &policy).await;

    assert_eq!(result.counts_for(EntityKind::Prefix).created, 0);
    assert_eq!(result.failures.len(), 1);
    let failure = &result.failures[0];
    assert_eq!(failure.error_kind, ErrorKind::ApplyFailed);
    assert!(failure.message.starts_with("Deleted the existing record"));
    assert!(failure.message.contains("injected re-create failure"));
    assert!(!destination.records().contains(&prefix_id("10.0.0.0/24")));
}

#[tokio::test]
async fn test_delete_of_missing_record_is_skipped() {
    let destination = MockDestination::empty();
    let stale = store(vec![prefix("10.0.0.0/24")]);

    // Plan against a snapshot the destination no longer matches.
    let plan = build_plan(&store(vec![]), &stale, &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    assert!(!result.has_failures());
    assert_eq!(result.counts_for(EntityKind::Prefix).skipped, 1);
    assert_eq!(result.counts_for(EntityKind::Prefix).deleted, 0);
}

#[tokio::test]
async fn test_update_of_missing_record_fails_as_not_found() {
    let destination = MockDestination::empty();
    let stale = store(vec![prefix_with_description("10.0.0.0/24", "old")]);
    let source = store(vec![prefix_with_description("10.0.0.0/24", "new")]);

    let plan = build_plan(&source, &stale, &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].error_kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unsupported_type_is_recorded_per_item() {
    let destination = MockDestination::empty().without(EntityKind::Vlan);
    let source = store(vec![
        vlan(10, None, "ASSIGNED"),
        vlan(20, None, "ASSIGNED"),
        prefix("10.0.0.0/24"),
    ]);

    let plan = build_plan(&source, &store(vec![]), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    assert_eq!(result.failures.len(), 2);
    assert!(result.failures.iter().all(|f| f.kind == EntityKind::Vlan));
    assert!(result.failures.iter().all(|f| f.error_kind == ErrorKind::ApplyFailed));
    assert_eq!(result.counts_for(EntityKind::Prefix).created, 1);
}

#[tokio::test]
async fn test_unknown_vlan_status_leaves_destination_untouched() {
    let destination = SotAdapter::new(SotDatabase::new());
    let source = store(vec![vlan(10, None, "Bogus"), vlan(20, None, "ASSIGNED")]);

    let plan = build_plan(&source, &destination.load().await.unwrap(), &DiffOptions::default());
    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;

    assert_eq!(result.failures.len(), 1);
    let failure = &result.failures[0];
    assert_eq!(failure.error_kind, ErrorKind::UnknownStatus);
    assert_eq!(
        failure.id,
        EntityId::Vlan {
            vid: 10,
            vlangroup: None
        }
    );

    let db = destination.database().await;
    assert_eq!(db.vlans.len(), 1);
    assert_eq!(db.vlans[0].vid, 20);
}
