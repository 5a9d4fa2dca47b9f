mod common;

use common::{
    aggregate, container, ip, prefix, prefix_id, prefix_with_description, store, vlan, vlan_group,
    MockDestination,
};
use ddi_ssot::model::{EntityId, EntityKind};
use ddi_ssot::reconciliation::{build_plan, execute_plan, ApplyPolicy, Change, DiffOptions};
use ddi_ssot::adapter::SourceAdapter;
use serde_json::json;

fn mixed_snapshot() -> ddi_ssot::store::EntityStore {
    store(vec![
        vlan_group("Campus"),
        vlan(10, Some("Campus"), "ASSIGNED"),
        aggregate("10.0.0.0/8"),
        container("10.0.0.0/16"),
        prefix("10.0.0.0/24"),
        ip("10.0.0.5", "10.0.0.0/24"),
    ])
}

#[test]
fn test_diff_of_snapshot_with_itself_is_empty() {
    let snapshot = mixed_snapshot();
    let plan = build_plan(&snapshot, &snapshot, &DiffOptions::default());
    assert!(plan.is_empty(), "Plan should be empty: {:?}", plan);
}

#[test]
fn test_unmatched_destination_records_are_deleted_by_default() {
    let source = store(vec![prefix("10.0.0.0/24")]);
    let destination = store(vec![prefix("10.0.1.0/24")]);

    let plan = build_plan(&source, &destination, &DiffOptions::default());

    let items: Vec<_> = plan.items().iter().map(|i| (i.id.clone(), i.change.as_str())).collect();
    assert_eq!(
        items,
        vec![
            (prefix_id("10.0.0.0/24"), "create"),
            (prefix_id("10.0.1.0/24"), "delete"),
        ]
    );
}

#[test]
fn test_skip_unmatched_dst_omits_deletes() {
    let source = store(vec![prefix("10.0.0.0/24")]);
    let destination = store(vec![prefix("10.0.1.0/24")]);
    let options = DiffOptions {
        skip_unmatched_dst: true,
        ..DiffOptions::default()
    };

    let plan = build_plan(&source, &destination, &options);

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.items()[0].id, prefix_id("10.0.0.0/24"));
    assert!(matches!(plan.items()[0].change, Change::Create(_)));
}

#[test]
fn test_prefix_create_precedes_its_addresses() {
    let source = store(vec![
        ip("10.0.0.5", "10.0.0.0/24"),
        ip("10.0.1.7", "10.0.1.0/24"),
        prefix("10.0.1.0/24"),
        prefix("10.0.0.0/24"),
    ]);
    let plan = build_plan(&source, &store(vec![]), &DiffOptions::default());

    for item in plan.for_kind(EntityKind::IpAddress) {
        let parent = match &item.id {
            EntityId::IpAddress { prefix, .. } => EntityId::Prefix { network: *prefix },
            other => panic!("unexpected id {:?}", other),
        };
        let parent_pos = plan.position(&parent).expect("parent prefix should be planned");
        let ip_pos = plan.position(&item.id).expect("address should be planned");
        assert!(parent_pos < ip_pos, "{} must be created before {}", parent, item.id);
    }
}

#[test]
fn test_deletes_run_children_first() {
    let destination = store(vec![
        vlan_group("Campus"),
        vlan(10, Some("Campus"), "ASSIGNED"),
        prefix("10.0.0.0/24"),
        ip("10.0.0.5", "10.0.0.0/24"),
    ]);
    let options = DiffOptions {
        delete_vlans: true,
        ..DiffOptions::default()
    };
    let plan = build_plan(&store(vec![]), &destination, &options);

    let kinds: Vec<EntityKind> = plan.items().iter().map(|i| i.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::IpAddress,
            EntityKind::Prefix,
            EntityKind::Vlan,
            EntityKind::VlanGroup,
        ]
    );
}

#[test]
fn test_vlan_deletes_need_opt_in() {
    let destination = store(vec![vlan_group("Campus"), vlan(10, Some("Campus"), "ASSIGNED")]);
    let plan = build_plan(&store(vec![]), &destination, &DiffOptions::default());
    assert!(plan.is_empty());
}

#[test]
fn test_vlans_are_still_created_and_updated_without_delete_opt_in() {
    let source = store(vec![vlan_group("Campus"), vlan(10, Some("Campus"), "RESERVED")]);
    let destination = store(vec![vlan(10, Some("Campus"), "ASSIGNED")]);
    let plan = build_plan(&source, &destination, &DiffOptions::default());

    assert_eq!(plan.len(), 2);
    assert!(matches!(plan.items()[0].change, Change::Create(_)));
    match &plan.items()[1].change {
        Change::Update(changed) => {
            assert_eq!(changed.len(), 1);
            assert_eq!(changed.get("status"), Some(&json!("RESERVED")));
        }
        other => panic!("expected update, got {:?}", other),
    }
}

#[test]
fn test_update_carries_only_changed_fields() {
    let source = store(vec![prefix_with_description("10.0.0.0/24", "new")]);
    let destination = store(vec![prefix_with_description("10.0.0.0/24", "old")]);

    let plan = build_plan(&source, &destination, &DiffOptions::default());

    assert_eq!(plan.len(), 1);
    assert_eq!(
        plan.to_json(),
        json!({"prefix": {"10.0.0.0/24": {"update": {"description": "new"}}}})
    );
}

#[test]
fn test_kinds_filter_limits_plan() {
    let source = mixed_snapshot();
    let options = DiffOptions {
        kinds: vec![EntityKind::Aggregate],
        ..DiffOptions::default()
    };
    let plan = build_plan(&source, &store(vec![]), &options);

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.items()[0].kind(), EntityKind::Aggregate);
}

#[test]
fn test_plan_json_shape() {
    let source = store(vec![aggregate("10.0.0.0/8")]);
    let destination = store(vec![prefix("10.1.0.0/24")]);
    let plan = build_plan(&source, &destination, &DiffOptions::default());

    assert_eq!(
        plan.to_json(),
        json!({
            "aggregate": {
                "10.0.0.0/8": {
                    "create": {"description": "", "status": "active", "ext_attrs": {}}
                }
            },
            "prefix": {"10.1.0.0/24": {"delete": {}}}
        })
    );
}

#[tokio::test]
async fn test_applying_plan_converges() {
    let source = mixed_snapshot();
    let destination = MockDestination::new(store(vec![
        prefix_with_description("10.0.0.0/24", "stale"),
        prefix("10.9.0.0/24"),
        ip("10.9.0.1", "10.9.0.0/24"),
        vlan(10, Some("Campus"), "UNASSIGNED"),
    ]));
    let options = DiffOptions {
        delete_vlans: true,
        ..DiffOptions::default()
    };

    let before = destination.load().await.expect("Should load");
    let plan = build_plan(&source, &before, &options);
    assert!(!plan.is_empty());

    let result = execute_plan(&plan, &destination, &ApplyPolicy::default()).await;
    assert!(!result.has_failures(), "Unexpected failures: {:?}", result.failures);

    let after = destination.load().await.expect("Should reload");
    let again = build_plan(&source, &after, &options);
    assert!(again.is_empty(), "Second plan should be empty: {:?}", again);
}
