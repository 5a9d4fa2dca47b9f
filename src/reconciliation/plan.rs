use crate::config::SyncConfig;
use crate::model::{Attrs, EntityId, EntityKind};
use crate::store::EntityStore;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One planned mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// All attributes of the source record
    Create(Attrs),
    /// Only the attributes that differ
    Update(Attrs),
    Delete,
}

impl Change {
    pub fn as_str(&self) -> &'static str {
        match self {
            Change::Create(_) => "create",
            Change::Update(_) => "update",
            Change::Delete => "delete",
        }
    }

    /// `{"create": attrs}`, `{"update": changed}` or `{"delete": {}}`
    pub fn to_json(&self) -> Value {
        let body = match self {
            Change::Create(attrs) | Change::Update(attrs) => {
                Value::Object(attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            Change::Delete => json!({}),
        };
        let mut object = Map::new();
        object.insert(self.as_str().to_string(), body);
        Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanItem {
    pub id: EntityId,
    pub change: Change,
}

impl PlanItem {
    pub fn kind(&self) -> EntityKind {
        self.id.kind()
    }
}

/// Ordered mutations for one run.
///
/// Creates and updates come first, parents before children; deletes follow,
/// children before parents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    items: Vec<PlanItem>,
}

impl Plan {
    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn for_kind(&self, kind: EntityKind) -> impl Iterator<Item = &PlanItem> {
        self.items.iter().filter(move |item| item.kind() == kind)
    }

    /// Position of the item for `id`, if planned
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    /// `{ "<type>": { "<id>": {"create": ..} | {"update": ..} | {"delete": {}} } }`
    pub fn to_json(&self) -> Value {
        let mut by_kind: BTreeMap<EntityKind, Map<String, Value>> = BTreeMap::new();
        for item in &self.items {
            by_kind
                .entry(item.kind())
                .or_default()
                .insert(item.id.to_string(), item.change.to_json());
        }

        Value::Object(
            by_kind
                .into_iter()
                .map(|(kind, entries)| (kind.as_str().to_string(), Value::Object(entries)))
                .collect(),
        )
    }

    pub fn summary(&self) -> String {
        let count = |name: &str| {
            self.items
                .iter()
                .filter(|item| item.change.as_str() == name)
                .count()
        };
        format!(
            "create={} update={} delete={}",
            count("create"),
            count("update"),
            count("delete")
        )
    }
}

/// Diff-time policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    /// Leave destination-only records out of the plan
    pub skip_unmatched_dst: bool,
    /// Plan deletes for destination-only VLANs and VLAN groups
    pub delete_vlans: bool,
    pub kinds: Vec<EntityKind>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            skip_unmatched_dst: false,
            delete_vlans: false,
            kinds: EntityKind::ORDER.to_vec(),
        }
    }
}

impl From<&SyncConfig> for DiffOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            skip_unmatched_dst: config.skip_unmatched_dst,
            delete_vlans: config.delete_vlans,
            kinds: config.kinds.clone(),
        }
    }
}

/// Attributes of `source` whose value differs in `destination`
fn changed_attrs(source: &Attrs, destination: &Attrs) -> Attrs {
    source
        .iter()
        .filter(|(key, value)| destination.get(*key) != Some(*value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Compare two snapshots and plan the mutations that make `destination`
/// match `source`.
pub fn build_plan(source: &EntityStore, destination: &EntityStore, options: &DiffOptions) -> Plan {
    let kinds: Vec<EntityKind> = EntityKind::ORDER
        .iter()
        .copied()
        .filter(|kind| options.kinds.contains(kind))
        .collect();

    let mut items = Vec::new();
    let mut deletes: Vec<Vec<PlanItem>> = Vec::new();

    for kind in kinds {
        let ids: BTreeSet<&EntityId> = source.ids(kind).chain(destination.ids(kind)).collect();
        let mut kind_deletes = Vec::new();

        for id in ids {
            match (source.get(id).ok(), destination.get(id).ok()) {
                (Some(src), None) => items.push(PlanItem {
                    id: id.clone(),
                    change: Change::Create(src.attrs()),
                }),
                (None, Some(_)) => {
                    if options.skip_unmatched_dst {
                        continue;
                    }
                    if kind.is_vlan_type() && !options.delete_vlans {
                        debug!(kind = %kind, id = %id, "Leaving destination-only record in place");
                        continue;
                    }
                    kind_deletes.push(PlanItem {
                        id: id.clone(),
                        change: Change::Delete,
                    });
                }
                (Some(src), Some(dst)) => {
                    let changed = changed_attrs(&src.attrs(), &dst.attrs());
                    if !changed.is_empty() {
                        items.push(PlanItem {
                            id: id.clone(),
                            change: Change::Update(changed),
                        });
                    }
                }
                (None, None) => {}
            }
        }

        deletes.push(kind_deletes);
    }

    for kind_deletes in deletes.into_iter().rev() {
        items.extend(kind_deletes);
    }

    Plan { items }
}
