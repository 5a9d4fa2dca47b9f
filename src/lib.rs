pub mod adapter;
pub mod config;
pub mod model;
pub mod normalize;
pub mod reconciliation;
pub mod store;
pub mod utils;
pub mod vocab;

// Re-export commonly used types
pub use adapter::{
    AdapterError, DestinationAdapter, EntityOps, SourceAdapter, SyncMarkers, SyncMetadata,
};
pub use config::{read_config, write_config, ConfigError, DuplicatePolicy, SyncConfig};
pub use model::{
    Aggregate, Attrs, Cidr, Entity, EntityId, EntityKind, ExtAttrs, IpAddress, ModelError,
    NetworkPrefix, Vlan, VlanGroup, VlanRef,
};
pub use normalize::{normalize_ext_attrs, NormalizedAttrs, ReferenceLookup, ReferenceTable};
pub use reconciliation::{
    audit_synced, build_plan, execute_plan, ApplyPolicy, AuditReport, Change, DiffOptions,
    ErrorKind, Plan, PlanItem, Reconciler, RunError, RunReport, SyncResult,
};
pub use store::{EntityStore, StoreError};
pub use vocab::{Direction, VocabError, Vocabulary};
