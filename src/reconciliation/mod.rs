mod audit;
mod execute;
mod plan;
mod result;
mod run;

pub use audit::{audit_synced, AuditFailure, AuditReport};
pub use execute::{execute_plan, ApplyPolicy};
pub use plan::{build_plan, Change, DiffOptions, Plan, PlanItem};
pub use result::{ApplyFailure, ErrorKind, KindCounts, SyncResult};
pub use run::{Reconciler, RunError, RunReport};
