use super::audit::{audit_synced, AuditReport};
use super::execute::{execute_plan, ApplyPolicy};
use super::plan::{build_plan, DiffOptions, Plan};
use super::result::SyncResult;
use crate::adapter::{AdapterError, DestinationAdapter, SourceAdapter};
use crate::config::{ConfigError, SyncConfig};
use crate::store::EntityStore;
use crate::utils::{now_iso, today};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load {side} snapshot: {source}")]
    Snapshot {
        side: String,
        #[source]
        source: AdapterError,
    },

    #[error("Failed to prepare sync metadata: {0}")]
    Metadata(#[source] AdapterError),
}

/// Everything one run did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub plan: Value,
    pub plan_summary: String,
    /// Absent on a dry run
    pub result: Option<SyncResult>,
    pub audit: Option<AuditReport>,
    /// Why the audit did not run after changes were applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_error: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl RunReport {
    pub fn summary(&self) -> String {
        match &self.result {
            Some(result) => format!("{} -> {}: {}", self.source, self.destination, result),
            None => format!(
                "{} -> {} (dry run): {}",
                self.source, self.destination, self.plan_summary
            ),
        }
    }
}

/// Runs reconciliations under one configuration
pub struct Reconciler {
    config: SyncConfig,
}

impl Reconciler {
    pub fn new(config: SyncConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn load<A>(adapter: &A) -> Result<EntityStore, RunError>
    where
        A: SourceAdapter + ?Sized,
    {
        adapter.load().await.map_err(|source| RunError::Snapshot {
            side: adapter.name().to_string(),
            source,
        })
    }

    /// Plan only, without touching the destination
    pub async fn plan(
        &self,
        source: &dyn SourceAdapter,
        destination: &dyn SourceAdapter,
    ) -> Result<Plan, RunError> {
        let source_store = Self::load(source).await?;
        let destination_store = Self::load(destination).await?;
        Ok(build_plan(
            &source_store,
            &destination_store,
            &DiffOptions::from(&self.config),
        ))
    }

    /// Load both sides, diff, apply to `destination`, then mark what was
    /// reconciled.
    pub async fn run(
        &self,
        source: &dyn SourceAdapter,
        destination: &dyn DestinationAdapter,
    ) -> Result<RunReport, RunError> {
        let started_at = now_iso();
        info!(
            source = source.name(),
            destination = destination.name(),
            dry_run = self.config.dry_run,
            "Starting reconciliation"
        );

        let metadata = if self.config.dry_run {
            None
        } else {
            Some(
                destination
                    .ensure_sync_metadata(&self.config.markers())
                    .await
                    .map_err(RunError::Metadata)?,
            )
        };

        let source_store = Self::load(source).await?;
        let destination_store = Self::load(destination).await?;

        let plan = build_plan(
            &source_store,
            &destination_store,
            &DiffOptions::from(&self.config),
        );
        info!(plan = %plan.summary(), "Built plan");

        let mut report = RunReport {
            source: source.name().to_string(),
            destination: destination.name().to_string(),
            dry_run: self.config.dry_run,
            plan: plan.to_json(),
            plan_summary: plan.summary(),
            result: None,
            audit: None,
            audit_error: None,
            started_at,
            finished_at: String::new(),
        };

        let metadata = match metadata {
            Some(metadata) => metadata,
            None => {
                report.finished_at = now_iso();
                return Ok(report);
            }
        };

        let result = execute_plan(&plan, destination, &ApplyPolicy::from(&self.config)).await;
        report.result = Some(result);

        // Changes are already applied; a failed reload only costs the audit.
        match Self::load(destination).await {
            Ok(updated) => {
                let audit = audit_synced(
                    &source_store,
                    &updated,
                    destination,
                    &metadata,
                    &self.config.kinds,
                    today(),
                )
                .await;
                report.audit = Some(audit);
            }
            Err(e) => {
                warn!(error = %e, "Skipping audit; destination could not be reloaded");
                report.audit_error = Some(e.to_string());
            }
        }

        report.finished_at = now_iso();
        info!(summary = %report.summary(), "Reconciliation finished");
        Ok(report)
    }
}
