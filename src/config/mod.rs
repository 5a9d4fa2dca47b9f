use crate::adapter::SyncMarkers;
use crate::model::EntityKind;
use crate::utils::{LAST_SYNCED_FIELD, LAST_SYNCED_LABEL, SYNC_TAG_NAME, SYNC_TAG_SLUG};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What to do when a create collides with a record already in the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    /// Log, keep the existing record, and flag it for an update next run
    #[default]
    KeepExisting,
    /// Log, delete the existing record, and create it again. If the second
    /// create fails the record stays absent until the next run; the failure
    /// is recorded as a replace failure.
    ReplaceExisting,
}

fn default_true() -> bool {
    true
}

fn default_kinds() -> Vec<EntityKind> {
    EntityKind::ORDER.to_vec()
}

fn default_sync_tag() -> String {
    SYNC_TAG_SLUG.to_string()
}

fn default_sync_tag_name() -> String {
    SYNC_TAG_NAME.to_string()
}

fn default_last_synced_field() -> String {
    LAST_SYNCED_FIELD.to_string()
}

fn default_last_synced_label() -> String {
    LAST_SYNCED_LABEL.to_string()
}

/// Reconciliation run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Leave destination-only records out of the plan instead of deleting them
    #[serde(default)]
    pub skip_unmatched_dst: bool,
    /// Keep applying after a failed item. When off, a failure stops the rest
    /// of that entity type.
    #[serde(default = "default_true")]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Allow deleting destination-only VLANs and VLAN groups
    #[serde(default)]
    pub delete_vlans: bool,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<EntityKind>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,
    #[serde(default = "default_sync_tag_name")]
    pub sync_tag_name: String,
    #[serde(default = "default_last_synced_field")]
    pub last_synced_field: String,
    #[serde(default = "default_last_synced_label")]
    pub last_synced_label: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skip_unmatched_dst: false,
            continue_on_failure: default_true(),
            duplicate_policy: DuplicatePolicy::default(),
            delete_vlans: false,
            kinds: default_kinds(),
            dry_run: false,
            sync_tag: default_sync_tag(),
            sync_tag_name: default_sync_tag_name(),
            last_synced_field: default_last_synced_field(),
            last_synced_label: default_last_synced_label(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kinds.is_empty() {
            return Err(ConfigError::Invalid("kinds must name at least one entity type".into()));
        }

        let markers = [
            ("syncTag", &self.sync_tag),
            ("syncTagName", &self.sync_tag_name),
            ("lastSyncedField", &self.last_synced_field),
            ("lastSyncedLabel", &self.last_synced_label),
        ];
        for (field, value) in markers {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Whether `kind` takes part in the run
    pub fn includes(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn markers(&self) -> SyncMarkers {
        SyncMarkers {
            tag_slug: self.sync_tag.clone(),
            tag_name: self.sync_tag_name.clone(),
            field_key: self.last_synced_field.clone(),
            field_label: self.last_synced_label.clone(),
        }
    }
}

/// Read the configuration file
pub async fn read_config(config_path: &Path) -> Result<Option<SyncConfig>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(config_path).await?;
    let config: SyncConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(Some(config))
}

/// Write the configuration file
pub async fn write_config(config_path: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content).await?;
    Ok(())
}
