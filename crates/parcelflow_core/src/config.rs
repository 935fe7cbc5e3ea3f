//! Engine configuration.
//!
//! # Responsibility
//! - Hold every tunable of the workflow engine in one explicit value that is
//!   passed to services at construction time.
//! - Load overrides from JSON, falling back to defaults per field.
//!
//! # Invariants
//! - A `WorkflowConfig` returned by `from_json_str` has passed `validate()`.

use crate::dispatch::{Backoff, BackoffKind, JobOptions};
use crate::model::package::PackageStatus;
use crate::repo::store::Durability;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of cards fetched per board column.
pub const DEFAULT_COLUMN_LIMIT: u32 = 50;
const MAX_COLUMN_LIMIT: u32 = 500;

/// Configuration load or validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowConfigError {
    Parse(String),
    Invalid(String),
}

impl Display for WorkflowConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid workflow config JSON: {message}"),
            Self::Invalid(message) => write!(f, "invalid workflow config: {message}"),
        }
    }
}

impl Error for WorkflowConfigError {}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    pub durability: Durability,
    pub kanban: KanbanConfig,
    pub bulk: BulkConfig,
    pub dispatch: DispatchConfig,
}

impl WorkflowConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, WorkflowConfigError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| WorkflowConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkflowConfigError> {
        if self.kanban.column_limit == 0 || self.kanban.column_limit > MAX_COLUMN_LIMIT {
            return Err(WorkflowConfigError::Invalid(format!(
                "kanban.column_limit must be within 1..={MAX_COLUMN_LIMIT}, got {}",
                self.kanban.column_limit
            )));
        }
        if self.kanban.columns.is_empty() {
            return Err(WorkflowConfigError::Invalid(
                "kanban.columns must not be empty".to_string(),
            ));
        }
        if self.bulk.max_workers == 0 {
            return Err(WorkflowConfigError::Invalid(
                "bulk.max_workers must be at least 1".to_string(),
            ));
        }
        if self.bulk.max_items == Some(0) {
            return Err(WorkflowConfigError::Invalid(
                "bulk.max_items must be at least 1 when set".to_string(),
            ));
        }
        if self.dispatch.queue_name.trim().is_empty() {
            return Err(WorkflowConfigError::Invalid(
                "dispatch.queue_name must not be blank".to_string(),
            ));
        }
        if self.dispatch.attempts == 0 {
            return Err(WorkflowConfigError::Invalid(
                "dispatch.attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One board column definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KanbanColumnSpec {
    pub status: PackageStatus,
    /// Header text; defaults to the status label.
    #[serde(default)]
    pub label: Option<String>,
    pub color: String,
}

impl KanbanColumnSpec {
    pub fn new(status: PackageStatus, color: impl Into<String>) -> Self {
        Self {
            status,
            label: None,
            color: color.into(),
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.status.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KanbanConfig {
    /// Maximum cards per column, newest first.
    pub column_limit: u32,
    /// Also run a COUNT query per column and report `total_matching`.
    pub exact_counts: bool,
    pub columns: Vec<KanbanColumnSpec>,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            column_limit: DEFAULT_COLUMN_LIMIT,
            exact_counts: false,
            columns: vec![
                KanbanColumnSpec::new(PackageStatus::Transferred, "#f97316"),
                KanbanColumnSpec::new(PackageStatus::Flagged, "#ef4444"),
                KanbanColumnSpec::new(PackageStatus::Unassigned, "#6b7280"),
                KanbanColumnSpec::new(PackageStatus::Cancelled, "#475569"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkConfig {
    /// `1` runs items sequentially on the calling thread.
    pub max_workers: usize,
    /// Batches larger than this are rejected before any item runs.
    pub max_items: Option<usize>,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            max_items: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub queue_name: String,
    pub attempts: u32,
    pub backoff_kind: BackoffKind,
    pub backoff_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_name: "notifications".to_string(),
            attempts: 3,
            backoff_kind: BackoffKind::Exponential,
            backoff_delay_ms: 1_000,
        }
    }
}

impl DispatchConfig {
    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            attempts: self.attempts,
            backoff: Backoff {
                kind: self.backoff_kind,
                delay_ms: self.backoff_delay_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{WorkflowConfig, WorkflowConfigError, DEFAULT_COLUMN_LIMIT};
    use crate::dispatch::BackoffKind;
    use crate::model::package::PackageStatus;
    use crate::repo::store::Durability;

    #[test]
    fn empty_document_yields_defaults() {
        let config = WorkflowConfig::from_json_str("{}").unwrap();
        assert_eq!(config, WorkflowConfig::default());
        assert_eq!(config.kanban.column_limit, DEFAULT_COLUMN_LIMIT);
        assert_eq!(config.durability, Durability::Transactional);
        let statuses: Vec<_> = config.kanban.columns.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                PackageStatus::Transferred,
                PackageStatus::Flagged,
                PackageStatus::Unassigned,
                PackageStatus::Cancelled
            ]
        );
    }

    #[test]
    fn partial_document_overrides_only_given_fields() {
        let config = WorkflowConfig::from_json_str(
            r#"{
                "durability": "sequential",
                "bulk": { "max_workers": 4 },
                "dispatch": { "backoff_kind": "fixed" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.durability, Durability::Sequential);
        assert_eq!(config.bulk.max_workers, 4);
        assert_eq!(config.bulk.max_items, None);
        assert_eq!(config.dispatch.backoff_kind, BackoffKind::Fixed);
        assert_eq!(config.dispatch.attempts, 3);
    }

    #[test]
    fn custom_columns_are_accepted() {
        let config = WorkflowConfig::from_json_str(
            r##"{ "kanban": { "columns": [
                { "status": "in_storage", "label": "Shelved", "color": "#00ff00" }
            ] } }"##,
        )
        .unwrap();
        assert_eq!(config.kanban.columns.len(), 1);
        assert_eq!(config.kanban.columns[0].display_label(), "Shelved");
        assert_eq!(config.kanban.column_limit, DEFAULT_COLUMN_LIMIT);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = WorkflowConfig::from_json_str(r#"{ "bulk": { "max_workers": 0 } }"#).unwrap_err();
        assert!(matches!(err, WorkflowConfigError::Invalid(_)));

        let err =
            WorkflowConfig::from_json_str(r#"{ "kanban": { "column_limit": 0 } }"#).unwrap_err();
        assert!(matches!(err, WorkflowConfigError::Invalid(_)));

        let err = WorkflowConfig::from_json_str(r#"{ "kanban": { "columns": [] } }"#).unwrap_err();
        assert!(matches!(err, WorkflowConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_fields_and_statuses_fail_to_parse() {
        let err = WorkflowConfig::from_json_str(r#"{ "retries": 3 }"#).unwrap_err();
        assert!(matches!(err, WorkflowConfigError::Parse(_)));

        let err = WorkflowConfig::from_json_str(
            r##"{ "kanban": { "columns": [ { "status": "lost", "color": "#000" } ] } }"##,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowConfigError::Parse(_)));
    }
}
