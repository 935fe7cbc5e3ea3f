//! Audit log domain model.
//!
//! # Responsibility
//! - Define the structured, append-only record of actions against entities.
//! - Provide a small builder for before/after value snapshots.
//!
//! # Invariants
//! - Entries are never updated or deleted.
//! - `old_values` and `new_values` are always JSON objects.

use crate::model::package::{Package, PackageId, PackageStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Entity type recorded for package audit entries.
pub const PACKAGES_ENTITY: &str = "packages";

/// Key-value snapshot stored in `old_values` / `new_values`.
pub type AuditSnapshot = Map<String, Value>;

/// Immutable structured record of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub organization_id: String,
    pub entity_type: String,
    pub entity_id: PackageId,
    /// Operation name, e.g. `approve`, `cancel`, `status_override`.
    pub action: String,
    pub memo: Option<String>,
    pub old_values: AuditSnapshot,
    pub new_values: AuditSnapshot,
    pub actor_id: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl AuditLogEntry {
    /// Creates a package-scoped audit entry with empty snapshots.
    pub fn for_package(
        package: &Package,
        action: impl Into<String>,
        actor_id: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: package.organization_id.clone(),
            entity_type: PACKAGES_ENTITY.to_string(),
            entity_id: package.id,
            action: action.into(),
            memo: None,
            old_values: AuditSnapshot::new(),
            new_values: AuditSnapshot::new(),
            actor_id: actor_id.into(),
            created_at,
        }
    }

    /// Records the status change in both snapshots.
    pub fn with_status_change(self, from: PackageStatus, to: PackageStatus) -> Self {
        self.with_change("status", from.as_str(), to.as_str())
    }

    /// Adds one before/after pair.
    pub fn with_change(mut self, key: &str, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        self.old_values.insert(key.to_string(), old.into());
        self.new_values.insert(key.to_string(), new.into());
        self
    }

    /// Adds operation metadata that only exists after the change.
    pub fn with_new_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.new_values.insert(key.to_string(), value.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Previous status recorded in `old_values`, when present and valid.
    pub fn old_status(&self) -> Option<PackageStatus> {
        snapshot_status(&self.old_values)
    }

    /// New status recorded in `new_values`, when present and valid.
    pub fn new_status(&self) -> Option<PackageStatus> {
        snapshot_status(&self.new_values)
    }
}

fn snapshot_status(snapshot: &AuditSnapshot) -> Option<PackageStatus> {
    snapshot
        .get("status")
        .and_then(Value::as_str)
        .and_then(|value| value.parse().ok())
}
