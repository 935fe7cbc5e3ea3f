//! Remark domain model.
//!
//! A remark is the user-facing narrative companion to the audit trail: every
//! workflow transition writes one, and callers may add manual annotations.

use crate::model::package::{PackageId, PackageStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable note attached to one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remark {
    pub id: Uuid,
    pub package_id: PackageId,
    pub message: String,
    /// Status in effect when the remark was written.
    pub status: Option<PackageStatus>,
    pub created_by: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Remark {
    pub fn new(
        package_id: PackageId,
        message: impl Into<String>,
        status: Option<PackageStatus>,
        created_by: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            package_id,
            message: message.into(),
            status,
            created_by: created_by.into(),
            created_at,
        }
    }
}
