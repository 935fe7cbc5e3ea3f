//! Merged remark and audit history for one package.

use crate::model::audit::AuditLogEntry;
use crate::model::package::PackageId;
use crate::model::remark::Remark;
use crate::repo::store::WorkflowStore;
use crate::service::error::{WorkflowError, WorkflowResult};
use serde::Serialize;

/// One entry of the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityItem {
    Remark(Remark),
    Audit(AuditLogEntry),
}

impl ActivityItem {
    pub fn created_at(&self) -> i64 {
        match self {
            Self::Remark(remark) => remark.created_at,
            Self::Audit(entry) => entry.created_at,
        }
    }
}

pub struct ActivityHistory<S: WorkflowStore> {
    store: S,
}

impl<S: WorkflowStore> ActivityHistory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn remarks(&self, package_id: PackageId) -> WorkflowResult<Vec<Remark>> {
        self.ensure_exists(package_id)?;
        Ok(self.store.list_remarks(package_id)?)
    }

    pub fn audit_entries(&self, package_id: PackageId) -> WorkflowResult<Vec<AuditLogEntry>> {
        self.ensure_exists(package_id)?;
        Ok(self.store.list_audit_entries(package_id)?)
    }

    /// Remarks and audit entries, newest first.
    ///
    /// Both sources already arrive newest first; at equal timestamps the
    /// remark written by a transition precedes its audit entry.
    pub fn feed(&self, package_id: PackageId) -> WorkflowResult<Vec<ActivityItem>> {
        let remarks = self.remarks(package_id)?;
        let audits = self.store.list_audit_entries(package_id)?;

        let mut feed = Vec::with_capacity(remarks.len() + audits.len());
        let mut remarks = remarks.into_iter().peekable();
        let mut audits = audits.into_iter().peekable();
        loop {
            let take_remark = match (remarks.peek(), audits.peek()) {
                (Some(remark), Some(entry)) => remark.created_at >= entry.created_at,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let item = if take_remark {
                remarks.next().map(ActivityItem::Remark)
            } else {
                audits.next().map(ActivityItem::Audit)
            };
            feed.extend(item);
        }
        Ok(feed)
    }

    fn ensure_exists(&self, package_id: PackageId) -> WorkflowResult<()> {
        match self.store.get_package(package_id)? {
            Some(_) => Ok(()),
            None => Err(WorkflowError::NotFound(package_id)),
        }
    }
}
