//! Workflow persistence contract and its SQLite implementation.
//!
//! # Responsibility
//! - Expose the queries and writes the workflow engine needs as one trait.
//! - Group a transition's package update, remark, audit entry and optional
//!   attachment into one commit honoring the configured `Durability`.
//!
//! # Invariants
//! - `Durability::Transactional` commits all rows of a transition or none.
//! - `Durability::Sequential` writes them one statement at a time; a failure
//!   leaves earlier rows in place.
//! - The SQLite store serializes access to its connection, so it can be
//!   shared across bulk worker threads.

use crate::model::attachment::Attachment;
use crate::model::audit::{AuditLogEntry, PACKAGES_ENTITY};
use crate::model::package::{Package, PackageId, PackageStatus};
use crate::model::remark::Remark;
use crate::repo::actor_repo::SqliteActorRepository;
use crate::repo::attachment_repo::{AttachmentRepository, SqliteAttachmentRepository};
use crate::repo::audit_repo::{AuditRepository, SqliteAuditRepository};
use crate::repo::package_repo::{
    PackageFilter, PackageListQuery, PackageRepository, SqlitePackageRepository, StoreResult,
};
use crate::repo::remark_repo::{RemarkRepository, SqliteRemarkRepository};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How the rows of one workflow write are committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Package update, remark and audit entry share one transaction.
    #[default]
    Transactional,
    /// Independent statements, no enclosing transaction.
    Sequential,
}

/// All rows written by one successful workflow operation.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// Package state after the operation.
    pub package: Package,
    /// Version read before the guard ran.
    pub expected_version: i64,
    pub remark: Remark,
    pub audit: AuditLogEntry,
    pub attachment: Option<Attachment>,
}

/// Persistence operations required by the workflow engine.
pub trait WorkflowStore {
    /// Active (non-deleted) package by id.
    fn get_package(&self, id: PackageId) -> StoreResult<Option<Package>>;
    fn list_packages(&self, query: &PackageListQuery) -> StoreResult<Vec<Package>>;
    fn count_packages(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> StoreResult<u64>;
    fn count_by_status(&self, filter: &PackageFilter) -> StoreResult<BTreeMap<PackageStatus, u64>>;
    /// Inserts a new package with its creation remark and audit entry.
    fn create_package(
        &self,
        package: &Package,
        remark: &Remark,
        audit: &AuditLogEntry,
    ) -> StoreResult<()>;
    fn commit_transition(&self, commit: &TransitionCommit) -> StoreResult<()>;
    fn append_remark(&self, remark: &Remark) -> StoreResult<()>;
    fn list_remarks(&self, package_id: PackageId) -> StoreResult<Vec<Remark>>;
    fn list_audit_entries(&self, package_id: PackageId) -> StoreResult<Vec<AuditLogEntry>>;
    fn list_attachments(&self, package_id: PackageId) -> StoreResult<Vec<Attachment>>;
    fn actor_display_names(&self, actor_ids: &[String]) -> StoreResult<HashMap<String, String>>;
}

/// SQLite workflow store owning one migrated connection.
pub struct SqliteWorkflowStore {
    conn: Mutex<Connection>,
    durability: Durability,
}

impl SqliteWorkflowStore {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn new(conn: Connection, durability: Durability) -> Self {
        Self {
            conn: Mutex::new(conn),
            durability,
        }
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Locks the underlying connection for direct inspection.
    ///
    /// A poisoned lock is recovered: connection state is owned by SQLite and
    /// stays consistent even when a holder panicked.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records or renames the display name used for an actor id.
    pub fn upsert_actor(&self, actor_id: &str, display_name: &str) -> StoreResult<()> {
        let conn = self.connection();
        SqliteActorRepository::new(&conn).upsert_actor(actor_id, display_name)
    }

    /// Runs `write` inside a transaction or directly, per `durability`.
    fn write<T>(&self, write: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.connection();
        match self.durability {
            Durability::Transactional => {
                let tx = conn.unchecked_transaction()?;
                let value = write(&tx)?;
                tx.commit()?;
                Ok(value)
            }
            Durability::Sequential => write(&conn),
        }
    }
}

impl WorkflowStore for SqliteWorkflowStore {
    fn get_package(&self, id: PackageId) -> StoreResult<Option<Package>> {
        let conn = self.connection();
        SqlitePackageRepository::new(&conn).get_package(id, false)
    }

    fn list_packages(&self, query: &PackageListQuery) -> StoreResult<Vec<Package>> {
        let conn = self.connection();
        SqlitePackageRepository::new(&conn).list_packages(query)
    }

    fn count_packages(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> StoreResult<u64> {
        let conn = self.connection();
        SqlitePackageRepository::new(&conn).count_packages(filter, status)
    }

    fn count_by_status(&self, filter: &PackageFilter) -> StoreResult<BTreeMap<PackageStatus, u64>> {
        let conn = self.connection();
        SqlitePackageRepository::new(&conn).count_by_status(filter)
    }

    fn create_package(
        &self,
        package: &Package,
        remark: &Remark,
        audit: &AuditLogEntry,
    ) -> StoreResult<()> {
        self.write(|conn| {
            SqlitePackageRepository::new(conn).insert_package(package)?;
            SqliteRemarkRepository::new(conn).append_remark(remark)?;
            SqliteAuditRepository::new(conn).append_entry(audit)
        })
    }

    fn commit_transition(&self, commit: &TransitionCommit) -> StoreResult<()> {
        self.write(|conn| {
            SqlitePackageRepository::new(conn)
                .update_package(&commit.package, commit.expected_version)?;
            SqliteRemarkRepository::new(conn).append_remark(&commit.remark)?;
            SqliteAuditRepository::new(conn).append_entry(&commit.audit)?;
            if let Some(attachment) = &commit.attachment {
                SqliteAttachmentRepository::new(conn).append_attachment(attachment)?;
            }
            Ok(())
        })
    }

    fn append_remark(&self, remark: &Remark) -> StoreResult<()> {
        let conn = self.connection();
        SqliteRemarkRepository::new(&conn).append_remark(remark)
    }

    fn list_remarks(&self, package_id: PackageId) -> StoreResult<Vec<Remark>> {
        let conn = self.connection();
        SqliteRemarkRepository::new(&conn).list_remarks(package_id)
    }

    fn list_audit_entries(&self, package_id: PackageId) -> StoreResult<Vec<AuditLogEntry>> {
        let conn = self.connection();
        SqliteAuditRepository::new(&conn).list_entries(PACKAGES_ENTITY, package_id)
    }

    fn list_attachments(&self, package_id: PackageId) -> StoreResult<Vec<Attachment>> {
        let conn = self.connection();
        SqliteAttachmentRepository::new(&conn).list_attachments(package_id)
    }

    fn actor_display_names(&self, actor_ids: &[String]) -> StoreResult<HashMap<String, String>> {
        let conn = self.connection();
        SqliteActorRepository::new(&conn).display_names(actor_ids)
    }
}

impl<T: WorkflowStore + ?Sized> WorkflowStore for &T {
    fn get_package(&self, id: PackageId) -> StoreResult<Option<Package>> {
        (**self).get_package(id)
    }

    fn list_packages(&self, query: &PackageListQuery) -> StoreResult<Vec<Package>> {
        (**self).list_packages(query)
    }

    fn count_packages(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> StoreResult<u64> {
        (**self).count_packages(filter, status)
    }

    fn count_by_status(&self, filter: &PackageFilter) -> StoreResult<BTreeMap<PackageStatus, u64>> {
        (**self).count_by_status(filter)
    }

    fn create_package(
        &self,
        package: &Package,
        remark: &Remark,
        audit: &AuditLogEntry,
    ) -> StoreResult<()> {
        (**self).create_package(package, remark, audit)
    }

    fn commit_transition(&self, commit: &TransitionCommit) -> StoreResult<()> {
        (**self).commit_transition(commit)
    }

    fn append_remark(&self, remark: &Remark) -> StoreResult<()> {
        (**self).append_remark(remark)
    }

    fn list_remarks(&self, package_id: PackageId) -> StoreResult<Vec<Remark>> {
        (**self).list_remarks(package_id)
    }

    fn list_audit_entries(&self, package_id: PackageId) -> StoreResult<Vec<AuditLogEntry>> {
        (**self).list_audit_entries(package_id)
    }

    fn list_attachments(&self, package_id: PackageId) -> StoreResult<Vec<Attachment>> {
        (**self).list_attachments(package_id)
    }

    fn actor_display_names(&self, actor_ids: &[String]) -> StoreResult<HashMap<String, String>> {
        (**self).actor_display_names(actor_ids)
    }
}
