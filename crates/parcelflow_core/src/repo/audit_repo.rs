//! Audit trail: append-only structured action log.
//!
//! # Responsibility
//! - Persist `AuditLogEntry` rows with JSON before/after snapshots.
//! - List entries for one entity, newest first.
//!
//! # Invariants
//! - No update or delete API exists; the schema rejects both.
//! - Snapshots must decode back into JSON objects.

use crate::model::audit::{AuditLogEntry, AuditSnapshot};
use crate::model::package::PackageId;
use crate::repo::package_repo::{StoreError, StoreResult};
use crate::repo::remark_repo::parse_uuid;
use rusqlite::{params, Connection, Row};

/// Append-only audit storage.
pub trait AuditRepository {
    fn append_entry(&self, entry: &AuditLogEntry) -> StoreResult<()>;
    fn list_entries(&self, entity_type: &str, entity_id: PackageId)
        -> StoreResult<Vec<AuditLogEntry>>;
}

/// SQLite-backed audit trail.
pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn append_entry(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        let old_values = encode_snapshot(&entry.old_values)?;
        let new_values = encode_snapshot(&entry.new_values)?;

        self.conn.execute(
            "INSERT INTO audit_logs (
                id,
                organization_id,
                entity_type,
                entity_id,
                action,
                memo,
                old_values,
                new_values,
                actor_id,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                entry.id.to_string(),
                entry.organization_id.as_str(),
                entry.entity_type.as_str(),
                entry.entity_id.to_string(),
                entry.action.as_str(),
                entry.memo.as_deref(),
                old_values,
                new_values,
                entry.actor_id.as_str(),
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_entries(
        &self,
        entity_type: &str,
        entity_id: PackageId,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                organization_id,
                entity_type,
                entity_id,
                action,
                memo,
                old_values,
                new_values,
                actor_id,
                created_at
             FROM audit_logs
             WHERE entity_type = ?1
               AND entity_id = ?2
             ORDER BY created_at DESC, seq DESC;",
        )?;
        let mut rows = stmt.query(params![entity_type, entity_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_entry_row(row: &Row<'_>) -> StoreResult<AuditLogEntry> {
    let old_values: String = row.get("old_values")?;
    let new_values: String = row.get("new_values")?;

    Ok(AuditLogEntry {
        id: parse_uuid(row, "id")?,
        organization_id: row.get("organization_id")?,
        entity_type: row.get("entity_type")?,
        entity_id: parse_uuid(row, "entity_id")?,
        action: row.get("action")?,
        memo: row.get("memo")?,
        old_values: decode_snapshot(&old_values, "old_values")?,
        new_values: decode_snapshot(&new_values, "new_values")?,
        actor_id: row.get("actor_id")?,
        created_at: row.get("created_at")?,
    })
}

fn encode_snapshot(snapshot: &AuditSnapshot) -> StoreResult<String> {
    serde_json::to_string(snapshot)
        .map_err(|err| StoreError::InvalidData(format!("unencodable audit snapshot: {err}")))
}

fn decode_snapshot(raw: &str, column: &str) -> StoreResult<AuditSnapshot> {
    serde_json::from_str(raw).map_err(|err| {
        StoreError::InvalidData(format!("invalid JSON object in audit_logs.{column}: {err}"))
    })
}
