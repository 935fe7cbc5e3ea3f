//! Remark log: append-only package notes.
//!
//! # Invariants
//! - Rows are only inserted; the schema rejects UPDATE/DELETE.
//! - Listing order is newest first, ties broken by insertion order.

use crate::model::package::PackageId;
use crate::model::remark::Remark;
use crate::repo::package_repo::{parse_status, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Append-only remark storage.
pub trait RemarkRepository {
    fn append_remark(&self, remark: &Remark) -> StoreResult<()>;
    fn list_remarks(&self, package_id: PackageId) -> StoreResult<Vec<Remark>>;
}

/// SQLite-backed remark log.
pub struct SqliteRemarkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRemarkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RemarkRepository for SqliteRemarkRepository<'_> {
    fn append_remark(&self, remark: &Remark) -> StoreResult<()> {
        if remark.message.trim().is_empty() {
            return Err(StoreError::InvalidData(
                "remark message must not be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO package_remarks (
                id,
                package_id,
                message,
                status,
                created_by,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                remark.id.to_string(),
                remark.package_id.to_string(),
                remark.message.as_str(),
                remark.status.map(|status| status.as_str()),
                remark.created_by.as_str(),
                remark.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_remarks(&self, package_id: PackageId) -> StoreResult<Vec<Remark>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, package_id, message, status, created_by, created_at
             FROM package_remarks
             WHERE package_id = ?1
             ORDER BY created_at DESC, seq DESC;",
        )?;
        let mut rows = stmt.query([package_id.to_string()])?;
        let mut remarks = Vec::new();
        while let Some(row) = rows.next()? {
            remarks.push(parse_remark_row(row)?);
        }
        Ok(remarks)
    }
}

fn parse_remark_row(row: &Row<'_>) -> StoreResult<Remark> {
    let status = match row.get::<_, Option<String>>("status")? {
        Some(value) => Some(parse_status(&value)?),
        None => None,
    };

    Ok(Remark {
        id: parse_uuid(row, "id")?,
        package_id: parse_uuid(row, "package_id")?,
        message: row.get("message")?,
        status,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn parse_uuid(row: &Row<'_>, column: &str) -> StoreResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}
