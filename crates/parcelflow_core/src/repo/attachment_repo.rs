//! Append-only signature attachments.

use crate::model::attachment::{Attachment, AttachmentKind};
use crate::model::package::PackageId;
use crate::repo::package_repo::{StoreError, StoreResult};
use crate::repo::remark_repo::parse_uuid;
use rusqlite::{params, Connection};

pub trait AttachmentRepository {
    fn append_attachment(&self, attachment: &Attachment) -> StoreResult<()>;
    fn list_attachments(&self, package_id: PackageId) -> StoreResult<Vec<Attachment>>;
}

pub struct SqliteAttachmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttachmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttachmentRepository for SqliteAttachmentRepository<'_> {
    fn append_attachment(&self, attachment: &Attachment) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO package_attachments (id, package_id, kind, data, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                attachment.id.to_string(),
                attachment.package_id.to_string(),
                attachment.kind.as_str(),
                attachment.data.as_str(),
                attachment.created_by.as_str(),
                attachment.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_attachments(&self, package_id: PackageId) -> StoreResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, package_id, kind, data, created_by, created_at
             FROM package_attachments
             WHERE package_id = ?1
             ORDER BY created_at DESC, seq DESC;",
        )?;
        let mut rows = stmt.query([package_id.to_string()])?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            let kind_text: String = row.get("kind")?;
            let kind = AttachmentKind::parse(&kind_text).ok_or_else(|| {
                StoreError::InvalidData(format!("invalid attachment kind `{kind_text}`"))
            })?;
            attachments.push(Attachment {
                id: parse_uuid(row, "id")?,
                package_id: parse_uuid(row, "package_id")?,
                kind,
                data: row.get("data")?,
                created_by: row.get("created_by")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(attachments)
    }
}
