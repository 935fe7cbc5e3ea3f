//! Package repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/lookup/list/count APIs over `packages`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Package::validate()` before SQL mutations.
//! - Updates are conditional on the caller's expected `version`.
//! - Read paths reject invalid persisted state instead of masking it.
//! - List order is `created_at DESC, id ASC`.

use crate::db::DbError;
use crate::model::location::Location;
use crate::model::package::{Dimensions, Package, PackageId, PackageStatus, PackageValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PACKAGE_SELECT_SQL: &str = "SELECT
    id,
    organization_id,
    warehouse_id,
    sender_name,
    recipient_name,
    recipient_id,
    recipient_contact,
    tracking_number,
    invoice_number,
    purchase_order_number,
    memo,
    length_cm,
    width_cm,
    height_cm,
    weight_kg,
    expected_delivery_at,
    signature_required,
    zone,
    isle,
    shelf,
    bin,
    status,
    is_deleted,
    created_by,
    created_at,
    updated_by,
    updated_at,
    version
FROM packages";

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence error shared by every repository in this crate.
#[derive(Debug)]
pub enum StoreError {
    Validation(PackageValidationError),
    Db(DbError),
    NotFound(PackageId),
    /// Row exists but its `version` moved since it was read.
    Conflict {
        id: PackageId,
        expected_version: i64,
    },
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "package not found: {id}"),
            Self::Conflict {
                id,
                expected_version,
            } => write!(
                f,
                "package {id} was modified concurrently (expected version {expected_version})"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::Conflict { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<PackageValidationError> for StoreError {
    fn from(value: PackageValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Shared filter for list, board and statistics queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    pub organization_id: Option<String>,
    pub warehouse_id: Option<String>,
    /// Inclusive lower bound on `created_at` (epoch ms).
    pub created_from: Option<i64>,
    /// Exclusive upper bound on `created_at` (epoch ms).
    pub created_to: Option<i64>,
    /// Case-insensitive substring over sender, recipient, tracking and
    /// invoice numbers.
    pub search: Option<String>,
}

impl PackageFilter {
    /// Copy of this filter restricted to `[from, to)`.
    pub fn with_created_range(&self, from: i64, to: i64) -> Self {
        Self {
            created_from: Some(from),
            created_to: Some(to),
            ..self.clone()
        }
    }
}

/// Query options for listing packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageListQuery {
    pub filter: PackageFilter,
    pub status: Option<PackageStatus>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for package persistence.
pub trait PackageRepository {
    fn insert_package(&self, package: &Package) -> StoreResult<PackageId>;
    /// Writes `package` when the stored version equals `expected_version`,
    /// then bumps the stored version by one.
    fn update_package(&self, package: &Package, expected_version: i64) -> StoreResult<()>;
    fn get_package(&self, id: PackageId, include_deleted: bool) -> StoreResult<Option<Package>>;
    fn list_packages(&self, query: &PackageListQuery) -> StoreResult<Vec<Package>>;
    fn count_packages(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> StoreResult<u64>;
    fn count_by_status(&self, filter: &PackageFilter) -> StoreResult<BTreeMap<PackageStatus, u64>>;
}

/// SQLite-backed package repository.
pub struct SqlitePackageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePackageRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PackageRepository for SqlitePackageRepository<'_> {
    fn insert_package(&self, package: &Package) -> StoreResult<PackageId> {
        package.validate()?;

        self.conn.execute(
            "INSERT INTO packages (
                id,
                organization_id,
                warehouse_id,
                sender_name,
                recipient_name,
                recipient_id,
                recipient_contact,
                tracking_number,
                invoice_number,
                purchase_order_number,
                memo,
                length_cm,
                width_cm,
                height_cm,
                weight_kg,
                expected_delivery_at,
                signature_required,
                zone,
                isle,
                shelf,
                bin,
                status,
                is_deleted,
                created_by,
                created_at,
                updated_by,
                updated_at,
                version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
            );",
            params![
                package.id.to_string(),
                package.organization_id.as_str(),
                package.warehouse_id.as_deref(),
                package.sender_name.as_str(),
                package.recipient_name.as_str(),
                package.recipient_id.as_deref(),
                package.recipient_contact.as_deref(),
                package.tracking_number.as_deref(),
                package.invoice_number.as_deref(),
                package.purchase_order_number.as_deref(),
                package.memo.as_deref(),
                package.dimensions.length_cm,
                package.dimensions.width_cm,
                package.dimensions.height_cm,
                package.dimensions.weight_kg,
                package.expected_delivery_at,
                bool_to_int(package.signature_required),
                package.location.zone.as_deref(),
                package.location.isle.as_deref(),
                package.location.shelf.as_deref(),
                package.location.bin.as_deref(),
                package.status.as_str(),
                bool_to_int(package.is_deleted),
                package.created_by.as_str(),
                package.created_at,
                package.updated_by.as_deref(),
                package.updated_at,
                package.version,
            ],
        )?;

        Ok(package.id)
    }

    fn update_package(&self, package: &Package, expected_version: i64) -> StoreResult<()> {
        package.validate()?;

        let changed = self.conn.execute(
            "UPDATE packages
             SET
                warehouse_id = ?1,
                sender_name = ?2,
                recipient_name = ?3,
                recipient_id = ?4,
                recipient_contact = ?5,
                tracking_number = ?6,
                invoice_number = ?7,
                purchase_order_number = ?8,
                memo = ?9,
                length_cm = ?10,
                width_cm = ?11,
                height_cm = ?12,
                weight_kg = ?13,
                expected_delivery_at = ?14,
                signature_required = ?15,
                zone = ?16,
                isle = ?17,
                shelf = ?18,
                bin = ?19,
                status = ?20,
                is_deleted = ?21,
                updated_by = ?22,
                updated_at = ?23,
                version = version + 1
             WHERE id = ?24
               AND version = ?25;",
            params![
                package.warehouse_id.as_deref(),
                package.sender_name.as_str(),
                package.recipient_name.as_str(),
                package.recipient_id.as_deref(),
                package.recipient_contact.as_deref(),
                package.tracking_number.as_deref(),
                package.invoice_number.as_deref(),
                package.purchase_order_number.as_deref(),
                package.memo.as_deref(),
                package.dimensions.length_cm,
                package.dimensions.width_cm,
                package.dimensions.height_cm,
                package.dimensions.weight_kg,
                package.expected_delivery_at,
                bool_to_int(package.signature_required),
                package.location.zone.as_deref(),
                package.location.isle.as_deref(),
                package.location.shelf.as_deref(),
                package.location.bin.as_deref(),
                package.status.as_str(),
                bool_to_int(package.is_deleted),
                package.updated_by.as_deref(),
                package.updated_at,
                package.id.to_string(),
                expected_version,
            ],
        )?;

        if changed == 0 {
            let exists: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM packages WHERE id = ?1);",
                [package.id.to_string()],
                |row| row.get(0),
            )?;
            return Err(if exists {
                StoreError::Conflict {
                    id: package.id,
                    expected_version,
                }
            } else {
                StoreError::NotFound(package.id)
            });
        }

        Ok(())
    }

    fn get_package(&self, id: PackageId, include_deleted: bool) -> StoreResult<Option<Package>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PACKAGE_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_package_row(row)?));
        }

        Ok(None)
    }

    fn list_packages(&self, query: &PackageListQuery) -> StoreResult<Vec<Package>> {
        let mut sql = format!("{PACKAGE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        push_filter_clauses(&mut sql, &mut bind_values, &query.filter);

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut packages = Vec::new();

        while let Some(row) = rows.next()? {
            packages.push(parse_package_row(row)?);
        }

        Ok(packages)
    }

    fn count_packages(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> StoreResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM packages WHERE is_deleted = 0");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        push_filter_clauses(&mut sql, &mut bind_values, filter);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative package count `{count}`")))
    }

    fn count_by_status(&self, filter: &PackageFilter) -> StoreResult<BTreeMap<PackageStatus, u64>> {
        let mut sql = String::from("SELECT status, COUNT(*) FROM packages WHERE is_deleted = 0");
        let mut bind_values: Vec<Value> = Vec::new();
        push_filter_clauses(&mut sql, &mut bind_values, filter);
        sql.push_str(" GROUP BY status");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut counts = BTreeMap::new();

        while let Some(row) = rows.next()? {
            let status_text: String = row.get(0)?;
            let status = parse_status(&status_text)?;
            let count: i64 = row.get(1)?;
            counts.insert(status, u64::try_from(count).unwrap_or(0));
        }

        Ok(counts)
    }
}

/// Appends `AND ...` clauses for `filter` to a query that already has a
/// `WHERE` clause.
fn push_filter_clauses(sql: &mut String, bind_values: &mut Vec<Value>, filter: &PackageFilter) {
    if let Some(organization_id) = non_blank(filter.organization_id.as_deref()) {
        sql.push_str(" AND organization_id = ?");
        bind_values.push(Value::Text(organization_id.to_string()));
    }
    if let Some(warehouse_id) = non_blank(filter.warehouse_id.as_deref()) {
        sql.push_str(" AND warehouse_id = ?");
        bind_values.push(Value::Text(warehouse_id.to_string()));
    }
    if let Some(from) = filter.created_from {
        sql.push_str(" AND created_at >= ?");
        bind_values.push(Value::Integer(from));
    }
    if let Some(to) = filter.created_to {
        sql.push_str(" AND created_at < ?");
        bind_values.push(Value::Integer(to));
    }
    if let Some(search) = non_blank(filter.search.as_deref()) {
        let pattern = like_pattern(search);
        sql.push_str(
            " AND (
                LOWER(sender_name) LIKE ? ESCAPE '\\'
                OR LOWER(recipient_name) LIKE ? ESCAPE '\\'
                OR LOWER(COALESCE(tracking_number, '')) LIKE ? ESCAPE '\\'
                OR LOWER(COALESCE(invoice_number, '')) LIKE ? ESCAPE '\\'
            )",
        );
        for _ in 0..4 {
            bind_values.push(Value::Text(pattern.clone()));
        }
    }
}

/// SQLite `LOWER` folds ASCII only, so the pattern is folded the same way.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.trim().to_ascii_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_package_row(row: &Row<'_>) -> StoreResult<Package> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in packages.id"))
    })?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text)?;

    let package = Package {
        id,
        organization_id: row.get("organization_id")?,
        warehouse_id: row.get("warehouse_id")?,
        sender_name: row.get("sender_name")?,
        recipient_name: row.get("recipient_name")?,
        recipient_id: row.get("recipient_id")?,
        recipient_contact: row.get("recipient_contact")?,
        tracking_number: row.get("tracking_number")?,
        invoice_number: row.get("invoice_number")?,
        purchase_order_number: row.get("purchase_order_number")?,
        memo: row.get("memo")?,
        dimensions: Dimensions {
            length_cm: row.get("length_cm")?,
            width_cm: row.get("width_cm")?,
            height_cm: row.get("height_cm")?,
            weight_kg: row.get("weight_kg")?,
        },
        expected_delivery_at: row.get("expected_delivery_at")?,
        signature_required: int_to_bool(row.get("signature_required")?, "signature_required")?,
        location: Location {
            zone: row.get("zone")?,
            isle: row.get("isle")?,
            shelf: row.get("shelf")?,
            bin: row.get("bin")?,
        },
        status,
        is_deleted: int_to_bool(row.get("is_deleted")?, "is_deleted")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_by: row.get("updated_by")?,
        updated_at: row.get("updated_at")?,
        version: row.get("version")?,
    };
    package.validate()?;
    Ok(package)
}

pub(crate) fn parse_status(value: &str) -> StoreResult<PackageStatus> {
    PackageStatus::ALL
        .into_iter()
        .find(|status| status.as_str() == value)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid package status `{value}`")))
}

fn int_to_bool(value: i64, column: &str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid {column} value `{other}` in packages.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
