//! Package domain model.
//!
//! # Responsibility
//! - Define the central `Package` record and its closed status vocabulary.
//! - Provide memo/marker helpers used by guarded workflow operations.
//!
//! # Invariants
//! - `status` is always one of `PackageStatus::ALL`.
//! - `id` is stable and never reused for another package.
//! - `memo` markers are appended, never overwritten.
//! - `version` increases by one on every persisted update.

use crate::model::location::Location;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for a package.
pub type PackageId = Uuid;

/// Lifecycle status of a package.
///
/// The set is flat: intake/storage states and the delivery/return sub-flows
/// live on the same entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Pending,
    Received,
    Available,
    InStorage,
    Unassigned,
    Transferred,
    Flagged,
    Cancelled,
    ReadyForDelivery,
    OutForDelivery,
    Delivered,
    DeliveryFailed,
    ReturnRequested,
    ReturnInTransit,
    ReturnReceived,
    ReturnProcessed,
}

impl PackageStatus {
    /// Every known status, in lifecycle order.
    pub const ALL: [PackageStatus; 16] = [
        Self::Pending,
        Self::Received,
        Self::Available,
        Self::InStorage,
        Self::Unassigned,
        Self::Transferred,
        Self::Flagged,
        Self::Cancelled,
        Self::ReadyForDelivery,
        Self::OutForDelivery,
        Self::Delivered,
        Self::DeliveryFailed,
        Self::ReturnRequested,
        Self::ReturnInTransit,
        Self::ReturnReceived,
        Self::ReturnProcessed,
    ];

    /// Stable storage value (`packages.status`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Received => "received",
            Self::Available => "available",
            Self::InStorage => "in_storage",
            Self::Unassigned => "unassigned",
            Self::Transferred => "transferred",
            Self::Flagged => "flagged",
            Self::Cancelled => "cancelled",
            Self::ReadyForDelivery => "ready_for_delivery",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::DeliveryFailed => "delivery_failed",
            Self::ReturnRequested => "return_requested",
            Self::ReturnInTransit => "return_in_transit",
            Self::ReturnReceived => "return_received",
            Self::ReturnProcessed => "return_processed",
        }
    }

    /// Human-readable label used in remarks and board headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Received => "Received",
            Self::Available => "Available",
            Self::InStorage => "In Storage",
            Self::Unassigned => "Unassigned",
            Self::Transferred => "Transferred",
            Self::Flagged => "Flagged",
            Self::Cancelled => "Cancelled",
            Self::ReadyForDelivery => "Ready for Delivery",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::DeliveryFailed => "Delivery Failed",
            Self::ReturnRequested => "Return Requested",
            Self::ReturnInTransit => "Return In Transit",
            Self::ReturnReceived => "Return Received",
            Self::ReturnProcessed => "Return Processed",
        }
    }

    /// Terminal states: no guarded operation moves a package out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Cancelled | Self::ReturnProcessed
        )
    }

    /// Whether the status belongs to the return sub-flow.
    pub fn is_return(self) -> bool {
        matches!(
            self,
            Self::ReturnRequested
                | Self::ReturnInTransit
                | Self::ReturnReceived
                | Self::ReturnProcessed
        )
    }
}

impl Display for PackageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when a status string is outside the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatusError(pub String);

impl Display for UnknownStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown package status `{}`", self.0)
    }
}

impl Error for UnknownStatusError {}

impl FromStr for PackageStatus {
    type Err = UnknownStatusError;

    /// Accepts the storage value, the display label, or the PascalCase name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let folded: String = trimmed
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        Self::ALL
            .into_iter()
            .find(|status| status.as_str().replace('_', "") == folded)
            .ok_or_else(|| UnknownStatusError(trimmed.to_string()))
    }
}

/// Declared physical measurements. All values must be non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

/// Validation failures for package records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageValidationError {
    /// `organization_id` is blank.
    MissingOrganization,
    /// Neither sender nor recipient name is present.
    MissingParties,
    /// A declared dimension or weight is negative or not finite.
    InvalidMeasurement(&'static str),
}

impl Display for PackageValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOrganization => write!(f, "package organization_id must not be blank"),
            Self::MissingParties => {
                write!(f, "package requires a sender name or a recipient name")
            }
            Self::InvalidMeasurement(field) => {
                write!(f, "package {field} must be a finite, non-negative number")
            }
        }
    }
}

impl Error for PackageValidationError {}

/// Canonical package record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub organization_id: String,
    pub warehouse_id: Option<String>,
    pub sender_name: String,
    pub recipient_name: String,
    pub recipient_id: Option<String>,
    pub recipient_contact: Option<String>,
    pub tracking_number: Option<String>,
    pub invoice_number: Option<String>,
    pub purchase_order_number: Option<String>,
    /// Free text; workflow markers such as `[FLAGGED]` are appended here.
    pub memo: Option<String>,
    pub dimensions: Dimensions,
    /// Unix epoch milliseconds.
    pub expected_delivery_at: Option<i64>,
    pub signature_required: bool,
    pub location: Location,
    pub status: PackageStatus,
    pub is_deleted: bool,
    pub created_by: String,
    pub created_at: i64,
    pub updated_by: Option<String>,
    pub updated_at: i64,
    /// Optimistic concurrency counter.
    pub version: i64,
}

impl Package {
    /// Creates a package in `Received` status with a generated id.
    pub fn new(
        organization_id: impl Into<String>,
        created_by: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            warehouse_id: None,
            sender_name: String::new(),
            recipient_name: String::new(),
            recipient_id: None,
            recipient_contact: None,
            tracking_number: None,
            invoice_number: None,
            purchase_order_number: None,
            memo: None,
            dimensions: Dimensions::default(),
            expected_delivery_at: None,
            signature_required: false,
            location: Location::default(),
            status: PackageStatus::Received,
            is_deleted: false,
            created_by: created_by.into(),
            created_at,
            updated_by: None,
            updated_at: created_at,
            version: 0,
        }
    }

    /// Validates record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), PackageValidationError> {
        if self.organization_id.trim().is_empty() {
            return Err(PackageValidationError::MissingOrganization);
        }
        if self.sender_name.trim().is_empty() && self.recipient_name.trim().is_empty() {
            return Err(PackageValidationError::MissingParties);
        }

        let measurements = [
            ("length_cm", self.dimensions.length_cm),
            ("width_cm", self.dimensions.width_cm),
            ("height_cm", self.dimensions.height_cm),
            ("weight_kg", self.dimensions.weight_kg),
        ];
        for (field, value) in measurements {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(PackageValidationError::InvalidMeasurement(field));
                }
            }
        }

        Ok(())
    }

    /// Appends a line to the memo, keeping any prior content.
    pub fn append_memo(&mut self, line: &str) {
        self.memo = Some(match self.memo.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}\n{line}"),
            _ => line.to_string(),
        });
    }

    /// First 8 characters of the id, uppercased.
    pub fn short_transaction_id(&self) -> String {
        self.id.to_string().chars().take(8).collect::<String>().to_uppercase()
    }

    /// Returns whether the package should appear in active views.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Builds a `[TAG] reason: notes` memo marker.
///
/// The `: notes` suffix is omitted when notes are blank.
pub fn memo_marker(tag: &str, reason: &str, notes: Option<&str>) -> String {
    let reason = reason.trim();
    match (reason.is_empty(), notes.map(str::trim).filter(|value| !value.is_empty())) {
        (false, Some(notes)) => format!("[{tag}] {reason}: {notes}"),
        (false, None) => format!("[{tag}] {reason}"),
        (true, Some(notes)) => format!("[{tag}] {notes}"),
        (true, None) => format!("[{tag}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::{memo_marker, Package, PackageStatus, PackageValidationError};

    fn sample() -> Package {
        let mut package = Package::new("org-1", "user-1", 1_000);
        package.sender_name = "Acme".to_string();
        package
    }

    #[test]
    fn status_parses_storage_label_and_pascal_forms() {
        assert_eq!(
            "in_storage".parse::<PackageStatus>().unwrap(),
            PackageStatus::InStorage
        );
        assert_eq!(
            "Out for Delivery".parse::<PackageStatus>().unwrap(),
            PackageStatus::OutForDelivery
        );
        assert_eq!(
            "ReturnProcessed".parse::<PackageStatus>().unwrap(),
            PackageStatus::ReturnProcessed
        );
    }

    #[test]
    fn status_rejects_unknown_values() {
        let err = "Lost".parse::<PackageStatus>().unwrap_err();
        assert!(err.to_string().contains("Lost"));
    }

    #[test]
    fn every_status_roundtrips_through_storage_value() {
        for status in PackageStatus::ALL {
            assert_eq!(status.as_str().parse::<PackageStatus>().unwrap(), status);
        }
    }

    #[test]
    fn terminal_states_are_exactly_three() {
        let terminal: Vec<_> = PackageStatus::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                PackageStatus::Cancelled,
                PackageStatus::Delivered,
                PackageStatus::ReturnProcessed
            ]
        );
    }

    #[test]
    fn append_memo_keeps_previous_lines() {
        let mut package = sample();
        package.memo = Some("fragile".to_string());
        package.append_memo("[FLAGGED] damaged");
        package.append_memo("[FLAGGED] wet");
        assert_eq!(
            package.memo.as_deref(),
            Some("fragile\n[FLAGGED] damaged\n[FLAGGED] wet")
        );
    }

    #[test]
    fn memo_marker_omits_blank_notes() {
        assert_eq!(memo_marker("CANCELLED", "damaged", Some("  ")), "[CANCELLED] damaged");
        assert_eq!(
            memo_marker("FLAGGED", "wrong label", Some("check sender")),
            "[FLAGGED] wrong label: check sender"
        );
        assert_eq!(memo_marker("FLAGGED", " ", Some("wet")), "[FLAGGED] wet");
        assert_eq!(memo_marker("FLAGGED", "", None), "[FLAGGED]");
    }

    #[test]
    fn validate_rejects_missing_parties_and_negative_weight() {
        let mut package = Package::new("org-1", "user-1", 0);
        assert_eq!(
            package.validate(),
            Err(PackageValidationError::MissingParties)
        );

        package.recipient_name = "Bob".to_string();
        package.dimensions.weight_kg = Some(-1.0);
        assert_eq!(
            package.validate(),
            Err(PackageValidationError::InvalidMeasurement("weight_kg"))
        );
    }

    #[test]
    fn short_transaction_id_is_uppercase_prefix() {
        let package = sample();
        let short = package.short_transaction_id();
        assert_eq!(short.len(), 8);
        assert_eq!(short, package.id.to_string()[..8].to_uppercase());
    }
}
