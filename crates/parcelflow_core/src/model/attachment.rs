//! Signature attachments captured on receipt and delivery.

use crate::model::package::PackageId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attachment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    ReceiptSignature,
    DeliverySignature,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReceiptSignature => "receipt_signature",
            Self::DeliverySignature => "delivery_signature",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "receipt_signature" => Some(Self::ReceiptSignature),
            "delivery_signature" => Some(Self::DeliverySignature),
            _ => None,
        }
    }
}

/// Append-only attachment row. `data` is opaque (typically a data URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub package_id: PackageId,
    pub kind: AttachmentKind,
    pub data: String,
    pub created_by: String,
    pub created_at: i64,
}

impl Attachment {
    pub fn new(
        package_id: PackageId,
        kind: AttachmentKind,
        data: impl Into<String>,
        created_by: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            package_id,
            kind,
            data: data.into(),
            created_by: created_by.into(),
            created_at,
        }
    }
}
