//! Domain model for the package lifecycle engine.
//!
//! # Responsibility
//! - Define the canonical records persisted by the workflow store.
//! - Own pure domain rules (status vocabulary, transition guard, location
//!   parsing) that do not need storage access.
//!
//! # Invariants
//! - Every package is identified by a stable `PackageId`.
//! - Deletion is a soft-delete flag; workflow code never removes rows.
//! - Remarks and audit entries are immutable once written.

pub mod attachment;
pub mod audit;
pub mod location;
pub mod package;
pub mod remark;
pub mod transition;

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in Unix epoch milliseconds.
///
/// Falls back to `0` when the system clock is before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
