//! Transition guard for guarded package operations.
//!
//! # Responsibility
//! - Decide, without storage access, whether an action is legal from the
//!   current status and which status it leads to.
//!
//! # Invariants
//! - `Flag` has no precondition.
//! - `Cancel` is rejected only from `Delivered`.
//! - Every other guarded action is rejected from terminal states.
//! - Administrative status overrides never pass through this module.

use crate::model::package::PackageStatus;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Guarded workflow action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
    Approve,
    Flag,
    Cancel,
    AssignStorage,
    CompleteReceipt,
    Transfer,
    PrepareDelivery,
    StartDelivery,
    CompleteDelivery,
    /// `reschedule` sends the package back to `ReadyForDelivery`.
    FailDelivery { reschedule: bool },
    InitiateReturn,
    ShipReturn,
    ReceiveReturn,
    ProcessReturn,
}

impl WorkflowAction {
    /// Stable action name written to audit entries and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Flag => "flag",
            Self::Cancel => "cancel",
            Self::AssignStorage => "assign_storage",
            Self::CompleteReceipt => "complete_receipt",
            Self::Transfer => "transfer",
            Self::PrepareDelivery => "prepare_delivery",
            Self::StartDelivery => "start_delivery",
            Self::CompleteDelivery => "complete_delivery",
            Self::FailDelivery { .. } => "fail_delivery",
            Self::InitiateReturn => "initiate_return",
            Self::ShipReturn => "ship_return",
            Self::ReceiveReturn => "receive_return",
            Self::ProcessReturn => "process_return",
        }
    }

    /// Status the package ends in when the action succeeds.
    pub fn target_status(self) -> PackageStatus {
        match self {
            Self::Approve | Self::CompleteReceipt => PackageStatus::Available,
            Self::Flag => PackageStatus::Flagged,
            Self::Cancel => PackageStatus::Cancelled,
            Self::AssignStorage => PackageStatus::InStorage,
            Self::Transfer => PackageStatus::Transferred,
            Self::PrepareDelivery => PackageStatus::ReadyForDelivery,
            Self::StartDelivery => PackageStatus::OutForDelivery,
            Self::CompleteDelivery => PackageStatus::Delivered,
            Self::FailDelivery { reschedule: true } => PackageStatus::ReadyForDelivery,
            Self::FailDelivery { reschedule: false } => PackageStatus::DeliveryFailed,
            Self::InitiateReturn => PackageStatus::ReturnRequested,
            Self::ShipReturn => PackageStatus::ReturnInTransit,
            Self::ReceiveReturn => PackageStatus::ReturnReceived,
            Self::ProcessReturn => PackageStatus::ReturnProcessed,
        }
    }

    /// Returns whether the action may run from `from`.
    pub fn allows(self, from: PackageStatus) -> bool {
        use PackageStatus as S;

        match self {
            Self::Flag => true,
            Self::Cancel => from != S::Delivered,
            Self::Approve => matches!(from, S::Received | S::Unassigned | S::Pending),
            Self::AssignStorage | Self::CompleteReceipt | Self::Transfer => !from.is_terminal(),
            Self::PrepareDelivery => matches!(
                from,
                S::Received | S::Available | S::InStorage | S::Unassigned | S::Transferred
            ),
            Self::StartDelivery => from == S::ReadyForDelivery,
            Self::CompleteDelivery | Self::FailDelivery { .. } => from == S::OutForDelivery,
            Self::InitiateReturn => !from.is_terminal() && !from.is_return(),
            Self::ShipReturn => from == S::ReturnRequested,
            Self::ReceiveReturn => from == S::ReturnInTransit,
            Self::ProcessReturn => matches!(
                from,
                S::ReturnRequested | S::ReturnInTransit | S::ReturnReceived
            ),
        }
    }

    /// Source statuses from which the action is legal.
    pub fn allowed_sources(self) -> Vec<PackageStatus> {
        PackageStatus::ALL
            .into_iter()
            .filter(|status| self.allows(*status))
            .collect()
    }
}

impl Display for WorkflowAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action attempted from a disallowed source status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub action: WorkflowAction,
    pub from: PackageStatus,
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot {} a package in status `{}`",
            self.action, self.from
        )
    }
}

impl Error for TransitionError {}

/// Validates `action` from `from` and returns the resulting status.
pub fn check_transition(
    action: WorkflowAction,
    from: PackageStatus,
) -> Result<PackageStatus, TransitionError> {
    if action.allows(from) {
        Ok(action.target_status())
    } else {
        Err(TransitionError { action, from })
    }
}
