//! Workflow error taxonomy.
//!
//! # Invariants
//! - `NotFound` and `InvalidTransition` reach single-item callers unchanged.
//! - Dispatch failures have no variant here: they are logged and dropped.

use crate::model::package::PackageId;
use crate::model::transition::TransitionError;
use crate::repo::package_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug)]
pub enum WorkflowError {
    /// Package does not exist or is soft-deleted.
    NotFound(PackageId),
    /// Guarded action attempted from a disallowed status.
    InvalidTransition(TransitionError),
    /// Request is malformed.
    Validation(String),
    /// Package changed between read and write.
    Conflict(PackageId),
    Store(StoreError),
}

impl WorkflowError {
    /// Stable short code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store",
        }
    }
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "package not found: {id}"),
            Self::InvalidTransition(err) => write!(f, "invalid transition: {err}"),
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::Conflict(id) => write!(f, "package {id} was modified concurrently"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkflowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTransition(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(value: TransitionError) -> Self {
        Self::InvalidTransition(value)
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict { id, .. } => Self::Conflict(id),
            StoreError::Validation(err) => Self::Validation(err.to_string()),
            other => Self::Store(other),
        }
    }
}
