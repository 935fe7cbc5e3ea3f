//! Workflow use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into single-package, board, batch, statistics
//!   and history APIs.
//! - Keep callers decoupled from SQLite details through `WorkflowStore`.

pub mod activity;
pub mod bulk;
pub mod error;
pub mod kanban;
pub mod package_workflow;
pub mod stats;
