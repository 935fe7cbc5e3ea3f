//! Core domain logic for the parcelflow package workflow engine.
//! This crate is the single source of truth for lifecycle invariants.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{BulkConfig, DispatchConfig, KanbanColumnSpec, KanbanConfig, WorkflowConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use dispatch::{DispatchError, DispatchJob, JobDispatcher, LogDispatcher, RecordingDispatcher};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::location::Location;
pub use model::package::{Package, PackageId, PackageStatus};
pub use model::transition::{check_transition, TransitionError, WorkflowAction};
pub use repo::package_repo::{PackageFilter, PackageListQuery, StoreError, StoreResult};
pub use repo::store::{Durability, SqliteWorkflowStore, WorkflowStore};
pub use service::activity::{ActivityHistory, ActivityItem};
pub use service::bulk::{
    BulkAction, BulkCoordinator, BulkExecutor, BulkOperationResult, CancellationToken,
    SequentialExecutor, WorkerPoolExecutor,
};
pub use service::error::{WorkflowError, WorkflowResult};
pub use service::kanban::{KanbanAggregator, KanbanBoard, KanbanColumn, PackageSummary};
pub use service::package_workflow::{ActorContext, PackageWorkflow};
pub use service::stats::{percentage_change, DateRange, StatsAggregator, Trend};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
