//! Batch execution of one workflow action over many packages.
//!
//! # Responsibility
//! - Apply a `BulkAction` to each id through `PackageWorkflow`.
//! - Isolate item failures (errors and panics) so the batch always finishes.
//!
//! # Invariants
//! - `results[i]` describes `ids[i]`.
//! - `succeeded + failed == total == ids.len()`.
//! - Items not started when cancellation is observed fail with `cancelled`.

use crate::config::BulkConfig;
use crate::dispatch::JobDispatcher;
use crate::model::package::{Package, PackageId};
use crate::repo::store::WorkflowStore;
use crate::service::error::{WorkflowError, WorkflowResult};
use crate::service::package_workflow::{
    ActorContext, ApproveRequest, AssignStorageRequest, CancelRequest, FlagRequest,
    InitiateReturnRequest, PackageWorkflow, StatusOverrideRequest, TransferRequest,
};
use log::{info, warn};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

/// Error message recorded for items skipped after cancellation.
pub const CANCELLED_ERROR: &str = "cancelled";

/// Action applied to every id of a batch, with its shared parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    Approve(ApproveRequest),
    Flag(FlagRequest),
    Cancel(CancelRequest),
    AssignStorage(AssignStorageRequest),
    Transfer(TransferRequest),
    /// Administrative override, unguarded like its single-item form.
    UpdateStatus(StatusOverrideRequest),
    InitiateReturn(InitiateReturnRequest),
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve(_) => "approve",
            Self::Flag(_) => "flag",
            Self::Cancel(_) => "cancel",
            Self::AssignStorage(_) => "assign_storage",
            Self::Transfer(_) => "transfer",
            Self::UpdateStatus(_) => "status_override",
            Self::InitiateReturn(_) => "initiate_return",
        }
    }

    fn apply<S: WorkflowStore, D: JobDispatcher>(
        &self,
        workflow: &PackageWorkflow<S, D>,
        ctx: &ActorContext,
        id: PackageId,
    ) -> WorkflowResult<Package> {
        match self {
            Self::Approve(request) => workflow.approve(ctx, id, request.clone()),
            Self::Flag(request) => workflow.flag(ctx, id, request.clone()),
            Self::Cancel(request) => workflow.cancel(ctx, id, request.clone()),
            Self::AssignStorage(request) => workflow.assign_storage(ctx, id, request.clone()),
            Self::Transfer(request) => workflow.transfer(ctx, id, request.clone()),
            Self::UpdateStatus(request) => workflow.override_status(ctx, id, request.clone()),
            Self::InitiateReturn(request) => workflow.initiate_return(ctx, id, request.clone()),
        }
    }
}

/// Outcome of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemResult {
    pub id: PackageId,
    pub success: bool,
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn succeeded(id: PackageId) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    pub fn failed(id: PackageId, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Coarse classification of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    Empty,
    AllSucceeded,
    AllFailed,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOperationResult {
    /// `true` when no item failed.
    pub success: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkOperationResult {
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let succeeded = results.iter().filter(|item| item.success).count();
        let failed = results.len() - succeeded;
        Self {
            success: failed == 0,
            total: results.len(),
            succeeded,
            failed,
            results,
        }
    }

    pub fn outcome(&self) -> BulkOutcome {
        match (self.succeeded, self.failed) {
            (0, 0) => BulkOutcome::Empty,
            (_, 0) => BulkOutcome::AllSucceeded,
            (0, _) => BulkOutcome::AllFailed,
            _ => BulkOutcome::Mixed,
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-item job handed to an executor. Must not panic; see `run_isolated`.
pub type ItemJob<'a> = dyn Fn(PackageId) -> BulkItemResult + Sync + 'a;

/// Strategy for running the items of a batch.
pub trait BulkExecutor: Send + Sync {
    /// Runs `job` for each id and returns results in input order.
    fn execute(
        &self,
        ids: &[PackageId],
        cancel: Option<&CancellationToken>,
        job: &ItemJob<'_>,
    ) -> Vec<BulkItemResult>;
}

/// Runs items one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl BulkExecutor for SequentialExecutor {
    fn execute(
        &self,
        ids: &[PackageId],
        cancel: Option<&CancellationToken>,
        job: &ItemJob<'_>,
    ) -> Vec<BulkItemResult> {
        ids.iter()
            .map(|&id| {
                if is_cancelled(cancel) {
                    BulkItemResult::failed(id, CANCELLED_ERROR)
                } else {
                    job(id)
                }
            })
            .collect()
    }
}

/// Runs items on up to `max_workers` scoped threads pulling from a shared
/// cursor.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolExecutor {
    pub max_workers: usize,
}

impl WorkerPoolExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }
}

impl BulkExecutor for WorkerPoolExecutor {
    fn execute(
        &self,
        ids: &[PackageId],
        cancel: Option<&CancellationToken>,
        job: &ItemJob<'_>,
    ) -> Vec<BulkItemResult> {
        let workers = self.max_workers.max(1).min(ids.len());
        if workers <= 1 {
            return SequentialExecutor.execute(ids, cancel, job);
        }

        let cursor = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<BulkItemResult>>> =
            ids.iter().map(|_| Mutex::new(None)).collect();

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(&id) = ids.get(index) else {
                        break;
                    };
                    let result = if is_cancelled(cancel) {
                        BulkItemResult::failed(id, CANCELLED_ERROR)
                    } else {
                        job(id)
                    };
                    *slots[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
                });
            }
        });

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, &id)| {
                slot.into_inner()
                    .unwrap_or_else(PoisonError::into_inner)
                    .unwrap_or_else(|| BulkItemResult::failed(id, "item was not executed"))
            })
            .collect()
    }
}

/// Picks the executor described by `config`.
pub fn executor_for(config: &BulkConfig) -> Box<dyn BulkExecutor> {
    if config.max_workers > 1 {
        Box::new(WorkerPoolExecutor::new(config.max_workers))
    } else {
        Box::new(SequentialExecutor)
    }
}

/// Runs `item`, converting both `Err` and panics into a failed result.
pub fn run_isolated<T>(
    id: PackageId,
    item: impl FnOnce() -> WorkflowResult<T>,
) -> BulkItemResult {
    match catch_unwind(AssertUnwindSafe(item)) {
        Ok(Ok(_)) => BulkItemResult::succeeded(id),
        Ok(Err(err)) => BulkItemResult::failed(id, err.to_string()),
        Err(payload) => BulkItemResult::failed(id, panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("item panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("item panicked: {message}")
    } else {
        "item panicked".to_string()
    }
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(CancellationToken::is_cancelled)
}

/// Applies one action to many packages through a workflow.
pub struct BulkCoordinator<'w, S: WorkflowStore, D: JobDispatcher> {
    workflow: &'w PackageWorkflow<S, D>,
    executor: Box<dyn BulkExecutor>,
    max_items: Option<usize>,
}

impl<'w, S, D> BulkCoordinator<'w, S, D>
where
    S: WorkflowStore + Sync,
    D: JobDispatcher + Sync,
{
    /// Uses the executor and item cap from the workflow's `BulkConfig`.
    pub fn new(workflow: &'w PackageWorkflow<S, D>) -> Self {
        let bulk = &workflow.config().bulk;
        Self {
            workflow,
            executor: executor_for(bulk),
            max_items: bulk.max_items,
        }
    }

    pub fn with_executor(mut self, executor: impl BulkExecutor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    pub fn execute(
        &self,
        ctx: &ActorContext,
        ids: &[PackageId],
        action: &BulkAction,
    ) -> WorkflowResult<BulkOperationResult> {
        self.execute_with_cancel(ctx, ids, action, None)
    }

    pub fn execute_with_cancel(
        &self,
        ctx: &ActorContext,
        ids: &[PackageId],
        action: &BulkAction,
        cancel: Option<&CancellationToken>,
    ) -> WorkflowResult<BulkOperationResult> {
        if let Some(max_items) = self.max_items {
            if ids.len() > max_items {
                warn!(
                    "event=bulk_operation module=service status=error action={} error_code=validation total={} max_items={}",
                    action.as_str(),
                    ids.len(),
                    max_items
                );
                return Err(WorkflowError::Validation(format!(
                    "batch of {} items exceeds the limit of {max_items}",
                    ids.len()
                )));
            }
        }

        let started_at = Instant::now();
        let workflow = self.workflow;
        let job = |id: PackageId| run_isolated(id, || action.apply(workflow, ctx, id));
        let result = BulkOperationResult::from_results(self.executor.execute(ids, cancel, &job));

        info!(
            "event=bulk_operation module=service status={} action={} total={} succeeded={} failed={} duration_ms={}",
            if result.success { "ok" } else { "partial" },
            action.as_str(),
            result.total,
            result.succeeded,
            result.failed,
            started_at.elapsed().as_millis()
        );
        Ok(result)
    }
}
