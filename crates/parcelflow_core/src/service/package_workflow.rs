//! Single-package lifecycle orchestration.
//!
//! # Responsibility
//! - Run create, guarded transitions, the administrative status override,
//!   manual remarks and soft delete for one package.
//! - Turn each successful operation into one store commit (package update,
//!   remark, audit entry, optional attachment) followed by a best-effort
//!   dispatch.
//!
//! # Invariants
//! - Guarded operations consult `model::transition` before any write.
//! - The package is loaded before request fields are validated, so an
//!   unknown id is always `NotFound`.
//! - A rejected operation writes nothing.
//! - Dispatch failures are logged at `warn` and never change the result.
//! - `override_status` never consults the transition guard.

use crate::config::WorkflowConfig;
use crate::dispatch::{DispatchJob, JobDispatcher};
use crate::model::attachment::{Attachment, AttachmentKind};
use crate::model::audit::AuditLogEntry;
use crate::model::location::Location;
use crate::model::now_epoch_ms;
use crate::model::package::{memo_marker, Dimensions, Package, PackageId, PackageStatus};
use crate::model::remark::Remark;
use crate::model::transition::{check_transition, WorkflowAction};
use crate::repo::package_repo::PackageListQuery;
use crate::repo::store::{TransitionCommit, WorkflowStore};
use crate::service::error::{WorkflowError, WorkflowResult};
use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use std::time::Instant;

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: String,
}

impl ActorContext {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
        }
    }
}

/// Input for `PackageWorkflow::create_package`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePackageRequest {
    pub organization_id: String,
    pub warehouse_id: Option<String>,
    pub sender_name: String,
    pub recipient_name: String,
    pub recipient_id: Option<String>,
    pub recipient_contact: Option<String>,
    pub tracking_number: Option<String>,
    pub invoice_number: Option<String>,
    pub purchase_order_number: Option<String>,
    pub memo: Option<String>,
    pub dimensions: Dimensions,
    pub expected_delivery_at: Option<i64>,
    pub signature_required: bool,
    /// Delimited location string, parsed like `assign_storage`.
    pub location: Option<String>,
    /// Defaults to `Received`.
    pub initial_status: Option<PackageStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproveRequest {
    pub warehouse_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagRequest {
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelRequest {
    pub reason: String,
    pub notes: Option<String>,
    /// Dispatch a cancellation notification when true.
    pub notify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignStorageRequest {
    pub warehouse_id: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteReceiptRequest {
    pub signature: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferRequest {
    pub warehouse_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareDeliveryRequest {
    pub expected_delivery_at: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteDeliveryRequest {
    pub signature: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailDeliveryRequest {
    pub reason: String,
    /// New expected delivery time; `None` ends in `DeliveryFailed`.
    pub reschedule_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitiateReturnRequest {
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReturnRequest {
    pub condition: String,
    pub refund_approved: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOverrideRequest {
    pub status: PackageStatus,
    pub notes: Option<String>,
}

/// Operation-specific parts of one commit, produced by each operation.
#[derive(Debug, Default)]
struct CommitPlan {
    remark: String,
    audit_memo: Option<String>,
    audit_extra: Map<String, Value>,
    attachment: Option<(AttachmentKind, String)>,
    job_name: Option<&'static str>,
}

impl CommitPlan {
    fn new(remark: impl Into<String>) -> Self {
        Self {
            remark: remark.into(),
            ..Self::default()
        }
    }

    fn notify(mut self, job_name: &'static str) -> Self {
        self.job_name = Some(job_name);
        self
    }

    fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.audit_extra.insert(key.to_string(), value.into());
        self
    }

    fn memo(mut self, memo: impl Into<String>) -> Self {
        self.audit_memo = Some(memo.into());
        self
    }
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Orchestrates one package's lifecycle operations.
pub struct PackageWorkflow<S: WorkflowStore, D: JobDispatcher> {
    store: S,
    dispatcher: D,
    config: WorkflowConfig,
    clock: Clock,
}

impl<S: WorkflowStore, D: JobDispatcher> PackageWorkflow<S, D> {
    pub fn new(store: S, dispatcher: D, config: WorkflowConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
            clock: Box::new(now_epoch_ms),
        }
    }

    /// Replaces the wall clock used for `created_at`/`updated_at` stamps.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Creates a package in `Received` (or the requested initial status).
    pub fn create_package(
        &self,
        ctx: &ActorContext,
        request: CreatePackageRequest,
    ) -> WorkflowResult<Package> {
        let started_at = Instant::now();
        let now = (self.clock)();
        let location = parse_location(request.location.as_deref().unwrap_or(""))?;

        let mut package = Package::new(request.organization_id, ctx.actor_id.as_str(), now);
        package.warehouse_id = non_blank(request.warehouse_id);
        package.sender_name = request.sender_name.trim().to_string();
        package.recipient_name = request.recipient_name.trim().to_string();
        package.recipient_id = non_blank(request.recipient_id);
        package.recipient_contact = non_blank(request.recipient_contact);
        package.tracking_number = non_blank(request.tracking_number);
        package.invoice_number = non_blank(request.invoice_number);
        package.purchase_order_number = non_blank(request.purchase_order_number);
        package.memo = non_blank(request.memo);
        package.dimensions = request.dimensions;
        package.expected_delivery_at = request.expected_delivery_at;
        package.signature_required = request.signature_required;
        package.location = location;
        package.status = request.initial_status.unwrap_or(PackageStatus::Received);
        package
            .validate()
            .map_err(|err| WorkflowError::Validation(err.to_string()))?;

        let remark = Remark::new(
            package.id,
            format!("Package created with status {}", package.status),
            Some(package.status),
            ctx.actor_id.as_str(),
            now,
        );
        let mut audit = AuditLogEntry::for_package(&package, "create", ctx.actor_id.as_str(), now);
        audit.new_values = package_snapshot(&package);

        if let Err(err) = self.store.create_package(&package, &remark, &audit) {
            let err = WorkflowError::from(err);
            log_failure("create", package.id, &err, started_at);
            return Err(err);
        }

        info!(
            "event=package_workflow module=service status=ok action=create package_id={} new_status={} duration_ms={}",
            package.id,
            package.status.as_str(),
            started_at.elapsed().as_millis()
        );
        self.dispatch_best_effort("package.created", "create", None, &package, ctx, &Map::new());
        Ok(package)
    }

    /// Moves an intake package to `Available`, optionally placing it.
    pub fn approve(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: ApproveRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::Approve, |package| {
            if let Some(raw) = non_blank(request.location.clone()) {
                package.location = parse_location(&raw)?;
            }
            if let Some(warehouse_id) = non_blank(request.warehouse_id.clone()) {
                package.warehouse_id = Some(warehouse_id);
            }
            let remark = with_notes(
                format!("Package approved at {}", package.location),
                request.notes.as_deref(),
            );
            Ok(CommitPlan::new(remark).notify("package.approved"))
        })
    }

    /// Flags a package from any status. Each call appends its own marker.
    pub fn flag(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: FlagRequest,
    ) -> WorkflowResult<Package> {
        let reason = request.reason.trim().to_string();

        self.run_guarded(ctx, id, WorkflowAction::Flag, |package| {
            let marker = memo_marker("FLAGGED", &reason, request.notes.as_deref());
            package.append_memo(&marker);
            let headline = if reason.is_empty() {
                "Package flagged".to_string()
            } else {
                format!("Package flagged: {reason}")
            };
            let remark = with_notes(headline, request.notes.as_deref());
            Ok(CommitPlan::new(remark)
                .memo(marker)
                .extra("reason", reason.as_str())
                .notify("package.flagged"))
        })
    }

    /// Cancels a package unless it was already delivered.
    pub fn cancel(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: CancelRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::Cancel, |package| {
            let reason = required("reason", &request.reason)?;
            let marker = memo_marker("CANCELLED", &reason, request.notes.as_deref());
            package.append_memo(&marker);
            let remark = with_notes(
                format!("Package cancelled: {reason}"),
                request.notes.as_deref(),
            );
            let plan = CommitPlan::new(remark)
                .memo(marker)
                .extra("reason", reason.as_str())
                .extra("notify", request.notify);
            Ok(if request.notify {
                plan.notify("package.cancelled")
            } else {
                plan
            })
        })
    }

    /// Places a package at a parsed warehouse location.
    pub fn assign_storage(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: AssignStorageRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::AssignStorage, |package| {
            let warehouse_id = required("warehouse_id", &request.warehouse_id)?;
            let location = parse_location(&request.location)?;
            if location.is_empty() {
                return Err(WorkflowError::Validation(
                    "location must not be blank".to_string(),
                ));
            }
            package.warehouse_id = Some(warehouse_id.clone());
            package.location = location;
            Ok(CommitPlan::new(format!(
                "Package stored at {} in warehouse {}",
                package.location, warehouse_id
            ))
            .notify("package.stored"))
        })
    }

    /// Completes intake, capturing the receipt signature when given.
    pub fn complete_receipt(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: CompleteReceiptRequest,
    ) -> WorkflowResult<Package> {
        let signature = non_blank(request.signature);

        self.run_guarded(ctx, id, WorkflowAction::CompleteReceipt, |_package| {
            let mut remark = String::from("Package receipt completed");
            if signature.is_some() {
                remark.push_str(" with signature");
            }
            let mut plan = CommitPlan::new(with_notes(remark, request.notes.as_deref()))
                .extra("signature_captured", signature.is_some())
                .notify("package.received");
            plan.attachment = signature.map(|data| (AttachmentKind::ReceiptSignature, data));
            Ok(plan)
        })
    }

    /// Moves a package to another warehouse; its old location is cleared.
    pub fn transfer(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: TransferRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::Transfer, |package| {
            let warehouse_id = required("warehouse_id", &request.warehouse_id)?;
            package.warehouse_id = Some(warehouse_id.clone());
            package.location = Location::default();
            Ok(CommitPlan::new(with_notes(
                format!("Package transferred to warehouse {warehouse_id}"),
                request.notes.as_deref(),
            ))
            .notify("package.transferred"))
        })
    }

    pub fn prepare_delivery(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: PrepareDeliveryRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::PrepareDelivery, |package| {
            if let Some(expected) = request.expected_delivery_at {
                package.expected_delivery_at = Some(expected);
            }
            Ok(CommitPlan::new(with_notes(
                "Package ready for delivery".to_string(),
                request.notes.as_deref(),
            ))
            .notify("delivery.ready"))
        })
    }

    pub fn start_delivery(&self, ctx: &ActorContext, id: PackageId) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::StartDelivery, |_package| {
            Ok(CommitPlan::new("Package out for delivery").notify("delivery.started"))
        })
    }

    pub fn complete_delivery(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: CompleteDeliveryRequest,
    ) -> WorkflowResult<Package> {
        let signature = non_blank(request.signature);

        self.run_guarded(ctx, id, WorkflowAction::CompleteDelivery, |package| {
            if package.signature_required && signature.is_none() {
                return Err(WorkflowError::Validation(
                    "signature is required to complete this delivery".to_string(),
                ));
            }
            let mut plan = CommitPlan::new(with_notes(
                "Package delivered".to_string(),
                request.notes.as_deref(),
            ))
            .extra("signature_captured", signature.is_some())
            .notify("delivery.completed");
            plan.attachment = signature.map(|data| (AttachmentKind::DeliverySignature, data));
            Ok(plan)
        })
    }

    /// Records a failed attempt; rescheduling returns the package to the
    /// ready queue with a new expected date.
    pub fn fail_delivery(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: FailDeliveryRequest,
    ) -> WorkflowResult<Package> {
        let action = WorkflowAction::FailDelivery {
            reschedule: request.reschedule_at.is_some(),
        };

        self.run_guarded(ctx, id, action, |package| {
            let reason = required("reason", &request.reason)?;
            let plan = match request.reschedule_at {
                Some(reschedule_at) => {
                    package.expected_delivery_at = Some(reschedule_at);
                    CommitPlan::new(format!("Delivery failed: {reason}; rescheduled"))
                        .extra("rescheduled", true)
                }
                None => CommitPlan::new(format!("Delivery failed: {reason}"))
                    .extra("rescheduled", false),
            };
            Ok(plan.extra("reason", reason.as_str()).notify("delivery.failed"))
        })
    }

    pub fn initiate_return(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: InitiateReturnRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::InitiateReturn, |_package| {
            let reason = required("reason", &request.reason)?;
            Ok(CommitPlan::new(with_notes(
                format!("Return requested: {reason}"),
                request.notes.as_deref(),
            ))
            .extra("reason", reason.as_str())
            .notify("return.requested"))
        })
    }

    pub fn ship_return(&self, ctx: &ActorContext, id: PackageId) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::ShipReturn, |_package| {
            Ok(CommitPlan::new("Return shipped to sender").notify("return.in_transit"))
        })
    }

    pub fn receive_return(&self, ctx: &ActorContext, id: PackageId) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::ReceiveReturn, |_package| {
            Ok(CommitPlan::new("Returned package received").notify("return.received"))
        })
    }

    /// Closes a return, recording condition and refund decision.
    pub fn process_return(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: ProcessReturnRequest,
    ) -> WorkflowResult<Package> {
        self.run_guarded(ctx, id, WorkflowAction::ProcessReturn, |_package| {
            let condition = required("condition", &request.condition)?;
            let refund = if request.refund_approved {
                "approved"
            } else {
                "declined"
            };
            Ok(CommitPlan::new(with_notes(
                format!("Return processed: condition {condition}, refund {refund}"),
                request.notes.as_deref(),
            ))
            .extra("condition", condition.as_str())
            .extra("refund_approved", request.refund_approved)
            .notify("return.processed"))
        })
    }

    /// Administrative override: sets any status without consulting the
    /// transition guard. The audit entry always records old and new status.
    pub fn override_status(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        request: StatusOverrideRequest,
    ) -> WorkflowResult<Package> {
        let action = "status_override";
        let started_at = log_start(action, id);
        let result = self.load(id).and_then(|before| {
            let mut after = before.clone();
            after.status = request.status;
            let plan = CommitPlan::new(with_notes(
                format!(
                    "Status changed from {} to {} by override",
                    before.status, after.status
                ),
                request.notes.as_deref(),
            ))
            .extra("override", true)
            .notify("package.status_changed");
            self.commit(ctx, action, before, after, plan)
        });
        self.finish(action, id, result, started_at)
    }

    /// Soft-deletes a package; the row and its history are kept.
    pub fn soft_delete(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        reason: Option<String>,
    ) -> WorkflowResult<Package> {
        let action = "delete";
        let started_at = log_start(action, id);
        let result = self.load(id).and_then(|before| {
            let mut after = before.clone();
            after.is_deleted = true;
            let mut plan = CommitPlan::new(with_notes(
                "Package deleted".to_string(),
                reason.as_deref(),
            ))
            .extra("is_deleted", true);
            if let Some(reason) = non_blank(reason.clone()) {
                plan = plan.memo(reason);
            }
            self.commit(ctx, action, before, after, plan)
        });
        self.finish(action, id, result, started_at)
    }

    /// Appends a manual remark stamped with the current status.
    pub fn add_remark(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        message: &str,
    ) -> WorkflowResult<Remark> {
        let package = self.load(id)?;
        let message = required("message", message)?;
        let remark = Remark::new(
            package.id,
            message,
            Some(package.status),
            ctx.actor_id.as_str(),
            (self.clock)(),
        );
        self.store.append_remark(&remark)?;
        info!(
            "event=package_remark module=service status=ok package_id={} remark_id={}",
            package.id, remark.id
        );
        Ok(remark)
    }

    /// Active package by id.
    pub fn get_package(&self, id: PackageId) -> WorkflowResult<Package> {
        self.load(id)
    }

    pub fn list_packages(&self, query: &PackageListQuery) -> WorkflowResult<Vec<Package>> {
        Ok(self.store.list_packages(query)?)
    }

    pub fn list_attachments(&self, id: PackageId) -> WorkflowResult<Vec<Attachment>> {
        self.load(id)?;
        Ok(self.store.list_attachments(id)?)
    }

    fn load(&self, id: PackageId) -> WorkflowResult<Package> {
        self.store
            .get_package(id)?
            .filter(Package::is_active)
            .ok_or(WorkflowError::NotFound(id))
    }

    fn run_guarded(
        &self,
        ctx: &ActorContext,
        id: PackageId,
        action: WorkflowAction,
        apply: impl FnOnce(&mut Package) -> WorkflowResult<CommitPlan>,
    ) -> WorkflowResult<Package> {
        let started_at = log_start(action.as_str(), id);
        let result = self.load(id).and_then(|before| {
            let target = check_transition(action, before.status)?;
            let mut after = before.clone();
            after.status = target;
            let plan = apply(&mut after)?;
            self.commit(ctx, action.as_str(), before, after, plan)
        });
        self.finish(action.as_str(), id, result, started_at)
    }

    /// Steps 1-4 of every successful operation: persist package, remark and
    /// audit entry together, then dispatch.
    fn commit(
        &self,
        ctx: &ActorContext,
        action: &'static str,
        before: Package,
        mut after: Package,
        plan: CommitPlan,
    ) -> WorkflowResult<Package> {
        let now = (self.clock)();
        after.updated_by = Some(ctx.actor_id.clone());
        after.updated_at = now;

        let remark = Remark::new(
            after.id,
            plan.remark,
            Some(after.status),
            ctx.actor_id.as_str(),
            now,
        );

        let mut audit = with_field_changes(
            AuditLogEntry::for_package(&after, action, ctx.actor_id.as_str(), now)
                .with_status_change(before.status, after.status),
            &before,
            &after,
        );
        for (key, value) in &plan.audit_extra {
            audit = audit.with_new_value(key, value.clone());
        }
        if let Some(memo) = plan.audit_memo {
            audit = audit.with_memo(memo);
        }

        let attachment = plan.attachment.map(|(kind, data)| {
            Attachment::new(after.id, kind, data, ctx.actor_id.as_str(), now)
        });

        let commit = TransitionCommit {
            package: after,
            expected_version: before.version,
            remark,
            audit,
            attachment,
        };
        self.store.commit_transition(&commit)?;

        let mut after = commit.package;
        after.version = before.version + 1;

        if let Some(job_name) = plan.job_name {
            self.dispatch_best_effort(
                job_name,
                action,
                Some(before.status),
                &after,
                ctx,
                &plan.audit_extra,
            );
        }
        Ok(after)
    }

    fn finish(
        &self,
        action: &str,
        id: PackageId,
        result: WorkflowResult<Package>,
        started_at: Instant,
    ) -> WorkflowResult<Package> {
        match &result {
            Ok(package) => info!(
                "event=package_workflow module=service status=ok action={} package_id={} new_status={} duration_ms={}",
                action,
                id,
                package.status.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure(action, id, err, started_at),
        }
        result
    }

    fn dispatch_best_effort(
        &self,
        job_name: &'static str,
        action: &str,
        old_status: Option<PackageStatus>,
        package: &Package,
        ctx: &ActorContext,
        extra: &Map<String, Value>,
    ) {
        let mut payload = json!({
            "package_id": package.id.to_string(),
            "organization_id": package.organization_id,
            "warehouse_id": package.warehouse_id,
            "action": action,
            "old_status": old_status.map(PackageStatus::as_str),
            "new_status": package.status.as_str(),
            "tracking_number": package.tracking_number,
            "recipient_id": package.recipient_id,
            "recipient_contact": package.recipient_contact,
            "actor_id": ctx.actor_id,
        });
        if let Some(object) = payload.as_object_mut() {
            for (key, value) in extra {
                object.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let job = DispatchJob {
            queue_name: self.config.dispatch.queue_name.clone(),
            job_name: job_name.to_string(),
            payload,
            options: self.config.dispatch.job_options(),
        };

        if let Err(err) = self.dispatcher.dispatch(&job) {
            warn!(
                "event=dispatch module=service status=error error_code=dispatch_failed job={} package_id={} error={}",
                job_name, package.id, err
            );
        }
    }
}

fn log_start(action: &str, id: PackageId) -> Instant {
    debug!(
        "event=package_workflow module=service status=start action={} package_id={}",
        action, id
    );
    Instant::now()
}

fn log_failure(action: &str, id: PackageId, err: &WorkflowError, started_at: Instant) {
    warn!(
        "event=package_workflow module=service status=error action={} package_id={} error_code={} duration_ms={} error={}",
        action,
        id,
        err.code(),
        started_at.elapsed().as_millis(),
        err
    );
}

/// Adds changed non-status fields to the audit snapshots.
fn with_field_changes(
    mut audit: AuditLogEntry,
    before: &Package,
    after: &Package,
) -> AuditLogEntry {
    if before.warehouse_id != after.warehouse_id {
        audit = audit.with_change(
            "warehouse_id",
            json!(before.warehouse_id),
            json!(after.warehouse_id),
        );
    }
    if before.location != after.location {
        audit = audit.with_change(
            "location",
            before.location.to_string(),
            after.location.to_string(),
        );
    }
    if before.expected_delivery_at != after.expected_delivery_at {
        audit = audit.with_change(
            "expected_delivery_at",
            json!(before.expected_delivery_at),
            json!(after.expected_delivery_at),
        );
    }
    if before.memo != after.memo {
        audit = audit.with_change("memo", json!(before.memo), json!(after.memo));
    }
    audit
}

fn package_snapshot(package: &Package) -> Map<String, Value> {
    let mut snapshot = Map::new();
    snapshot.insert("status".to_string(), json!(package.status.as_str()));
    snapshot.insert("warehouse_id".to_string(), json!(package.warehouse_id));
    snapshot.insert("location".to_string(), json!(package.location.to_string()));
    snapshot.insert("sender_name".to_string(), json!(package.sender_name));
    snapshot.insert("recipient_name".to_string(), json!(package.recipient_name));
    snapshot.insert("tracking_number".to_string(), json!(package.tracking_number));
    snapshot
}

fn parse_location(raw: &str) -> WorkflowResult<Location> {
    Location::parse(raw).map_err(|err| WorkflowError::Validation(err.to_string()))
}

fn required(field: &str, value: &str) -> WorkflowResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn with_notes(message: String, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|notes| !notes.is_empty()) {
        Some(notes) => format!("{message} - {notes}"),
        None => message,
    }
}
