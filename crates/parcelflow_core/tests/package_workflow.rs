use parcelflow_core::db::open_db_in_memory;
use parcelflow_core::model::attachment::AttachmentKind;
use parcelflow_core::service::package_workflow::{
    ApproveRequest, AssignStorageRequest, CancelRequest, CompleteDeliveryRequest,
    CompleteReceiptRequest, CreatePackageRequest, FailDeliveryRequest, FlagRequest,
    InitiateReturnRequest, PrepareDeliveryRequest, ProcessReturnRequest, StatusOverrideRequest,
    TransferRequest,
};
use parcelflow_core::{
    ActorContext, Durability, PackageListQuery, PackageStatus, PackageWorkflow,
    RecordingDispatcher, SqliteWorkflowStore, WorkflowConfig, WorkflowError, WorkflowStore,
};
use uuid::Uuid;

type TestWorkflow = PackageWorkflow<SqliteWorkflowStore, RecordingDispatcher>;

fn workflow_with(dispatcher: RecordingDispatcher) -> TestWorkflow {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteWorkflowStore::new(conn, Durability::Transactional);
    PackageWorkflow::new(store, dispatcher, WorkflowConfig::default())
}

fn workflow() -> TestWorkflow {
    workflow_with(RecordingDispatcher::new())
}

fn actor() -> ActorContext {
    ActorContext::new("user-1")
}

fn create(workflow: &TestWorkflow, status: PackageStatus) -> Uuid {
    workflow
        .create_package(
            &actor(),
            CreatePackageRequest {
                organization_id: "org-1".to_string(),
                sender_name: "Acme Supplies".to_string(),
                recipient_name: "Jane Doe".to_string(),
                recipient_id: Some("resident-7".to_string()),
                tracking_number: Some("TRK-100".to_string()),
                initial_status: Some(status),
                ..CreatePackageRequest::default()
            },
        )
        .unwrap()
        .id
}

#[test]
fn create_package_writes_remark_audit_and_dispatch() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Received);

    let package = workflow.get_package(id).unwrap();
    assert_eq!(package.status, PackageStatus::Received);
    assert_eq!(package.version, 0);
    assert_eq!(package.created_by, "user-1");

    let remarks = workflow.store().list_remarks(id).unwrap();
    assert_eq!(remarks.len(), 1);
    assert_eq!(remarks[0].status, Some(PackageStatus::Received));

    let audits = workflow.store().list_audit_entries(id).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, "create");
    assert_eq!(audits[0].new_status(), Some(PackageStatus::Received));

    assert_eq!(workflow.dispatcher().job_names(), vec!["package.created"]);
}

#[test]
fn create_package_rejects_missing_parties_and_bad_location() {
    let workflow = workflow();

    let err = workflow
        .create_package(
            &actor(),
            CreatePackageRequest {
                organization_id: "org-1".to_string(),
                ..CreatePackageRequest::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let err = workflow
        .create_package(
            &actor(),
            CreatePackageRequest {
                organization_id: "org-1".to_string(),
                sender_name: "Acme".to_string(),
                location: Some("A-1-2-3-4".to_string()),
                ..CreatePackageRequest::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(workflow
        .list_packages(&PackageListQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn approve_moves_intake_package_to_available_with_location() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Received);

    let approved = workflow
        .approve(
            &actor(),
            id,
            ApproveRequest {
                warehouse_id: Some("wh-1".to_string()),
                location: Some("A / 3 / 2 / 7".to_string()),
                notes: None,
            },
        )
        .unwrap();

    assert_eq!(approved.status, PackageStatus::Available);
    assert_eq!(approved.version, 1);
    assert_eq!(approved.location.to_string(), "A-3-2-7");
    assert_eq!(approved.updated_by.as_deref(), Some("user-1"));

    let stored = workflow.get_package(id).unwrap();
    assert_eq!(stored, approved);

    let remark = &workflow.store().list_remarks(id).unwrap()[0];
    assert_eq!(remark.status, Some(PackageStatus::Available));
    assert!(remark.message.contains("A-3-2-7"));

    let audit = &workflow.store().list_audit_entries(id).unwrap()[0];
    assert_eq!(audit.action, "approve");
    assert_eq!(audit.old_status(), Some(PackageStatus::Received));
    assert_eq!(audit.new_status(), Some(PackageStatus::Available));
    assert_eq!(audit.new_values["location"], "A-3-2-7");
    assert_eq!(audit.old_values["location"], "Unassigned");
}

#[test]
fn flag_appends_one_marker_per_call() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Delivered);

    workflow
        .flag(
            &actor(),
            id,
            FlagRequest {
                reason: "Damaged box".to_string(),
                notes: Some("corner crushed".to_string()),
            },
        )
        .unwrap();
    let flagged = workflow
        .flag(
            &actor(),
            id,
            FlagRequest {
                reason: "Wrong label".to_string(),
                notes: None,
            },
        )
        .unwrap();

    assert_eq!(flagged.status, PackageStatus::Flagged);
    assert_eq!(
        flagged.memo.as_deref(),
        Some("[FLAGGED] Damaged box: corner crushed\n[FLAGGED] Wrong label")
    );
    let audit = &workflow.store().list_audit_entries(id).unwrap()[0];
    assert_eq!(audit.memo.as_deref(), Some("[FLAGGED] Wrong label"));

    let remarks = workflow.store().list_remarks(id).unwrap();
    assert_eq!(remarks.len(), 3);
    assert_eq!(remarks[0].status, Some(PackageStatus::Flagged));
    assert_eq!(remarks[1].status, Some(PackageStatus::Flagged));
}

#[test]
fn cancel_dispatches_only_when_notify_is_set() {
    let workflow = workflow();
    let quiet = create(&workflow, PackageStatus::Available);
    let loud = create(&workflow, PackageStatus::Available);

    let cancelled = workflow
        .cancel(
            &actor(),
            quiet,
            CancelRequest {
                reason: "Duplicate".to_string(),
                notes: None,
                notify: false,
            },
        )
        .unwrap();
    assert_eq!(cancelled.status, PackageStatus::Cancelled);
    assert_eq!(cancelled.memo.as_deref(), Some("[CANCELLED] Duplicate"));

    workflow
        .cancel(
            &actor(),
            loud,
            CancelRequest {
                reason: "Refused".to_string(),
                notes: Some("by phone".to_string()),
                notify: true,
            },
        )
        .unwrap();

    let names = workflow.dispatcher().job_names();
    assert_eq!(
        names.iter().filter(|name| *name == "package.cancelled").count(),
        1
    );
    let job = workflow
        .dispatcher()
        .jobs()
        .into_iter()
        .find(|job| job.job_name == "package.cancelled")
        .unwrap();
    assert_eq!(job.payload["package_id"], loud.to_string());
    assert_eq!(job.payload["old_status"], "available");
    assert_eq!(job.payload["new_status"], "cancelled");
    assert_eq!(job.queue_name, "notifications");
    assert_eq!(job.options.attempts, 3);
}

#[test]
fn assign_storage_requires_location_and_rejects_terminal_states() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Available);

    let err = workflow
        .assign_storage(
            &actor(),
            id,
            AssignStorageRequest {
                warehouse_id: "wh-1".to_string(),
                location: "  ".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let stored = workflow
        .assign_storage(
            &actor(),
            id,
            AssignStorageRequest {
                warehouse_id: "wh-1".to_string(),
                location: "B,4".to_string(),
            },
        )
        .unwrap();
    assert_eq!(stored.status, PackageStatus::InStorage);
    assert_eq!(stored.location.zone.as_deref(), Some("B"));
    assert_eq!(stored.location.isle.as_deref(), Some("4"));
    assert_eq!(stored.location.shelf, None);

    let delivered = create(&workflow, PackageStatus::Delivered);
    let err = workflow
        .assign_storage(
            &actor(),
            delivered,
            AssignStorageRequest {
                warehouse_id: "wh-1".to_string(),
                location: "B-4".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition(_)));
}

#[test]
fn complete_receipt_stores_signature_attachment() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Received);

    let received = workflow
        .complete_receipt(
            &actor(),
            id,
            CompleteReceiptRequest {
                signature: Some("data:image/png;base64,AAAA".to_string()),
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(received.status, PackageStatus::Available);

    let attachments = workflow.list_attachments(id).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].kind, AttachmentKind::ReceiptSignature);
    assert_eq!(attachments[0].data, "data:image/png;base64,AAAA");
}

#[test]
fn transfer_clears_location_and_changes_warehouse() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Received);
    workflow
        .assign_storage(
            &actor(),
            id,
            AssignStorageRequest {
                warehouse_id: "wh-1".to_string(),
                location: "A-1".to_string(),
            },
        )
        .unwrap();

    let moved = workflow
        .transfer(
            &actor(),
            id,
            TransferRequest {
                warehouse_id: "wh-2".to_string(),
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(moved.status, PackageStatus::Transferred);
    assert_eq!(moved.warehouse_id.as_deref(), Some("wh-2"));
    assert!(moved.location.is_empty());
}

#[test]
fn delivery_flow_with_failed_attempt_and_reschedule() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Available);

    workflow
        .prepare_delivery(&actor(), id, PrepareDeliveryRequest::default())
        .unwrap();
    workflow.start_delivery(&actor(), id).unwrap();
    let rescheduled = workflow
        .fail_delivery(
            &actor(),
            id,
            FailDeliveryRequest {
                reason: "Nobody home".to_string(),
                reschedule_at: Some(1_900_000_000_000),
            },
        )
        .unwrap();
    assert_eq!(rescheduled.status, PackageStatus::ReadyForDelivery);
    assert_eq!(rescheduled.expected_delivery_at, Some(1_900_000_000_000));

    workflow.start_delivery(&actor(), id).unwrap();
    let delivered = workflow
        .complete_delivery(&actor(), id, CompleteDeliveryRequest::default())
        .unwrap();
    assert_eq!(delivered.status, PackageStatus::Delivered);
    assert_eq!(delivered.version, 5);

    assert_eq!(
        workflow.dispatcher().job_names(),
        vec![
            "package.created",
            "delivery.ready",
            "delivery.started",
            "delivery.failed",
            "delivery.started",
            "delivery.completed",
        ]
    );
}

#[test]
fn fail_delivery_without_reschedule_ends_in_delivery_failed() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::OutForDelivery);

    let failed = workflow
        .fail_delivery(
            &actor(),
            id,
            FailDeliveryRequest {
                reason: "Address not found".to_string(),
                reschedule_at: None,
            },
        )
        .unwrap();
    assert_eq!(failed.status, PackageStatus::DeliveryFailed);
}

#[test]
fn complete_delivery_requires_signature_when_flagged_on_package() {
    let workflow = workflow();
    let id = workflow
        .create_package(
            &actor(),
            CreatePackageRequest {
                organization_id: "org-1".to_string(),
                recipient_name: "Jane".to_string(),
                signature_required: true,
                initial_status: Some(PackageStatus::OutForDelivery),
                ..CreatePackageRequest::default()
            },
        )
        .unwrap()
        .id;

    let err = workflow
        .complete_delivery(&actor(), id, CompleteDeliveryRequest::default())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert_eq!(
        workflow.get_package(id).unwrap().status,
        PackageStatus::OutForDelivery
    );

    workflow
        .complete_delivery(
            &actor(),
            id,
            CompleteDeliveryRequest {
                signature: Some("sig".to_string()),
                notes: None,
            },
        )
        .unwrap();
    let attachments = workflow.list_attachments(id).unwrap();
    assert_eq!(attachments[0].kind, AttachmentKind::DeliverySignature);
}

#[test]
fn return_flow_records_condition_and_refund() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::InStorage);

    workflow
        .initiate_return(
            &actor(),
            id,
            InitiateReturnRequest {
                reason: "Wrong item".to_string(),
                notes: None,
            },
        )
        .unwrap();
    workflow.ship_return(&actor(), id).unwrap();
    workflow.receive_return(&actor(), id).unwrap();
    let processed = workflow
        .process_return(
            &actor(),
            id,
            ProcessReturnRequest {
                condition: "Like new".to_string(),
                refund_approved: true,
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(processed.status, PackageStatus::ReturnProcessed);

    let audit = &workflow.store().list_audit_entries(id).unwrap()[0];
    assert_eq!(audit.action, "process_return");
    assert_eq!(audit.new_values["condition"], "Like new");
    assert_eq!(audit.new_values["refund_approved"], true);
    assert_eq!(audit.old_status(), Some(PackageStatus::ReturnReceived));
}

#[test]
fn override_status_bypasses_guard_and_audits_change() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Delivered);

    let reopened = workflow
        .override_status(
            &actor(),
            id,
            StatusOverrideRequest {
                status: PackageStatus::Available,
                notes: Some("delivered to wrong unit".to_string()),
            },
        )
        .unwrap();
    assert_eq!(reopened.status, PackageStatus::Available);

    let audit = &workflow.store().list_audit_entries(id).unwrap()[0];
    assert_eq!(audit.action, "status_override");
    assert_eq!(audit.old_status(), Some(PackageStatus::Delivered));
    assert_eq!(audit.new_status(), Some(PackageStatus::Available));
    assert!(workflow
        .dispatcher()
        .job_names()
        .contains(&"package.status_changed".to_string()));
}

#[test]
fn dispatch_failure_does_not_change_operation_result() {
    let workflow = workflow_with(RecordingDispatcher::failing("queue offline"));
    let id = create(&workflow, PackageStatus::Received);

    let approved = workflow
        .approve(&actor(), id, ApproveRequest::default())
        .unwrap();
    assert_eq!(approved.status, PackageStatus::Available);
    assert_eq!(
        workflow.get_package(id).unwrap().status,
        PackageStatus::Available
    );
    assert_eq!(workflow.store().list_audit_entries(id).unwrap().len(), 2);
    assert_eq!(workflow.dispatcher().jobs().len(), 2);
}

#[test]
fn approve_with_blank_location_keeps_existing_slot() {
    let workflow = workflow();
    let id = workflow
        .create_package(
            &actor(),
            CreatePackageRequest {
                organization_id: "org-1".to_string(),
                sender_name: "Acme".to_string(),
                location: Some("A-1-2".to_string()),
                initial_status: Some(PackageStatus::Unassigned),
                ..CreatePackageRequest::default()
            },
        )
        .unwrap()
        .id;

    let approved = workflow
        .approve(
            &actor(),
            id,
            ApproveRequest {
                location: Some("  ".to_string()),
                ..ApproveRequest::default()
            },
        )
        .unwrap();
    assert_eq!(approved.status, PackageStatus::Available);
    assert_eq!(approved.location.to_string(), "A-1-2");

    let audit = &workflow.store().list_audit_entries(id).unwrap()[0];
    assert!(!audit.new_values.contains_key("location"));
}

#[test]
fn unknown_package_yields_not_found() {
    let workflow = workflow();
    let missing = Uuid::new_v4();

    let err = workflow
        .approve(&actor(), missing, ApproveRequest::default())
        .unwrap_err();
    match err {
        WorkflowError::NotFound(id) => assert_eq!(id, missing),
        other => panic!("unexpected error: {other}"),
    }
    assert!(workflow.dispatcher().jobs().is_empty());
}

#[test]
fn unknown_package_is_not_found_before_request_validation() {
    let workflow = workflow();
    let missing = Uuid::new_v4();

    let err = workflow
        .flag(&actor(), missing, FlagRequest::default())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(id) if id == missing));

    let err = workflow
        .cancel(&actor(), missing, CancelRequest::default())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(id) if id == missing));

    let err = workflow
        .assign_storage(
            &actor(),
            missing,
            AssignStorageRequest {
                warehouse_id: " ".to_string(),
                location: String::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(id) if id == missing));
}

#[test]
fn flag_without_reason_still_flags_existing_package() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::InStorage);

    let flagged = workflow
        .flag(
            &actor(),
            id,
            FlagRequest {
                reason: "  ".to_string(),
                notes: Some("wet".to_string()),
            },
        )
        .unwrap();
    assert_eq!(flagged.status, PackageStatus::Flagged);
    assert_eq!(flagged.memo.as_deref(), Some("[FLAGGED] wet"));

    let bare = workflow
        .flag(&actor(), id, FlagRequest::default())
        .unwrap();
    assert_eq!(bare.memo.as_deref(), Some("[FLAGGED] wet\n[FLAGGED]"));
    assert_eq!(workflow.store().list_remarks(id).unwrap()[0].message, "Package flagged");
}

#[test]
fn cancel_with_blank_reason_is_rejected_after_loading() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Available);

    let err = workflow
        .cancel(&actor(), id, CancelRequest::default())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let package = workflow.get_package(id).unwrap();
    assert_eq!(package.status, PackageStatus::Available);
    assert_eq!(package.version, 0);
    assert_eq!(workflow.store().list_audit_entries(id).unwrap().len(), 1);
}

#[test]
fn soft_delete_hides_package_from_reads() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::Available);

    workflow
        .soft_delete(&actor(), id, Some("entered twice".to_string()))
        .unwrap();

    assert!(matches!(
        workflow.get_package(id).unwrap_err(),
        WorkflowError::NotFound(_)
    ));
    assert!(workflow
        .list_packages(&PackageListQuery::default())
        .unwrap()
        .is_empty());

    let with_deleted = workflow
        .list_packages(&PackageListQuery {
            include_deleted: true,
            ..PackageListQuery::default()
        })
        .unwrap();
    assert_eq!(with_deleted.len(), 1);
    assert!(with_deleted[0].is_deleted);
    assert_eq!(with_deleted[0].status, PackageStatus::Available);
}

#[test]
fn add_remark_stamps_current_status_without_audit() {
    let workflow = workflow();
    let id = create(&workflow, PackageStatus::InStorage);

    let remark = workflow
        .add_remark(&actor(), id, "Customer called about pickup")
        .unwrap();
    assert_eq!(remark.status, Some(PackageStatus::InStorage));

    let remarks = workflow.store().list_remarks(id).unwrap();
    assert_eq!(remarks.len(), 2);
    assert_eq!(remarks[0].message, "Customer called about pickup");
    assert_eq!(workflow.store().list_audit_entries(id).unwrap().len(), 1);

    assert!(matches!(
        workflow.add_remark(&actor(), id, "   ").unwrap_err(),
        WorkflowError::Validation(_)
    ));
}
