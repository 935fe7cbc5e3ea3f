use parcelflow_core::db::open_db_in_memory;
use parcelflow_core::model::audit::AuditLogEntry;
use parcelflow_core::model::remark::Remark;
use parcelflow_core::repo::store::TransitionCommit;
use parcelflow_core::service::package_workflow::{
    ApproveRequest, CancelRequest, CreatePackageRequest, FlagRequest, InitiateReturnRequest,
    TransferRequest,
};
use parcelflow_core::{
    ActorContext, Durability, PackageStatus, PackageWorkflow, RecordingDispatcher,
    SqliteWorkflowStore, StoreError, WorkflowAction, WorkflowConfig, WorkflowError,
    WorkflowStore,
};
use uuid::Uuid;

fn workflow(durability: Durability) -> PackageWorkflow<SqliteWorkflowStore, RecordingDispatcher> {
    let store = SqliteWorkflowStore::new(open_db_in_memory().unwrap(), durability);
    PackageWorkflow::new(store, RecordingDispatcher::new(), WorkflowConfig::default())
}

fn create(
    workflow: &PackageWorkflow<SqliteWorkflowStore, RecordingDispatcher>,
    status: PackageStatus,
) -> Uuid {
    workflow
        .create_package(
            &ActorContext::new("user-1"),
            CreatePackageRequest {
                organization_id: "org-1".to_string(),
                recipient_name: "Jane".to_string(),
                initial_status: Some(status),
                ..CreatePackageRequest::default()
            },
        )
        .unwrap()
        .id
}

#[test]
fn rejected_transition_writes_nothing() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");
    let id = create(&workflow, PackageStatus::InStorage);
    let before = workflow.get_package(id).unwrap();

    let err = workflow
        .approve(&ctx, id, ApproveRequest::default())
        .unwrap_err();
    match err {
        WorkflowError::InvalidTransition(err) => {
            assert_eq!(err.action, WorkflowAction::Approve);
            assert_eq!(err.from, PackageStatus::InStorage);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(workflow.get_package(id).unwrap(), before);
    assert_eq!(workflow.store().list_remarks(id).unwrap().len(), 1);
    assert_eq!(workflow.store().list_audit_entries(id).unwrap().len(), 1);
    assert_eq!(workflow.dispatcher().job_names(), vec!["package.created"]);
}

#[test]
fn approve_accepts_only_intake_statuses() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");

    for status in PackageStatus::ALL {
        let id = create(&workflow, status);
        let result = workflow.approve(&ctx, id, ApproveRequest::default());
        let allowed = matches!(
            status,
            PackageStatus::Received | PackageStatus::Unassigned | PackageStatus::Pending
        );
        assert_eq!(result.is_ok(), allowed, "approve from {status}");
    }
}

#[test]
fn cancel_is_rejected_only_for_delivered_packages() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");

    for status in PackageStatus::ALL {
        let id = create(&workflow, status);
        let result = workflow.cancel(
            &ctx,
            id,
            CancelRequest {
                reason: "test".to_string(),
                notes: None,
                notify: false,
            },
        );
        assert_eq!(
            result.is_ok(),
            status != PackageStatus::Delivered,
            "cancel from {status}"
        );
    }
}

#[test]
fn cancel_of_delivered_package_leaves_history_untouched() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");
    let id = create(&workflow, PackageStatus::Delivered);
    let before = workflow.get_package(id).unwrap();
    let remarks = workflow.store().list_remarks(id).unwrap();
    let audits = workflow.store().list_audit_entries(id).unwrap();

    let err = workflow
        .cancel(
            &ctx,
            id,
            CancelRequest {
                reason: "Too late".to_string(),
                notes: None,
                notify: true,
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("Delivered"));

    assert_eq!(workflow.get_package(id).unwrap(), before);
    assert_eq!(workflow.store().list_remarks(id).unwrap(), remarks);
    assert_eq!(workflow.store().list_audit_entries(id).unwrap(), audits);
    assert_eq!(workflow.dispatcher().job_names(), vec!["package.created"]);
}

#[test]
fn flag_is_accepted_from_every_status() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");

    for status in PackageStatus::ALL {
        let id = create(&workflow, status);
        let flagged = workflow
            .flag(
                &ctx,
                id,
                FlagRequest {
                    reason: "check".to_string(),
                    notes: None,
                },
            )
            .unwrap();
        assert_eq!(flagged.status, PackageStatus::Flagged);
    }
}

#[test]
fn transfer_and_return_are_blocked_from_terminal_states() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");

    for status in [
        PackageStatus::Delivered,
        PackageStatus::Cancelled,
        PackageStatus::ReturnProcessed,
    ] {
        let id = create(&workflow, status);
        let transfer = workflow.transfer(
            &ctx,
            id,
            TransferRequest {
                warehouse_id: "wh-2".to_string(),
                notes: None,
            },
        );
        assert!(matches!(transfer, Err(WorkflowError::InvalidTransition(_))));

        let ret = workflow.initiate_return(
            &ctx,
            id,
            InitiateReturnRequest {
                reason: "late".to_string(),
                notes: None,
            },
        );
        assert!(matches!(ret, Err(WorkflowError::InvalidTransition(_))));
    }
}

#[test]
fn stale_version_is_rejected_as_conflict() {
    let workflow = workflow(Durability::Transactional);
    let ctx = ActorContext::new("user-1");
    let id = create(&workflow, PackageStatus::Received);
    let stale = workflow.get_package(id).unwrap();

    workflow
        .approve(&ctx, id, ApproveRequest::default())
        .unwrap();

    let mut next = stale.clone();
    next.status = PackageStatus::Flagged;
    let commit = TransitionCommit {
        remark: Remark::new(id, "late write", Some(next.status), "user-2", 5),
        audit: AuditLogEntry::for_package(&next, "flag", "user-2", 5),
        package: next,
        expected_version: stale.version,
        attachment: None,
    };
    let err = workflow.store().commit_transition(&commit).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    assert_eq!(
        workflow.get_package(id).unwrap().status,
        PackageStatus::Available
    );
    assert_eq!(workflow.store().list_remarks(id).unwrap().len(), 2);
}

#[test]
fn transactional_commit_rolls_back_on_partial_failure() {
    let workflow = workflow(Durability::Transactional);
    let id = create(&workflow, PackageStatus::Received);
    let current = workflow.get_package(id).unwrap();

    let err = workflow
        .store()
        .commit_transition(&broken_commit(&current))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));

    let after = workflow.get_package(id).unwrap();
    assert_eq!(after.status, PackageStatus::Received);
    assert_eq!(after.version, 0);
}

#[test]
fn sequential_commit_keeps_earlier_writes_on_partial_failure() {
    let workflow = workflow(Durability::Sequential);
    let id = create(&workflow, PackageStatus::Received);
    let current = workflow.get_package(id).unwrap();

    workflow
        .store()
        .commit_transition(&broken_commit(&current))
        .unwrap_err();

    let after = workflow.get_package(id).unwrap();
    assert_eq!(after.status, PackageStatus::Available);
    assert_eq!(after.version, 1);
    assert_eq!(workflow.store().list_audit_entries(id).unwrap().len(), 1);
}

/// Valid package update followed by a remark the store rejects.
fn broken_commit(current: &parcelflow_core::Package) -> TransitionCommit {
    let mut next = current.clone();
    next.status = PackageStatus::Available;
    TransitionCommit {
        remark: Remark::new(next.id, "   ", Some(next.status), "user-1", 10),
        audit: AuditLogEntry::for_package(&next, "approve", "user-1", 10),
        package: next,
        expected_version: current.version,
        attachment: None,
    }
}
