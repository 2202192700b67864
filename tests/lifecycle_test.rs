//! Integration tests for the complaint lifecycle

mod common;

use chrono::Duration;
use citycare::models::{Operation, UserId};
use citycare::{Actor, CoreError, Status};
use common::*;

#[test]
fn test_first_report_creates_pending_complaint() {
    let h = harness();
    let outcome = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap();

    assert!(!outcome.is_duplicate);
    let c = outcome.complaint;
    assert_eq!(c.status, Status::Pending);
    assert_eq!(c.urgency_level, 1);
    assert_eq!(c.assigned_worker, None);
    assert_eq!(c.created_at, start());
    assert_eq!(c.last_status_change_at, start());
    assert!(c.complaint_id.starts_with("CC-20260301-"));
    assert_eq!(c.complainant, UserId(11));
}

#[test]
fn test_nearby_report_merges_into_primary() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap();
    let b = h.service.submit(&citizen(12), submission(12.9716, 77.5950)).unwrap();

    assert!(b.is_duplicate);
    assert_eq!(b.complaint.id, a.complaint.id);
    assert_eq!(b.complaint.urgency_level, 2);
    assert_eq!(b.complaint.duplicate_links.len(), 1);
    assert_eq!(b.complaint.duplicate_links[0].submitter, UserId(12));
    assert_eq!(h.service.store().len().unwrap(), 1);
}

#[test]
fn test_distant_report_creates_second_complaint() {
    let h = harness();
    h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap();
    let far = h.service.submit(&citizen(12), submission(12.9716, 77.5960)).unwrap();

    assert!(!far.is_duplicate);
    assert_eq!(far.complaint.urgency_level, 1);
    assert_eq!(h.service.store().len().unwrap(), 2);
}

#[test]
fn test_assign_then_reject_clears_worker() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;

    let assigned = h.service.assign(&inspector(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    assert_eq!(assigned.status, Status::Assigned);
    assert_eq!(assigned.assigned_worker, Some(UserId(WORKER_NEAR)));
    assert_eq!(assigned.assigned_by, Some(inspector().user));

    let rejected = h.service.reject(&officer(), &a.complaint_id, "inaccessible").unwrap();
    assert_eq!(rejected.status, Status::Rejected);
    assert_eq!(rejected.assigned_worker, None);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("inaccessible"));
}

#[test]
fn test_resolve_requires_assignment() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;

    let err = h.service.resolve(&officer(), &a.complaint_id, b"after").unwrap_err();
    assert_eq!(
        err,
        CoreError::IllegalTransition {
            from: Status::Pending,
            operation: Operation::Resolve
        }
    );
    assert_eq!(h.service.get(&a.complaint_id).unwrap().status, Status::Pending);
}

#[test]
fn test_resolve_records_after_photo_and_worker() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    h.clock.advance(Duration::hours(2));

    let resolved = h
        .service
        .resolve(&Actor::collector(WORKER_NEAR), &a.complaint_id, b"after")
        .unwrap();
    assert_eq!(resolved.status, Status::Resolved);
    assert_eq!(resolved.assigned_worker, None);
    assert_eq!(resolved.resolved_by, Some(UserId(WORKER_NEAR)));
    assert_eq!(resolved.last_status_change_at, start() + Duration::hours(2));

    let photo = resolved.photo_after.unwrap();
    assert_eq!(h.service.photo(&photo).unwrap(), b"after".to_vec());
}

#[test]
fn test_reject_requires_reason() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();

    let err = h.service.reject(&officer(), &a.complaint_id, "   ").unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(h.service.get(&a.complaint_id).unwrap().status, Status::Assigned);
}

#[test]
fn test_assign_unknown_or_inactive_worker() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;

    let unknown = h.service.assign(&officer(), &a.complaint_id, UserId(404)).unwrap_err();
    assert!(matches!(unknown, CoreError::NotFound(_)));

    let inactive = h
        .service
        .assign(&officer(), &a.complaint_id, UserId(WORKER_INACTIVE))
        .unwrap_err();
    assert!(matches!(inactive, CoreError::Validation(_)));
    assert_eq!(h.service.get(&a.complaint_id).unwrap().status, Status::Pending);
}

#[test]
fn test_unknown_complaint_is_not_found() {
    let h = harness();
    let err = h
        .service
        .assign(&officer(), "CC-20260301-999999", UserId(WORKER_NEAR))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn test_roles_are_enforced() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;

    let err = h
        .service
        .assign(&citizen(11), &a.complaint_id, UserId(WORKER_NEAR))
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    h.service.assign(&inspector(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();

    // A collector may only close their own work.
    let err = h
        .service
        .resolve(&Actor::collector(WORKER_FAR), &a.complaint_id, b"after")
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = h.service.escalate(&citizen(11), &a.complaint_id).unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[test]
fn test_illegal_transition_reported_before_authorization() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;

    // Not assigned to anyone: the state table refuses first.
    let err = h
        .service
        .reject(&Actor::collector(WORKER_FAR), &a.complaint_id, "blocked")
        .unwrap_err();
    assert!(matches!(err, CoreError::IllegalTransition { .. }));
}

#[test]
fn test_force_escalate_is_idempotent() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.clock.advance(Duration::minutes(5));

    let ids = vec![a.complaint_id.clone()];
    let first = h.service.force_escalate(&officer(), &ids).unwrap();
    assert_eq!(first.escalated, ids);

    let second = h.service.force_escalate(&officer(), &ids).unwrap();
    assert!(second.escalated.is_empty());
    assert_eq!(second.already_escalated, ids);

    let c = h.service.get(&a.complaint_id).unwrap();
    assert_eq!(c.status, Status::Escalated);
    assert_eq!(c.urgency_level, 2);
    assert_eq!(c.last_status_change_at, start() + Duration::minutes(5));
}

#[test]
fn test_escalated_complaint_can_be_reassigned() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    let escalated = h.service.escalate(&officer(), &a.complaint_id).unwrap();
    assert_eq!(escalated.status, Status::Escalated);
    assert_eq!(escalated.assigned_worker, None);

    let reassigned = h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_FAR)).unwrap();
    assert_eq!(reassigned.status, Status::Assigned);
    assert_eq!(reassigned.assigned_worker, Some(UserId(WORKER_FAR)));
}

#[test]
fn test_terminal_complaints_stay_terminal() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    h.service.resolve(&officer(), &a.complaint_id, b"after").unwrap();

    for err in [
        h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap_err(),
        h.service.reject(&officer(), &a.complaint_id, "late").unwrap_err(),
        h.service.resolve(&officer(), &a.complaint_id, b"again").unwrap_err(),
        h.service.escalate(&officer(), &a.complaint_id).unwrap_err(),
    ] {
        assert!(matches!(err, CoreError::IllegalTransition { from: Status::Resolved, .. }));
    }
}

#[test]
fn test_report_near_resolved_complaint_opens_new_one() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    h.service.resolve(&officer(), &a.complaint_id, b"after").unwrap();

    let again = h.service.submit(&citizen(12), submission(12.9716, 77.5946)).unwrap();
    assert!(!again.is_duplicate);
    assert_ne!(again.complaint.id, a.id);
}

#[test]
fn test_audit_trail_is_a_valid_walk() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.submit(&citizen(12), submission(12.9716, 77.5947)).unwrap();
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    h.service.escalate(&officer(), &a.complaint_id).unwrap();
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_FAR)).unwrap();
    h.service.reject(&officer(), &a.complaint_id, "inaccessible").unwrap();

    let walk = h.audit.walk_of(&a.complaint_id);
    assert_eq!(
        walk,
        vec![
            Status::Pending,
            Status::Pending,
            Status::Assigned,
            Status::Escalated,
            Status::Assigned,
            Status::Rejected
        ]
    );
    assert!(is_valid_walk(&walk));

    let versions: Vec<u64> = h
        .audit
        .events()
        .iter()
        .filter(|e| e.complaint_id == a.complaint_id)
        .map(|e| e.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_urgency_cap_saturates() {
    let mut settings = citycare::config::EngineConfig::default();
    settings.max_urgency = Some(2);
    let h = harness_with(settings);

    let a = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.service.submit(&citizen(12), submission(12.9716, 77.5947)).unwrap();
    let third = h.service.submit(&citizen(13), submission(12.9716, 77.5947)).unwrap();
    assert!(third.is_duplicate);
    assert_eq!(third.complaint.urgency_level, 2);
    assert_eq!(third.complaint.report_count(), 3);

    let escalated = h.service.escalate(&officer(), &a.complaint_id).unwrap();
    assert_eq!(escalated.urgency_level, 2);
}
