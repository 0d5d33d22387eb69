mod common;

use common::{RecordingNotifier, TestApp, details, spawn_with};
use schooldesk::domain::notifications::Notification;
use schooldesk::domain::{ApplicationId, ApplicationStatus, Principal, Role};
use schooldesk::models::Application;
use schooldesk::db::timestamp;
use schooldesk::services::{ApplicationError, Clock};

struct Fixture {
    app: TestApp,
    admin: Principal,
    leader: Principal,
    other_leader: Principal,
    student: Principal,
    other_student: Principal,
    application: Application,
}

async fn fixture_with(notifier: RecordingNotifier) -> Fixture {
    let app = spawn_with(notifier).await;
    let admin = app.principal("principal@school.example", Role::Admin).await;
    let leader = app.principal("lee@leader.example", Role::Leader).await;
    let other_leader = app.principal("max@leader.example", Role::Leader).await;
    let student = app.principal("ada@student.example", Role::Student).await;
    let other_student = app.principal("bo@student.example", Role::Student).await;

    let school = app.school("Northside High", &leader).await;
    app.school("Southside High", &other_leader).await;

    let application = app
        .state
        .application_service
        .submit(student, school.id, details("Ada Lovelace"))
        .await
        .expect("submit");

    Fixture {
        app,
        admin,
        leader,
        other_leader,
        student,
        other_student,
        application,
    }
}

async fn fixture() -> Fixture {
    fixture_with(RecordingNotifier::default()).await
}

impl Fixture {
    async fn status(&self) -> ApplicationStatus {
        self.app
            .store()
            .get_application(self.application.id)
            .await
            .unwrap()
            .expect("application row")
            .status
    }
}

#[tokio::test]
async fn submit_creates_pending_application_and_notifies_leader() {
    let f = fixture().await;

    assert_eq!(f.application.status, ApplicationStatus::Pending);
    assert_eq!(f.application.applicant_id, f.student.account_id);
    assert_eq!(f.application.details.email, "ada.lovelace@family.example");

    let notice = f
        .app
        .wait_for_notification(|n| matches!(n, Notification::NewApplication { .. }))
        .await;
    assert_eq!(notice.recipient(), "lee@leader.example");
}

#[tokio::test]
async fn submit_succeeds_when_leader_notice_fails() {
    let f = fixture_with(RecordingNotifier::failing()).await;

    assert_eq!(f.application.status, ApplicationStatus::Pending);
    f.app
        .wait_for_notification(|n| matches!(n, Notification::NewApplication { .. }))
        .await;
    assert_eq!(f.status().await, ApplicationStatus::Pending);
}

#[tokio::test]
async fn timestamps_follow_the_service_clock() {
    let f = fixture().await;
    let submitted_at = timestamp(f.app.clock.now());
    assert_eq!(f.application.created_at, submitted_at);
    assert_eq!(f.application.updated_at, submitted_at);

    f.app.clock.advance(chrono::Duration::minutes(5));
    let approved = f
        .app
        .state
        .application_service
        .approve(f.leader, f.application.id)
        .await
        .unwrap();

    let reviewed_at = timestamp(f.app.clock.now());
    assert_eq!(approved.reviewed_at.as_deref(), Some(reviewed_at.as_str()));
    assert_eq!(approved.updated_at, reviewed_at);
    assert_eq!(approved.created_at, submitted_at);
}

#[tokio::test]
async fn second_application_to_same_school_is_rejected() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    let again = service
        .submit(f.student, f.application.school_id, details("Ada Lovelace"))
        .await;
    assert!(matches!(again, Err(ApplicationError::DuplicateApplication)));

    // Still a duplicate once the first one is no longer pending.
    service.withdraw(f.student, f.application.id).await.unwrap();
    let after_withdraw = service
        .submit(f.student, f.application.school_id, details("Ada Lovelace"))
        .await;
    assert!(matches!(
        after_withdraw,
        Err(ApplicationError::DuplicateApplication)
    ));

    // A different student is unaffected.
    assert!(
        service
            .submit(f.other_student, f.application.school_id, details("Bo Diddley"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn only_students_submit() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    for principal in [f.admin, f.leader] {
        assert!(matches!(
            service
                .submit(principal, f.application.school_id, details("Someone Else"))
                .await,
            Err(ApplicationError::Forbidden)
        ));
    }
}

#[tokio::test]
async fn submit_to_missing_school_fails() {
    let f = fixture().await;

    let result = f
        .app
        .state
        .application_service
        .submit(
            f.other_student,
            schooldesk::domain::SchoolId::new(9_999),
            details("Bo Diddley"),
        )
        .await;
    assert!(matches!(result, Err(ApplicationError::SchoolNotFound)));
}

#[tokio::test]
async fn owning_leader_approves_and_applicant_is_notified() {
    let f = fixture().await;

    let approved = f
        .app
        .state
        .application_service
        .approve(f.leader, f.application.id)
        .await
        .unwrap();

    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert_eq!(approved.reviewer_id, Some(f.leader.account_id));
    assert!(approved.reviewed_at.is_some());

    let notice = f
        .app
        .wait_for_notification(|n| matches!(n, Notification::ApplicationStatus { .. }))
        .await;
    assert_eq!(notice.recipient(), "ada.lovelace@family.example");
}

#[tokio::test]
async fn other_leader_and_students_are_forbidden() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    for principal in [f.other_leader, f.student, f.other_student] {
        assert!(matches!(
            service.approve(principal, f.application.id).await,
            Err(ApplicationError::Forbidden)
        ));
        assert!(matches!(
            service.reject(principal, f.application.id, "Full").await,
            Err(ApplicationError::Forbidden)
        ));
    }
    assert_eq!(f.status().await, ApplicationStatus::Pending);

    let rejected = service
        .reject(f.admin, f.application.id, "  Class is full  ")
        .await
        .unwrap();
    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Class is full"));
}

#[tokio::test]
async fn reject_without_reason_changes_nothing() {
    let f = fixture().await;

    for reason in ["", "   "] {
        assert!(matches!(
            f.app
                .state
                .application_service
                .reject(f.admin, f.application.id, reason)
                .await,
            Err(ApplicationError::MissingReason)
        ));
    }

    let stored = f
        .app
        .store()
        .get_application(f.application.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, f.application);
}

#[tokio::test]
async fn decided_applications_cannot_move_again() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    service.approve(f.admin, f.application.id).await.unwrap();

    for principal in [f.admin, f.leader] {
        assert!(matches!(
            service.approve(principal, f.application.id).await,
            Err(ApplicationError::InvalidTransition {
                from: ApplicationStatus::Approved,
                to: ApplicationStatus::Approved,
            })
        ));
        assert!(matches!(
            service.reject(principal, f.application.id, "Changed our minds").await,
            Err(ApplicationError::InvalidTransition {
                from: ApplicationStatus::Approved,
                to: ApplicationStatus::Rejected,
            })
        ));
    }
    assert!(matches!(
        service.withdraw(f.student, f.application.id).await,
        Err(ApplicationError::InvalidTransition {
            from: ApplicationStatus::Approved,
            to: ApplicationStatus::Withdrawn,
        })
    ));
    assert_eq!(f.status().await, ApplicationStatus::Approved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approve_and_reject_settle_on_one_outcome() {
    let f = fixture().await;
    let service = f.app.state.application_service.clone();
    let id = f.application.id;

    let (approve, reject) = tokio::join!(
        service.approve(f.admin, id),
        service.reject(f.leader, id, "No seats left"),
    );

    let winner = match (&approve, &reject) {
        (Ok(a), Err(ApplicationError::InvalidTransition { .. })) => a.status,
        (Err(ApplicationError::InvalidTransition { .. }), Ok(r)) => r.status,
        other => panic!("expected exactly one success, got {other:?}"),
    };
    assert_eq!(f.status().await, winner);
}

#[tokio::test]
async fn applicant_withdraws_once() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    assert!(matches!(
        service.withdraw(f.other_student, f.application.id).await,
        Err(ApplicationError::Forbidden)
    ));
    assert!(matches!(
        service.withdraw(f.admin, f.application.id).await,
        Err(ApplicationError::Forbidden)
    ));

    let withdrawn = service.withdraw(f.student, f.application.id).await.unwrap();
    assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);

    assert!(matches!(
        service.withdraw(f.student, f.application.id).await,
        Err(ApplicationError::InvalidTransition {
            from: ApplicationStatus::Withdrawn,
            to: ApplicationStatus::Withdrawn,
        })
    ));
    assert!(matches!(
        service.approve(f.admin, f.application.id).await,
        Err(ApplicationError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let f = fixture().await;
    let service = &f.app.state.application_service;
    let missing = ApplicationId::new(9_999);

    assert!(matches!(
        service.approve(f.admin, missing).await,
        Err(ApplicationError::NotFound)
    ));
    assert!(matches!(
        service.withdraw(f.student, missing).await,
        Err(ApplicationError::NotFound)
    ));
    assert!(matches!(
        service.get(f.admin, missing).await,
        Err(ApplicationError::NotFound)
    ));
}

#[tokio::test]
async fn failed_delivery_does_not_undo_transition() {
    let f = fixture_with(RecordingNotifier::failing()).await;

    let approved = f
        .app
        .state
        .application_service
        .approve(f.leader, f.application.id)
        .await
        .unwrap();
    assert_eq!(approved.status, ApplicationStatus::Approved);

    f.app
        .wait_for_notification(|n| matches!(n, Notification::ApplicationStatus { .. }))
        .await;
    assert_eq!(f.status().await, ApplicationStatus::Approved);
}

#[tokio::test]
async fn listing_follows_role() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    let southside = f
        .app
        .store()
        .list_schools_for_leader(f.other_leader.account_id)
        .await
        .unwrap()
        .remove(0);
    service
        .submit(f.other_student, southside.id, details("Bo Diddley"))
        .await
        .unwrap();

    assert_eq!(service.list(f.admin).await.unwrap().len(), 2);
    assert_eq!(service.list(f.student).await.unwrap(), vec![f.application.clone()]);
    assert_eq!(service.list(f.other_student).await.unwrap().len(), 1);

    let leader_view = service.list(f.leader).await.unwrap();
    assert_eq!(leader_view.len(), 1);
    assert_eq!(leader_view[0].id, f.application.id);
}

#[tokio::test]
async fn get_is_limited_to_applicant_and_reviewers() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    for principal in [f.student, f.leader, f.admin] {
        assert_eq!(
            service.get(principal, f.application.id).await.unwrap().id,
            f.application.id
        );
    }
    for principal in [f.other_student, f.other_leader] {
        assert!(matches!(
            service.get(principal, f.application.id).await,
            Err(ApplicationError::Forbidden)
        ));
    }
}

#[tokio::test]
async fn details_can_be_edited_only_while_pending() {
    let f = fixture().await;
    let service = &f.app.state.application_service;

    let mut changed = details("Ada Lovelace");
    changed.notes = Some("  Plays the violin ".to_string());

    assert!(matches!(
        service
            .update_details(f.other_student, f.application.id, changed.clone())
            .await,
        Err(ApplicationError::Forbidden)
    ));

    let updated = service
        .update_details(f.student, f.application.id, changed.clone())
        .await
        .unwrap();
    assert_eq!(updated.details.notes.as_deref(), Some("Plays the violin"));
    assert_eq!(updated.status, ApplicationStatus::Pending);

    let mut blank = changed.clone();
    blank.student_name = "   ".to_string();
    assert!(matches!(
        service.update_details(f.student, f.application.id, blank).await,
        Err(ApplicationError::Validation(_))
    ));

    service.approve(f.admin, f.application.id).await.unwrap();
    assert!(matches!(
        service.update_details(f.student, f.application.id, changed).await,
        Err(ApplicationError::InvalidTransition {
            from: ApplicationStatus::Approved,
            ..
        })
    ));
}
