//! Client subscriptions fed by the embedded store's live listeners

mod common;

use std::sync::Arc;

use club_client::{
    CollectionSubscription, DocumentSubscription, ManualScheduler, Query, subscribe_collection,
};
use club_server::registration::AdultRegistrationSubmission;
use club_server::{ApprovalService, RegistrationService};
use common::*;
use parking_lot::Mutex;
use shared::models::{Member, MemberStatus, User, UserStatus, collections};

fn scheduler() -> Arc<ManualScheduler> {
    Arc::new(ManualScheduler::new())
}

async fn submit_and_approve(store: &club_server::DocStore, uid: &str) -> String {
    let request_id = RegistrationService::new(store.clone())
        .submit_adult(
            &member_caller(uid),
            AdultRegistrationSubmission {
                club_id: "c1".into(),
                club_name: Some("Harbor".into()),
                applicant: applicant("Kim Minji", None),
            },
        )
        .await
        .expect("submit adult");
    ApprovalService::new(store.clone())
        .approve_adult(&request_id, &staff("c1"))
        .await
        .expect("approve adult")
        .member_id
}

#[tokio::test]
async fn test_collection_view_follows_approvals() {
    let store = store();
    seed_user(&store, "u1", UserStatus::Pending);
    seed_member(&store, "other-club", "c2");

    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = sizes.clone();
    let members = subscribe_collection::<Member>(
        Arc::new(store.clone()),
        scheduler(),
        Query::new(collections::MEMBERS).where_eq("clubId", "c1"),
        move |docs| sink.lock().push(docs.len()),
        |e| panic!("unexpected subscription error: {e}"),
    );

    // Initial snapshot arrives while attaching
    let state = members.state();
    assert!(state.is_connected);
    assert!(members.data().is_empty());

    let member_id = submit_and_approve(&store, "u1").await;
    let data = members.data();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].id, member_id);
    assert_eq!(data[0].status, MemberStatus::Active);
    assert_eq!(*sizes.lock(), vec![0, 1]);
}

#[tokio::test]
async fn test_document_view_sees_user_activation() {
    let store = store();
    seed_user(&store, "u1", UserStatus::Pending);

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let profile = DocumentSubscription::<User>::builder(
        Arc::new(store.clone()),
        scheduler(),
        collections::USERS,
        "u1",
    )
    .on_document_change(move |user, exists| {
        if exists && let Some(user) = user {
            sink.lock().push(user.status);
        }
    })
    .start();
    assert!(profile.exists());

    let member_id = submit_and_approve(&store, "u1").await;
    let user = profile.data().expect("user document");
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.linked_member_id.as_deref(), Some(member_id.as_str()));

    let seen = statuses.lock().clone();
    assert_eq!(seen.first(), Some(&UserStatus::Pending));
    assert_eq!(seen.last(), Some(&UserStatus::Active));
}

#[tokio::test]
async fn test_missing_document_appears_later() {
    let store = store();
    let profile = DocumentSubscription::<User>::builder(
        Arc::new(store.clone()),
        scheduler(),
        collections::USERS,
        "u7",
    )
    .start();
    assert!(profile.state().is_connected);
    assert!(!profile.exists());

    seed_user(&store, "u7", UserStatus::Pending);
    assert!(profile.exists());
}

#[tokio::test]
async fn test_unsubscribe_detaches_store_listener() {
    let store = store();
    let members = CollectionSubscription::<Member>::builder(
        Arc::new(store.clone()),
        scheduler(),
        Query::new(collections::MEMBERS),
    )
    .start();
    assert_eq!(store.listener_count(), 1);

    members.unsubscribe();
    members.unsubscribe();
    assert_eq!(store.listener_count(), 0);

    seed_member(&store, "m1", "c1");
    assert!(members.data().is_empty());
    assert!(!members.state().is_connected);
}

#[tokio::test]
async fn test_dropping_subscription_detaches_store_listener() {
    let store = store();
    {
        let _members = CollectionSubscription::<Member>::builder(
            Arc::new(store.clone()),
            scheduler(),
            Query::new(collections::MEMBERS),
        )
        .start();
        assert_eq!(store.listener_count(), 1);
    }
    assert_eq!(store.listener_count(), 0);
}
