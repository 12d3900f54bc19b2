//! Contract Test: Profile Listings and Members
//!
//! Constraints verified:
//! - Listing returns one summary per profile document, never link documents
//! - A missing profile has no summary and is not an error
//! - Members are selected by the member field and listed owner first
//! - Active profile contact counters are attached when that profile exists

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use linkbio_core::Error;
use linkbio_core::config::SyncConfig;
use linkbio_core::model::DocumentPath;
use linkbio_core::profile::ProfileService;
use serde_json::json;
use std::sync::Arc;

fn service(store: &RecordingDocumentStore) -> ProfileService {
    let (service, _rx) = ProfileService::new(
        Arc::new(store.clone()),
        Arc::new(FlakyLocalStore::new()),
        &SyncConfig::default(),
    )
    .unwrap();
    service
}

async fn insert(store: &RecordingDocumentStore, path: &str, value: serde_json::Value) {
    store
        .inner()
        .insert(&DocumentPath::new(path), fields(value))
        .await;
}

#[tokio::test]
async fn lists_profile_summaries() {
    let store = RecordingDocumentStore::new();
    insert(
        &store,
        "teams/t1",
        json!({
            "title": "Cafe",
            "teamMasterId": "u1",
            "createdOn": {"seconds": 1_700_000_000, "nanoseconds": 0},
            "version": 1
        }),
    )
    .await;
    insert(&store, "teams/t2", json!({"title": "Bistro"})).await;
    seed(store.inner(), &links_collection(), &scenario_remote()).await;
    let service = service(&store);

    let mut summaries = service.list_profiles().await.unwrap();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].id, "t1");
    assert_eq!(summaries[0].master_id.as_deref(), Some("u1"));
    assert_eq!(
        summaries[0].created_on,
        Utc.timestamp_opt(1_700_000_000, 0).single()
    );
    assert_eq!(summaries[1].title.as_deref(), Some("Bistro"));
    assert_eq!(summaries[1].created_on, None);
}

#[tokio::test]
async fn summary_of_missing_profile_is_none() {
    let store = RecordingDocumentStore::new();
    insert(&store, "teams/t1", json!({"title": "Cafe"})).await;
    let service = service(&store);

    let summary = service.profile_summary("t1").await.unwrap().unwrap();
    assert_eq!(summary.title.as_deref(), Some("Cafe"));
    assert!(service.profile_summary("nobody").await.unwrap().is_none());

    store.fail_reads(true);
    assert!(service.profile_summary("t1").await.unwrap_err().is_fetch());
}

#[tokio::test]
async fn members_are_filtered_and_owner_first() {
    let store = RecordingDocumentStore::new();
    insert(&store, "users/u1", json!({"batchId": "t1", "name": "Ann"})).await;
    insert(
        &store,
        "users/u2",
        json!({"batchId": "t1", "name": "Bo", "isTeamMaster": true, "activeProfileId": "p1"}),
    )
    .await;
    insert(&store, "users/u3", json!({"batchId": "t9", "name": "Cy"})).await;
    insert(
        &store,
        "users/u4",
        json!({"batchId": "t1", "name": "Di", "activeProfileId": "gone", "lastLogin": 0}),
    )
    .await;
    insert(
        &store,
        "users/u2/profiles/p1",
        json!({"addedToContacts": 4, "contacts": 12}),
    )
    .await;
    let service = service(&store);

    let members = service.list_members("t1").await.unwrap();
    let ids: Vec<_> = members.iter().map(|member| member.id.as_str()).collect();
    assert_eq!(ids, vec!["u2", "u1", "u4"]);
    assert_eq!(store.query_calls(), 1);

    assert!(members[0].is_master());
    assert_eq!(members[0].added_to_contacts, Some(json!(4)));
    assert_eq!(members[0].contacts_count, Some(json!(12)));

    // Active profile that does not exist leaves the counters unset
    assert_eq!(members[2].contacts_count, None);
    assert_eq!(members[2].last_login, Utc.timestamp_opt(0, 0).single());
}

#[tokio::test]
async fn members_of_invalid_or_empty_profile() {
    let store = RecordingDocumentStore::new();
    let service = service(&store);

    assert!(service.list_members("t1").await.unwrap().is_empty());
    assert!(matches!(
        service.list_members("").await,
        Err(Error::InvalidInput(_))
    ));
}
