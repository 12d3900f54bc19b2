//! Contract Test: Reconcile Idempotency
//!
//! Constraints verified:
//! - A second pass with the converged list issues zero writes
//! - After a pass, the remote id set equals the desired ids plus the
//!   generated ones (completeness)
//! - Every remote id absent from the desired list is deleted exactly once
//!
//! If this test fails, repeated saves would churn the remote collection.

mod common;

use common::*;
use linkbio_core::model::{Item, ItemId};
use linkbio_core::reconcile::{Reconciler, plan};
use std::collections::HashSet;
use std::sync::Arc;

/// Give created items the ids the store generated for them
fn converged(desired: &[Item], created: &[ItemId]) -> Vec<Item> {
    let mut created = created.iter();
    desired
        .iter()
        .map(|item| match &item.id {
            Some(_) => item.clone(),
            None => item.clone().with_id(created.next().unwrap().clone()),
        })
        .collect()
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let store = RecordingDocumentStore::new();
    let links = links_collection();
    seed(store.inner(), &links, &scenario_remote()).await;

    let reconciler = Reconciler::new(Arc::new(store.clone()));
    let desired = vec![
        link(Some("a"), "x", 3),
        link(None, "z", 2),
        link(None, "w", 4),
    ];
    let first = reconciler.reconcile(&links, &desired).await.unwrap();
    assert_eq!(first.writes(), 4);

    store.reset_counters();
    let again = converged(&desired, &first.created);
    let second = reconciler.reconcile(&links, &again).await.unwrap();

    assert_eq!(store.write_calls(), 0, "converged list must not write");
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged.len(), 3);
}

#[tokio::test]
async fn remote_ids_match_desired_after_pass() {
    let store = RecordingDocumentStore::new();
    let links = links_collection();
    seed(
        store.inner(),
        &links,
        &[
            link(Some("a"), "x", 0),
            link(Some("b"), "y", 1),
            link(Some("c"), "q", 2),
        ],
    )
    .await;

    let reconciler = Reconciler::new(Arc::new(store.clone()));
    let desired = vec![link(Some("c"), "q", 0), link(None, "new", 1)];
    let report = reconciler.reconcile(&links, &desired).await.unwrap();

    let mut expected: HashSet<ItemId> = ids(&desired);
    expected.extend(report.created.iter().cloned());
    assert_eq!(ids(&snapshot(store.inner(), &links).await), expected);
}

#[test]
fn each_missing_id_is_deleted_exactly_once() {
    let remote = vec![
        link(Some("a"), "x", 0),
        link(Some("b"), "y", 1),
        link(Some("c"), "z", 2),
    ];
    let desired = vec![link(Some("b"), "y", 1)];
    let plan = plan(&desired, &remote).unwrap();

    let targets: Vec<String> = plan
        .operations
        .iter()
        .map(|op| op.target().to_string())
        .collect();
    assert_eq!(targets, vec!["a", "c"]);
    assert!(plan.unchanged.contains(&ItemId::from("b")));
}

#[test]
fn deep_equal_items_are_never_updated() {
    let remote = scenario_remote();
    let plan = plan(&remote, &remote).unwrap();
    assert!(plan.is_noop());
    assert_eq!(plan.unchanged.len(), 2);
}
