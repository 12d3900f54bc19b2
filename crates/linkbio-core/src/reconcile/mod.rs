//! Collection reconciler
//!
//! Converges a remote collection to a desired list of items with the
//! smallest set of creates, updates and deletes.
//!
//! ## Pass
//!
//! 1. Read a fresh snapshot of the collection (failure aborts, nothing written)
//! 2. [`plan`] the operations against that snapshot
//! 3. Dispatch every operation concurrently and wait for all of them
//! 4. Collect per-operation failures; successful writes are never rolled back
//!
//! Items are correlated by id only. A desired item without an id is always
//! created, so a pass over its own output is a no-op only once the caller
//! feeds back the ids reported in [`ReconcileReport::created`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{Error, OperationKind, Result, WriteFailure, WriteTarget};
use crate::event::{EventSink, SyncEvent};
use crate::model::{CollectionPath, Filter, Item, ItemId, WriteMode};
use crate::traits::DocumentStore;

/// A single planned write
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create a new remote document for the desired item at `index`
    Create { index: usize, item: Item },
    /// Replace the remote document `id` with `item`
    Update { id: ItemId, item: Item },
    /// Delete the remote document `id`
    Delete { id: ItemId },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    pub fn target(&self) -> WriteTarget {
        match self {
            Operation::Create { index, .. } => WriteTarget::New { index: *index },
            Operation::Update { id, .. } | Operation::Delete { id } => {
                WriteTarget::Existing(id.clone())
            }
        }
    }
}

/// Operations computed for one desired list against one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Creates and updates in desired order, then deletes in snapshot order
    pub operations: Vec<Operation>,
    /// Desired ids whose remote document already matches
    pub unchanged: Vec<ItemId>,
    /// Desired ids with no remote document; no operation is planned for them
    pub stale_references: Vec<ItemId>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of planned operations of `kind`
    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }
}

/// Compute the operations converging `snapshot` to `desired`
///
/// Desired items are normalized first, so envelope keys carried inside
/// their fields never cause an update.
///
/// # Errors
///
/// [`Error::InvalidInput`] if two desired items carry the same id.
pub fn plan(desired: &[Item], snapshot: &[Item]) -> Result<Plan> {
    let mut seen = HashSet::new();
    for item in desired {
        if let Some(id) = &item.id {
            if !seen.insert(id) {
                return Err(Error::invalid_input(format!(
                    "Item id {} appears more than once in the desired list",
                    id
                )));
            }
        }
    }

    let remote: HashMap<&ItemId, &Item> = snapshot
        .iter()
        .filter_map(|item| item.id.as_ref().map(|id| (id, item)))
        .collect();

    let mut plan = Plan::default();

    for (index, item) in desired.iter().enumerate() {
        let item = item.clone().normalized();
        let Some(id) = item.id.clone() else {
            plan.operations.push(Operation::Create { index, item });
            continue;
        };
        match remote.get(&id) {
            Some(current) if **current == item => plan.unchanged.push(id),
            Some(_) => plan.operations.push(Operation::Update { id, item }),
            None => plan.stale_references.push(id),
        }
    }

    for item in snapshot {
        if let Some(id) = &item.id {
            if !seen.contains(id) {
                plan.operations.push(Operation::Delete { id: id.clone() });
            }
        }
    }

    Ok(plan)
}

/// Outcome of a fully successful reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids generated for new items, in desired order
    pub created: Vec<ItemId>,
    pub updated: Vec<ItemId>,
    pub deleted: Vec<ItemId>,
    pub unchanged: Vec<ItemId>,
    /// Desired ids that were skipped because they no longer exist remotely
    pub stale_references: Vec<ItemId>,
}

impl ReconcileReport {
    /// Number of writes performed
    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    pub fn has_stale_references(&self) -> bool {
        !self.stale_references.is_empty()
    }
}

/// Reconciles remote collections through a document store
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    events: EventSink,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            events: EventSink::disabled(),
        }
    }

    /// Emit progress events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Plan against a fresh snapshot without writing anything
    pub async fn preview(&self, collection: &CollectionPath, desired: &[Item]) -> Result<Plan> {
        let snapshot = self.snapshot(collection).await?;
        plan(desired, &snapshot)
    }

    /// Converge `collection` to `desired`
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileReport)`: every planned write succeeded
    /// - `Err(Error::Fetch)`: the snapshot could not be read; nothing was written
    /// - `Err(Error::InvalidInput)`: duplicate ids in `desired`; nothing was read or written
    /// - `Err(Error::Write)`: some writes failed; the others were applied
    pub async fn reconcile(
        &self,
        collection: &CollectionPath,
        desired: &[Item],
    ) -> Result<ReconcileReport> {
        // Reject bad input before touching the store
        plan(desired, &[])?;

        let snapshot = self.snapshot(collection).await?;
        let plan = plan(desired, &snapshot)?;

        for id in &plan.stale_references {
            warn!(
                "Skipping {} in {}: no remote document with this id",
                id, collection
            );
            self.events.emit(SyncEvent::StaleReference {
                collection: collection.to_string(),
                id: id.clone(),
            });
        }

        let attempted = plan.operations.len();
        info!(
            "Reconciling {}: {} create, {} update, {} delete, {} unchanged",
            collection,
            plan.count(OperationKind::Create),
            plan.count(OperationKind::Update),
            plan.count(OperationKind::Delete),
            plan.unchanged.len()
        );
        self.events.emit(SyncEvent::ReconcileStarted {
            collection: collection.to_string(),
            operations: attempted,
        });

        // All tasks are spawned before any is awaited
        let handles: Vec<_> = plan
            .operations
            .into_iter()
            .map(|op| {
                let kind = op.kind();
                let target = op.target();
                let store = self.store.clone();
                let collection = collection.clone();
                let handle =
                    tokio::spawn(async move { apply(store.as_ref(), &collection, op).await });
                (kind, target, handle)
            })
            .collect();

        let mut report = ReconcileReport {
            unchanged: plan.unchanged,
            stale_references: plan.stale_references,
            ..ReconcileReport::default()
        };
        let mut failures = Vec::new();

        for (kind, target, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Other(format!("Write task aborted: {}", e))),
            };

            match outcome {
                Ok(created) => {
                    debug!("Applied {} {}", kind, target);
                    match (kind, created, &target) {
                        (OperationKind::Create, Some(id), _) => report.created.push(id),
                        (OperationKind::Update, _, WriteTarget::Existing(id)) => {
                            report.updated.push(id.clone())
                        }
                        (OperationKind::Delete, _, WriteTarget::Existing(id)) => {
                            report.deleted.push(id.clone())
                        }
                        _ => {}
                    }
                    self.events.emit(SyncEvent::OperationApplied { kind, target });
                }
                Err(e) => {
                    error!("Failed to {} {} in {}: {}", kind, target, collection, e);
                    self.events.emit(SyncEvent::OperationFailed {
                        kind,
                        target: target.clone(),
                        error: e.to_string(),
                    });
                    failures.push(WriteFailure {
                        kind,
                        target,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.events.emit(SyncEvent::ReconcileFinished {
            collection: collection.to_string(),
            applied: attempted - failures.len(),
            failed: failures.len(),
        });

        if failures.is_empty() {
            info!("Reconciled {}: {} write(s)", collection, report.writes());
            Ok(report)
        } else {
            Err(Error::Write {
                attempted,
                failures,
            })
        }
    }

    async fn snapshot(&self, collection: &CollectionPath) -> Result<Vec<Item>> {
        let documents = self
            .store
            .query(collection, &Filter::All)
            .await
            .map_err(|e| {
                Error::fetch(format!(
                    "Failed to read {} from {}: {}",
                    collection,
                    self.store.store_name(),
                    e
                ))
            })?;
        debug!("Snapshot of {}: {} document(s)", collection, documents.len());
        Ok(documents.into_iter().map(Item::from_document).collect())
    }
}

/// Perform one operation, returning the generated id of a create
async fn apply(
    store: &dyn DocumentStore,
    collection: &CollectionPath,
    op: Operation,
) -> Result<Option<ItemId>> {
    match op {
        Operation::Create { item, .. } => {
            let id = store.create(collection, item.to_document_fields()).await?;
            Ok(Some(ItemId::new(id)))
        }
        Operation::Update { id, item } => {
            let path = collection.doc(id.as_str());
            store
                .set(&path, item.to_document_fields(), WriteMode::Replace)
                .await?;
            Ok(None)
        }
        Operation::Delete { id } => {
            store.delete(&collection.doc(id.as_str())).await?;
            Ok(None)
        }
    }
}
