//! Events emitted while syncing
//!
//! Events are delivered over a bounded channel for external monitoring.
//! Delivery is best effort: when the channel is full the event is dropped
//! with a warning, and sync operations never wait on a slow consumer.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{OperationKind, WriteTarget};
use crate::freshness::{Freshness, VersionMarker};
use crate::model::ItemId;

/// Events emitted by the reconciler and the profile service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A reconcile pass planned its operations
    ReconcileStarted {
        collection: String,
        operations: usize,
    },

    /// One create/update/delete succeeded
    OperationApplied {
        kind: OperationKind,
        target: WriteTarget,
    },

    /// One create/update/delete failed
    OperationFailed {
        kind: OperationKind,
        target: WriteTarget,
        error: String,
    },

    /// A desired item names an id that no longer exists remotely
    StaleReference { collection: String, id: ItemId },

    /// A reconcile pass finished
    ReconcileFinished {
        collection: String,
        applied: usize,
        failed: usize,
    },

    /// A local marker was compared with a remote one
    FreshnessChecked {
        profile_id: String,
        freshness: Freshness,
    },

    /// The remote write succeeded but the local marker could not be stored
    MarkerDiverged {
        profile_id: String,
        marker: VersionMarker,
        error: String,
    },
}

/// Sending half of the event channel
///
/// A sink without a channel discards everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<SyncEvent>>,
}

impl EventSink {
    /// Create a sink and the receiver for its events
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Emit an event without waiting
    pub fn emit(&self, event: SyncEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
            // Receiver dropped; nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
