//! Structured events emitted by the engine as it decides what to do with
//! each candidate.
//!
//! Consumers subscribe to build dashboards, audit trails, or test
//! assertions. Events are best-effort: with no subscriber they are dropped,
//! and a slow subscriber may observe a lag gap in the sequence numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::engine::{CycleReport, Trigger};
use crate::model::{Category, ContentKey, ItemIdentity};

/// A structured event emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CycleStarted {
        cycle: u64,
        trigger: Trigger,
    },
    CycleCompleted {
        cycle: u64,
        report: CycleReport,
    },
    ExtractionFailed {
        error: String,
    },
    /// The node already carried a verdict; finalized without dispatch.
    AlreadyAnnotated {
        identity: ItemIdentity,
    },
    CacheHit {
        identity: ItemIdentity,
        content_key: ContentKey,
    },
    AdmissionRefused {
        identity: ItemIdentity,
    },
    Dispatched {
        identity: ItemIdentity,
        content_key: ContentKey,
    },
    Annotated {
        identity: ItemIdentity,
        category: Category,
        origin: String,
    },
    AnnotationFailed {
        identity: ItemIdentity,
        error: String,
    },
    CacheCleared,
    CacheEvicted {
        removed: usize,
    },
    ReprocessRequested {
        cleared_annotations: usize,
    },
}

/// Sequencing broadcast sender.
pub(crate) struct EventBus {
    tx: broadcast::Sender<Event>,
    next_seq: u64,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, next_seq: 1 }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&mut self, kind: EventKind) {
        let event = Event {
            seq: self.next_seq,
            timestamp: Utc::now(),
            kind,
        };
        self.next_seq += 1;
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}
