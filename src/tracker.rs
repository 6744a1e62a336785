//! Work tracking: which items are in flight and which are done.
//!
//! An identity is *pending* from admission until its dispatch resolves, and
//! *finalized* once its verdict is attached to the node. Admission refuses
//! both, which is what keeps an item from being analyzed twice in a session.
//!
//! The tracker is single-writer. It is owned by the engine, and the engine
//! is only ever driven through `&mut`, so no locking is needed.

use std::collections::HashSet;

use crate::model::ItemIdentity;

/// Where an identity stands in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Never admitted, or finalized state was reset.
    Untracked,
    /// Admitted and waiting on its analysis.
    Pending,
    /// Verdict attached. Terminal until `reset`.
    Finalized,
}

#[derive(Debug, Default)]
pub struct WorkTracker {
    pending: HashSet<ItemIdentity>,
    finalized: HashSet<ItemIdentity>,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an identity for dispatch. Returns false if it is already pending
    /// or finalized; otherwise marks it pending and returns true.
    ///
    /// Every `true` must be paired with a [`WorkTracker::release`]. Prefer
    /// [`WorkTracker::admit`], which pairs them automatically.
    pub fn try_admit(&mut self, identity: &ItemIdentity) -> bool {
        if self.finalized.contains(identity) {
            return false;
        }
        self.pending.insert(identity.clone())
    }

    /// Scoped admission: the identity leaves the pending set when the
    /// returned guard is dropped, whatever happened in between.
    pub fn admit(&mut self, identity: &ItemIdentity) -> Option<Admission<'_>> {
        if !self.try_admit(identity) {
            return None;
        }
        Some(Admission {
            tracker: self,
            identity: identity.clone(),
        })
    }

    pub fn release(&mut self, identity: &ItemIdentity) {
        self.pending.remove(identity);
    }

    /// Idempotent.
    pub fn finalize(&mut self, identity: &ItemIdentity) {
        self.finalized.insert(identity.clone());
    }

    /// Forget every finalized identity. Pending work is left alone.
    pub fn reset(&mut self) {
        self.finalized.clear();
    }

    pub fn state(&self, identity: &ItemIdentity) -> ItemState {
        if self.pending.contains(identity) {
            ItemState::Pending
        } else if self.finalized.contains(identity) {
            ItemState::Finalized
        } else {
            ItemState::Untracked
        }
    }

    pub fn is_finalized(&self, identity: &ItemIdentity) -> bool {
        self.finalized.contains(identity)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn finalized_count(&self) -> usize {
        self.finalized.len()
    }
}

/// Guard for one admitted identity. Dropping it releases the identity.
pub struct Admission<'a> {
    tracker: &'a mut WorkTracker,
    identity: ItemIdentity,
}

impl Admission<'_> {
    pub fn identity(&self) -> &ItemIdentity {
        &self.identity
    }

    pub fn finalize(&mut self) {
        self.tracker.finalize(&self.identity);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.tracker.release(&self.identity);
    }
}
