//! Journal of in-flight optimistic mutations.
//!
//! Each entry records a local write whose remote confirmation is still
//! outstanding. Entries are removed only once the remote call has
//! terminated, so an external drain can replay `list_all()` after a
//! connectivity loss without losing actions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Kind of user-data mutation tracked by the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
  Favorite,
  Played,
  Watchlist,
}

/// One in-flight mutation. At most one exists per (media, kind).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
  pub media_id: String,
  pub kind: PendingKind,
  pub value: bool,
  pub queued_at: DateTime<Utc>,
}

/// Insertion-ordered set of pending actions.
#[derive(Default)]
pub struct PendingJournal {
  entries: Mutex<Vec<PendingAction>>,
}

impl PendingJournal {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace the entry for (media_id, kind). Last writer wins;
  /// a replaced entry keeps its original position.
  pub fn upsert(&self, action: PendingAction) {
    let mut entries = self.entries.lock();
    match entries
      .iter_mut()
      .find(|e| e.media_id == action.media_id && e.kind == action.kind)
    {
      Some(slot) => *slot = action,
      None => entries.push(action),
    }
  }

  /// Drop the entry once its remote call has terminated.
  pub fn remove(&self, media_id: &str, kind: PendingKind) {
    self
      .entries
      .lock()
      .retain(|e| !(e.media_id == media_id && e.kind == kind));
  }

  /// All entries in insertion order.
  pub fn list_all(&self) -> Vec<PendingAction> {
    self.entries.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }
}
