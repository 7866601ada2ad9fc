//! In-memory view caches with observable snapshots.
//!
//! A cache owns a mutex-guarded ordered collection of entries and publishes
//! a read-only copy through a `tokio::sync::watch` channel, so readers never
//! contend with mutators and `snapshot()` can never block on a refresh.
//! `ResumeCache` ("continue watching") is fed by playback events;
//! `NextUpCache` is refilled through coalesced refresh requests.

mod next_up;
mod resume;

pub use next_up::{NextUpCache, RefreshFetcher};
pub use resume::{PlaybackEvent, ResumeCache};

use std::cmp::Ordering;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::model::{normalize_played, MediaEntry};

/// Read-only copy of a view cache published to subscribers.
#[derive(Debug, Clone, Default)]
pub struct ViewCacheSnapshot {
  pub items: Vec<MediaEntry>,
  pub dirty: bool,
  pub satisfied_limit: usize,
}

/// Shared cache core: exclusive-access state plus a published snapshot.
pub(crate) struct ViewCache {
  state: Mutex<CacheState>,
  publisher: watch::Sender<ViewCacheSnapshot>,
}

struct CacheState {
  items: Vec<MediaEntry>,
  dirty: bool,
  satisfied_limit: usize,
}

impl ViewCache {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(CacheState {
        items: Vec::new(),
        dirty: true,
        satisfied_limit: 0,
      }),
      publisher: watch::Sender::new(ViewCacheSnapshot {
        items: Vec::new(),
        dirty: true,
        satisfied_limit: 0,
      }),
    }
  }

  /// Replace the snapshot wholesale and mark it fresh for `len(items)`.
  pub fn set_initial(&self, items: Vec<MediaEntry>) {
    let limit = items.len();
    self.set_initial_with_limit(limit, items);
  }

  /// Replace the snapshot wholesale, fresh for a caller-specified page size.
  pub fn set_initial_with_limit(&self, satisfied_limit: usize, mut items: Vec<MediaEntry>) {
    for entry in &mut items {
      normalize_played(entry);
    }
    let mut state = self.state.lock();
    state.items = items;
    state.dirty = false;
    state.satisfied_limit = satisfied_limit;
    self.publish(&state);
  }

  /// Up to `limit` items from the published snapshot. Pure read.
  pub fn snapshot(&self, limit: usize) -> Vec<MediaEntry> {
    let published = self.publisher.borrow();
    published.items.iter().take(limit).cloned().collect()
  }

  /// Whether a read of `limit` items is servable without a round trip.
  pub fn can_serve(&self, limit: usize) -> bool {
    let published = self.publisher.borrow();
    !published.dirty && published.satisfied_limit >= limit
  }

  /// Mark stale. Items stay visible until the next successful fill.
  pub fn invalidate(&self) {
    let mut state = self.state.lock();
    state.dirty = true;
    state.satisfied_limit = 0;
    self.publish(&state);
  }

  /// Subscribe to snapshot updates.
  pub fn subscribe(&self) -> watch::Receiver<ViewCacheSnapshot> {
    self.publisher.subscribe()
  }

  /// Run a read-modify-write on the guarded state, then publish.
  pub fn mutate<R>(&self, f: impl FnOnce(&mut Vec<MediaEntry>) -> R) -> R {
    let mut state = self.state.lock();
    let result = f(&mut state.items);
    for entry in &mut state.items {
      normalize_played(entry);
    }
    self.publish(&state);
    result
  }

  /// Re-sort by last played time, most recent first, never-played last.
  pub fn resort(&self) {
    self.mutate(|items| {
      items.sort_by(recency_order);
    });
  }

  fn publish(&self, state: &CacheState) {
    self.publisher.send_replace(ViewCacheSnapshot {
      items: state.items.clone(),
      dirty: state.dirty,
      satisfied_limit: state.satisfied_limit,
    });
  }
}

fn recency_order(a: &MediaEntry, b: &MediaEntry) -> Ordering {
  match (a.playback.last_played_at, b.playback.last_played_at) {
    (Some(x), Some(y)) => y.cmp(&x),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}
