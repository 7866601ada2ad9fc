//! "Next up" cache refilled through coalesced refresh requests.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use super::{ViewCache, ViewCacheSnapshot};
use crate::coalesce::Coalescer;
use crate::error::Result;
use crate::model::MediaEntry;

/// Type-erased refresh callback: given a page size, returns fresh entries,
/// or `None` to keep the current snapshot.
pub type RefreshFetcher =
  Arc<dyn Fn(usize) -> BoxFuture<'static, Result<Option<Vec<MediaEntry>>>> + Send + Sync>;

struct RefreshRequest {
  limit: usize,
  fetcher: RefreshFetcher,
}

/// Cache of upcoming episodes, refilled by the last refresh request to
/// arrive within a quiet window.
pub struct NextUpCache {
  cache: Arc<ViewCache>,
  refresh: Coalescer<RefreshRequest>,
}

impl NextUpCache {
  pub fn new(debounce: Duration) -> Self {
    let cache = Arc::new(ViewCache::new());

    let fill_target = cache.clone();
    let refresh = Coalescer::spawn(debounce, move |request: RefreshRequest| {
      let cache = fill_target.clone();
      async move {
        match (request.fetcher)(request.limit).await {
          Ok(Some(items)) => {
            cache.set_initial_with_limit(request.limit, items);
            Ok(())
          }
          // No update; keep the current snapshot.
          Ok(None) => Ok(()),
          Err(e) => Err(e),
        }
      }
    });

    Self { cache, refresh }
  }

  /// Replace the snapshot wholesale, fresh for the given page size.
  pub fn set_initial_with_limit(&self, limit: usize, items: Vec<MediaEntry>) {
    self.cache.set_initial_with_limit(limit, items);
  }

  /// Up to `limit` items from the current snapshot. Pure read.
  pub fn snapshot(&self, limit: usize) -> Vec<MediaEntry> {
    self.cache.snapshot(limit)
  }

  /// Whether a read of `limit` items is servable from cache.
  pub fn can_serve(&self, limit: usize) -> bool {
    self.cache.can_serve(limit)
  }

  /// Mark stale without clearing the visible items.
  pub fn invalidate(&self) {
    self.cache.invalidate();
  }

  /// Subscribe to snapshot updates.
  pub fn subscribe(&self) -> watch::Receiver<ViewCacheSnapshot> {
    self.cache.subscribe()
  }

  /// Queue a debounced refresh. Bursts collapse to the last request.
  pub fn request_refresh(&self, limit: usize, fetcher: RefreshFetcher) {
    self.refresh.submit(RefreshRequest { limit, fetcher });
  }

  /// Stop the refresh worker.
  pub fn shutdown(&self) {
    self.refresh.shutdown();
  }
}
