//! Optimistic user-data mutations with rollback.
//!
//! A toggle is applied to the local store first so the UI reflects it with
//! zero perceived latency, journaled while the remote call is in flight,
//! then committed or rolled back when the call terminates. Failures are
//! never swallowed here; every one rolls the entry back and reaches the
//! caller. Retry/backoff belongs to an external drain reading the journal.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::{NextUpCache, RefreshFetcher};
use crate::error::{CoreError, Result};
use crate::journal::{PendingAction, PendingJournal, PendingKind};
use crate::model::MediaEntry;
use crate::store::EntryStore;

/// Remote user-data endpoints consumed by the coordinator.
pub trait UserDataRemote: Send + Sync {
  fn push_favorite(&self, media_id: &str, value: bool) -> impl Future<Output = Result<()>> + Send;

  fn push_played(&self, media_id: &str, value: bool) -> impl Future<Output = Result<()>> + Send;

  fn push_watchlist(&self, media_id: &str, value: bool)
    -> impl Future<Output = Result<()>> + Send;

  /// Item detail fetch used to populate a synthesized entry.
  fn fetch_entry(&self, media_id: &str) -> impl Future<Output = Result<MediaEntry>> + Send;
}

impl UserDataRemote for crate::jellyfin::ApiClient {
  async fn push_favorite(&self, media_id: &str, value: bool) -> Result<()> {
    self.set_favorite_remote(media_id, value).await
  }

  async fn push_played(&self, media_id: &str, value: bool) -> Result<()> {
    self.set_played_remote(media_id, value).await
  }

  async fn push_watchlist(&self, media_id: &str, value: bool) -> Result<()> {
    self.set_watchlist_remote(media_id, value).await
  }

  async fn fetch_entry(&self, media_id: &str) -> Result<MediaEntry> {
    self.get_entry(media_id).await
  }
}

/// Wiring for the next-up side effect of played mutations.
pub struct NextUpHook {
  pub cache: Arc<NextUpCache>,
  pub fetcher: RefreshFetcher,
  pub limit: usize,
}

/// Coordinates local-first toggles of favorite / played / watchlist.
pub struct MutationCoordinator<S, R> {
  inner: Arc<Inner<S, R>>,
}

struct Inner<S, R> {
  store: Arc<S>,
  remote: Arc<R>,
  journal: Arc<PendingJournal>,
  item_locks: parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
  next_up: Option<NextUpHook>,
}

impl<S, R> MutationCoordinator<S, R>
where
  S: EntryStore + 'static,
  R: UserDataRemote + 'static,
{
  pub fn new(
    store: Arc<S>,
    remote: Arc<R>,
    journal: Arc<PendingJournal>,
    next_up: Option<NextUpHook>,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        remote,
        journal,
        item_locks: parking_lot::Mutex::new(HashMap::new()),
        next_up,
      }),
    }
  }

  pub async fn toggle_favorite(&self, user_id: &str, media_id: &str, value: bool) -> Result<()> {
    self.mutate(user_id, media_id, PendingKind::Favorite, value).await
  }

  pub async fn mark_as_played(&self, user_id: &str, media_id: &str, value: bool) -> Result<()> {
    self.mutate(user_id, media_id, PendingKind::Played, value).await
  }

  pub async fn set_watchlist_local(&self, user_id: &str, media_id: &str, value: bool) -> Result<()> {
    self.mutate(user_id, media_id, PendingKind::Watchlist, value).await
  }

  /// Snapshot of the in-flight mutations, for an external drain.
  pub fn pending_actions(&self) -> Vec<PendingAction> {
    self.inner.journal.list_all()
  }

  /// Run the mutation on a detached task: a caller abandoning the returned
  /// future cannot abort the write mid-flight, so the commit or rollback
  /// always completes and the journal never holds a terminated action.
  async fn mutate(&self, user_id: &str, media_id: &str, kind: PendingKind, value: bool) -> Result<()> {
    let task = tokio::spawn(self.inner.clone().run(
      user_id.to_string(),
      media_id.to_string(),
      kind,
      value,
    ));
    match task.await {
      Ok(result) => result,
      Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
      Err(_) => Err(CoreError::Validation("Mutation task cancelled".to_string())),
    }
  }
}

impl<S: EntryStore, R: UserDataRemote> Inner<S, R> {
  async fn run(self: Arc<Self>, user_id: String, media_id: String, kind: PendingKind, value: bool) -> Result<()> {
    // Best-effort detail prefetch happens before the critical section so
    // the item lock never spans a network call. Only the favorite path
    // fetches; the others settle for a bare placeholder.
    let prefetched = if kind == PendingKind::Favorite
      && self.store.get(&user_id, &media_id).await?.is_none()
    {
      match self.remote.fetch_entry(&media_id).await {
        Ok(entry) => Some(entry),
        Err(e) => {
          log::warn!("Detail fetch for {} failed, using placeholder: {}", media_id, e);
          None
        }
      }
    } else {
      None
    };

    let item_lock = self.item_lock(&media_id);

    // Steps 1-4: read, snapshot for rollback, speculative write, journal
    // entry. One critical section per item so concurrent toggles of
    // different kinds cannot corrupt each other's fields.
    let previous = {
      let _guard = item_lock.lock().await;

      let existing = self.store.get(&user_id, &media_id).await?;
      let mut entry = existing
        .clone()
        .or(prefetched)
        .unwrap_or_else(|| MediaEntry::placeholder(&media_id));

      apply_toggle(&mut entry, kind, value);
      self.store.upsert(&user_id, &entry).await?;

      self.journal.upsert(PendingAction {
        media_id: media_id.clone(),
        kind,
        value,
        queued_at: Utc::now(),
      });

      existing
    };

    // Step 5: the remote call runs outside any lock.
    let outcome = match kind {
      PendingKind::Favorite => self.remote.push_favorite(&media_id, value).await,
      PendingKind::Played => self.remote.push_played(&media_id, value).await,
      PendingKind::Watchlist => self.remote.push_watchlist(&media_id, value).await,
    };

    match outcome {
      Ok(()) => {
        // Step 6: the value is confirmed; only the pending flag clears.
        self.journal.remove(&media_id, kind);
        {
          let _guard = item_lock.lock().await;
          if let Some(mut entry) = self.store.get(&user_id, &media_id).await? {
            clear_pending(&mut entry, kind);
            self.store.upsert(&user_id, &entry).await?;
          }
        }

        if kind == PendingKind::Played {
          self.request_next_up_refresh(value);
        }
        Ok(())
      }
      Err(remote_err) => {
        // Step 7: restore the pre-call state, or drop the synthesized
        // placeholder, then surface the failure unchanged.
        {
          let _guard = item_lock.lock().await;
          let restore = match &previous {
            Some(prev) => self.store.upsert(&user_id, prev).await,
            None => self.store.delete(&user_id, &media_id).await,
          };
          if let Err(store_err) = restore {
            log::error!("Rollback of {} failed: {}", media_id, store_err);
          }
        }
        self.journal.remove(&media_id, kind);
        Err(remote_err)
      }
    }
  }

  /// Played-state changes alter next-up eligibility. A completion moves the
  /// next-up head, so that direction invalidates before refreshing.
  fn request_next_up_refresh(&self, completed: bool) {
    if let Some(hook) = &self.next_up {
      if completed {
        hook.cache.invalidate();
      }
      hook.cache.request_refresh(hook.limit, hook.fetcher.clone());
    }
  }

  fn item_lock(&self, media_id: &str) -> Arc<AsyncMutex<()>> {
    self
      .item_locks
      .lock()
      .entry(media_id.to_string())
      .or_insert_with(|| Arc::new(AsyncMutex::new(())))
      .clone()
  }
}

fn apply_toggle(entry: &mut MediaEntry, kind: PendingKind, value: bool) {
  match kind {
    PendingKind::Favorite => {
      entry.playback.is_favorite = value;
      entry.playback.pending_favorite = true;
    }
    PendingKind::Played => {
      entry.playback.played = value;
      entry.playback.pending_played = true;
      if value {
        entry.playback.play_count += 1;
      }
    }
    PendingKind::Watchlist => {
      entry.playback.is_watchlisted = value;
      entry.playback.pending_watchlist = true;
    }
  }
}

fn clear_pending(entry: &mut MediaEntry, kind: PendingKind) {
  match kind {
    PendingKind::Favorite => entry.playback.pending_favorite = false,
    PendingKind::Played => entry.playback.pending_played = false,
    PendingKind::Watchlist => entry.playback.pending_watchlist = false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CoreError;
  use crate::store::MemoryStore;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::time::Duration;

  const USER: &str = "u1";

  /// Remote fake: fails on demand, optionally answers detail fetches.
  #[derive(Default)]
  struct FakeRemote {
    fail_writes: AtomicBool,
    fail_fetch: AtomicBool,
  }

  impl FakeRemote {
    fn failing_writes() -> Self {
      let remote = Self::default();
      remote.fail_writes.store(true, Ordering::SeqCst);
      remote
    }

    async fn write(&self) -> Result<()> {
      if self.fail_writes.load(Ordering::SeqCst) {
        Err(CoreError::Remote("server said no".to_string()))
      } else {
        Ok(())
      }
    }
  }

  impl UserDataRemote for FakeRemote {
    async fn push_favorite(&self, _media_id: &str, _value: bool) -> Result<()> {
      self.write().await
    }

    async fn push_played(&self, _media_id: &str, _value: bool) -> Result<()> {
      self.write().await
    }

    async fn push_watchlist(&self, _media_id: &str, _value: bool) -> Result<()> {
      self.write().await
    }

    async fn fetch_entry(&self, media_id: &str) -> Result<MediaEntry> {
      if self.fail_fetch.load(Ordering::SeqCst) {
        return Err(CoreError::NetworkUnavailable);
      }
      let mut entry = MediaEntry::placeholder(media_id);
      entry.name = "Fetched".to_string();
      Ok(entry)
    }
  }

  fn coordinator(
    store: Arc<MemoryStore>,
    remote: Arc<FakeRemote>,
  ) -> MutationCoordinator<MemoryStore, FakeRemote> {
    MutationCoordinator::new(store, remote, Arc::new(PendingJournal::new()), None)
  }

  #[tokio::test]
  async fn test_success_confirms_value_and_clears_pending() {
    let store = Arc::new(MemoryStore::new());
    store.upsert(USER, &MediaEntry::placeholder("m1")).await.unwrap();
    let coordinator = coordinator(store.clone(), Arc::new(FakeRemote::default()));

    coordinator.toggle_favorite(USER, "m1", true).await.unwrap();

    let entry = store.get(USER, "m1").await.unwrap().unwrap();
    assert!(entry.playback.is_favorite);
    assert!(!entry.playback.pending_favorite);
    assert!(coordinator.pending_actions().is_empty());
  }

  #[tokio::test]
  async fn test_failure_restores_exact_previous_state() {
    let store = Arc::new(MemoryStore::new());
    let mut original = MediaEntry::placeholder("m1");
    original.playback.play_count = 3;
    store.upsert(USER, &original).await.unwrap();

    let coordinator = coordinator(store.clone(), Arc::new(FakeRemote::failing_writes()));
    let result = coordinator.toggle_favorite(USER, "m1", true).await;

    assert!(matches!(result, Err(CoreError::Remote(_))));
    let entry = store.get(USER, "m1").await.unwrap().unwrap();
    assert_eq!(entry, original);
    assert!(coordinator.pending_actions().is_empty());
  }

  #[tokio::test]
  async fn test_failure_deletes_synthesized_placeholder() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::failing_writes());
    remote.fail_fetch.store(true, Ordering::SeqCst);

    let coordinator = coordinator(store.clone(), remote);
    let result = coordinator.toggle_favorite(USER, "m-new", true).await;

    assert!(result.is_err());
    assert!(store.get(USER, "m-new").await.unwrap().is_none());
    assert!(coordinator.pending_actions().is_empty());
  }

  #[tokio::test]
  async fn test_favorite_on_unknown_item_prefetches_detail() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator(store.clone(), Arc::new(FakeRemote::default()));

    coordinator.toggle_favorite(USER, "m-new", true).await.unwrap();

    let entry = store.get(USER, "m-new").await.unwrap().unwrap();
    assert_eq!(entry.name, "Fetched");
    assert!(entry.playback.is_favorite);
  }

  #[tokio::test]
  async fn test_failed_prefetch_is_non_fatal() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::default());
    remote.fail_fetch.store(true, Ordering::SeqCst);

    let coordinator = coordinator(store.clone(), remote);
    coordinator.toggle_favorite(USER, "m-new", true).await.unwrap();

    let entry = store.get(USER, "m-new").await.unwrap().unwrap();
    assert_eq!(entry.name, "Unknown");
    assert!(entry.playback.is_favorite);
  }

  #[tokio::test]
  async fn test_terminated_call_leaves_no_journal_residue() {
    let store = Arc::new(MemoryStore::new());
    store.upsert(USER, &MediaEntry::placeholder("m1")).await.unwrap();
    let journal = Arc::new(PendingJournal::new());
    let coordinator = MutationCoordinator::new(
      store.clone(),
      Arc::new(FakeRemote::default()),
      journal.clone(),
      None,
    );

    coordinator.mark_as_played(USER, "m1", true).await.unwrap();

    assert!(journal.is_empty());
    let entry = store.get(USER, "m1").await.unwrap().unwrap();
    assert!(entry.playback.played);
    assert_eq!(entry.playback.play_count, 1);
  }

  /// Remote whose writes block until the test releases them.
  struct GatedRemote {
    release: tokio::sync::Semaphore,
  }

  impl Default for GatedRemote {
    fn default() -> Self {
      Self {
        release: tokio::sync::Semaphore::new(0),
      }
    }
  }

  impl UserDataRemote for GatedRemote {
    async fn push_favorite(&self, _media_id: &str, _value: bool) -> Result<()> {
      let _permit = self.release.acquire().await.unwrap();
      Ok(())
    }

    async fn push_played(&self, _media_id: &str, _value: bool) -> Result<()> {
      let _permit = self.release.acquire().await.unwrap();
      Ok(())
    }

    async fn push_watchlist(&self, _media_id: &str, _value: bool) -> Result<()> {
      let _permit = self.release.acquire().await.unwrap();
      Ok(())
    }

    async fn fetch_entry(&self, media_id: &str) -> Result<MediaEntry> {
      Ok(MediaEntry::placeholder(media_id))
    }
  }

  #[tokio::test]
  async fn test_optimistic_value_visible_before_remote_resolves() {
    let store = Arc::new(MemoryStore::new());
    store.upsert(USER, &MediaEntry::placeholder("m1")).await.unwrap();
    let journal = Arc::new(PendingJournal::new());
    let remote = Arc::new(GatedRemote::default());
    let coordinator = MutationCoordinator::new(store.clone(), remote.clone(), journal.clone(), None);

    let call = coordinator.toggle_favorite(USER, "m1", true);
    tokio::pin!(call);

    // Poll the mutation forward until the speculative write lands.
    while journal.is_empty() {
      tokio::select! {
        biased;
        _ = &mut call => panic!("remote is gated, call cannot finish yet"),
        _ = tokio::task::yield_now() => {}
      }
    }

    let entry = store.get(USER, "m1").await.unwrap().unwrap();
    assert!(entry.playback.is_favorite);
    assert!(entry.playback.pending_favorite);
    assert_eq!(journal.len(), 1);

    remote.release.add_permits(1);
    call.await.unwrap();

    let entry = store.get(USER, "m1").await.unwrap().unwrap();
    assert!(entry.playback.is_favorite);
    assert!(!entry.playback.pending_favorite);
    assert!(journal.is_empty());
  }

  #[tokio::test]
  async fn test_abandoned_call_still_commits() {
    let store = Arc::new(MemoryStore::new());
    store.upsert(USER, &MediaEntry::placeholder("m1")).await.unwrap();
    let journal = Arc::new(PendingJournal::new());
    let remote = Arc::new(GatedRemote::default());
    let coordinator = MutationCoordinator::new(store.clone(), remote.clone(), journal.clone(), None);

    // Abandon the caller-side future while the remote call is gated.
    {
      let call = coordinator.toggle_favorite(USER, "m1", true);
      tokio::pin!(call);
      while journal.is_empty() {
        tokio::select! {
          biased;
          _ = &mut call => panic!("remote is gated, call cannot finish yet"),
          _ = tokio::task::yield_now() => {}
        }
      }
    }

    // The detached task runs to completion once the remote resolves.
    remote.release.add_permits(1);
    while !journal.is_empty() {
      tokio::task::yield_now().await;
    }

    let entry = store.get(USER, "m1").await.unwrap().unwrap();
    assert!(entry.playback.is_favorite);
    assert!(!entry.playback.pending_favorite);
  }

  #[tokio::test(start_paused = true)]
  async fn test_played_completion_invalidates_and_refreshes_next_up() {
    let store = Arc::new(MemoryStore::new());
    store.upsert(USER, &MediaEntry::placeholder("m1")).await.unwrap();

    let cache = Arc::new(NextUpCache::new(Duration::from_millis(1_000)));
    cache.set_initial_with_limit(5, vec![MediaEntry::placeholder("old")]);

    let fetches = Arc::new(AtomicUsize::new(0));
    let fetches_in = fetches.clone();
    let fetcher: RefreshFetcher = Arc::new(move |_limit| {
      let fetches = fetches_in.clone();
      Box::pin(async move {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(vec![MediaEntry::placeholder("fresh")]))
      })
    });

    let coordinator = MutationCoordinator::new(
      store,
      Arc::new(FakeRemote::default()),
      Arc::new(PendingJournal::new()),
      Some(NextUpHook {
        cache: cache.clone(),
        fetcher,
        limit: 5,
      }),
    );

    coordinator.mark_as_played(USER, "m1", true).await.unwrap();

    // Completion marks the cache dirty synchronously.
    assert!(!cache.can_serve(1));

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    let ids: Vec<String> = cache.snapshot(5).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["fresh"]);
  }
}
