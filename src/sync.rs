//! Core facade - wires the caches, the mutation coordinator, and the
//! negotiation engine into one component graph.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::cache::{NextUpCache, PlaybackEvent, RefreshFetcher, ResumeCache, ViewCacheSnapshot};
use crate::capability::DecodeCapability;
use crate::config::ClientConfig;
use crate::error::{CoreError, Result};
use crate::jellyfin::ApiClient;
use crate::journal::{PendingAction, PendingJournal};
use crate::model::{entry_from_item, MediaEntry};
use crate::mutations::{MutationCoordinator, NextUpHook};
use crate::playback::{NegotiationRequest, Negotiator, PlaybackStreamInfo, TranscodeSpec};
use crate::store::EntryStore;

/// Synchronization and playback core of the client.
///
/// Owns the "continue watching" and "next up" caches, the pending-action
/// journal, the optimistic mutation coordinator, and the negotiation
/// engine, all sharing one API client.
pub struct SyncCore<S, C> {
  client: Arc<ApiClient>,
  resume: Arc<ResumeCache>,
  next_up: Arc<NextUpCache>,
  journal: Arc<PendingJournal>,
  coordinator: MutationCoordinator<S, ApiClient>,
  negotiator: Negotiator<C>,
  next_up_fetcher: RefreshFetcher,
  next_up_limit: usize,
}

impl<S: EntryStore + 'static, C: DecodeCapability> SyncCore<S, C> {
  pub fn new(
    client: Arc<ApiClient>,
    store: Arc<S>,
    capability: Arc<C>,
    config: ClientConfig,
  ) -> Result<Self> {
    config.validate().map_err(CoreError::Validation)?;
    client.set_device_name(config.device_name.clone());

    let debounce = Duration::from_millis(config.debounce_ms);
    let resume = Arc::new(ResumeCache::new(debounce));
    let next_up = Arc::new(NextUpCache::new(debounce));
    let journal = Arc::new(PendingJournal::new());

    let next_up_fetcher = next_up_fetcher(client.clone());
    let coordinator = MutationCoordinator::new(
      store,
      client.clone(),
      journal.clone(),
      Some(NextUpHook {
        cache: next_up.clone(),
        fetcher: next_up_fetcher.clone(),
        limit: config.next_up_limit,
      }),
    );

    let negotiator = Negotiator::new(
      client.clone(),
      capability,
      config.device_name.clone(),
      config.max_streaming_bitrate,
      config.transcode_quality,
    );

    Ok(Self {
      client,
      resume,
      next_up,
      journal,
      coordinator,
      negotiator,
      next_up_fetcher,
      next_up_limit: config.next_up_limit,
    })
  }

  pub fn client(&self) -> &Arc<ApiClient> {
    &self.client
  }

  pub fn resume(&self) -> &ResumeCache {
    &self.resume
  }

  pub fn next_up(&self) -> &NextUpCache {
    &self.next_up
  }

  /// Subscribe to "continue watching" snapshot updates.
  pub fn subscribe_resume(&self) -> watch::Receiver<ViewCacheSnapshot> {
    self.resume.subscribe()
  }

  /// Subscribe to "next up" snapshot updates.
  pub fn subscribe_next_up(&self) -> watch::Receiver<ViewCacheSnapshot> {
    self.next_up.subscribe()
  }

  /// Feed a playback progress or stop event into the resume cache.
  pub fn apply_playback_event(&self, event: PlaybackEvent) {
    self.resume.apply_event(event);
  }

  /// Queue a debounced next-up refresh with the default fetcher.
  pub fn request_next_up_refresh(&self) {
    self
      .next_up
      .request_refresh(self.next_up_limit, self.next_up_fetcher.clone());
  }

  pub async fn toggle_favorite(&self, media_id: &str, value: bool) -> Result<()> {
    let user_id = self.client.user_id()?;
    self.coordinator.toggle_favorite(&user_id, media_id, value).await
  }

  pub async fn mark_as_played(&self, media_id: &str, value: bool) -> Result<()> {
    let user_id = self.client.user_id()?;
    self.coordinator.mark_as_played(&user_id, media_id, value).await
  }

  pub async fn set_watchlist_local(&self, media_id: &str, value: bool) -> Result<()> {
    let user_id = self.client.user_id()?;
    self.coordinator.set_watchlist_local(&user_id, media_id, value).await
  }

  /// Snapshot of the in-flight mutations, for an external drain.
  pub fn pending_actions(&self) -> Vec<PendingAction> {
    self.journal.list_all()
  }

  /// Refill both home caches concurrently.
  ///
  /// Each branch is independent: a failed fetch keeps that cache's current
  /// rows and contributes its error to the returned list, so one slow or
  /// broken endpoint never blanks the other rail.
  pub async fn refresh_home(&self, resume_limit: usize) -> Vec<CoreError> {
    let resume_call = self.client.get_resume_items(0, resume_limit);
    let next_up_call = self.client.get_next_up(self.next_up_limit);
    let (resume_page, next_up_page) = tokio::join!(resume_call, next_up_call);

    let mut failures = Vec::new();

    match resume_page {
      Ok(page) => {
        let entries: Vec<MediaEntry> = page.items.iter().map(entry_from_item).collect();
        self.resume.set_initial(entries);
      }
      Err(e) => {
        log::warn!("Resume refresh failed, keeping cached rows: {}", e);
        failures.push(e);
      }
    }

    match next_up_page {
      Ok(page) => {
        let entries: Vec<MediaEntry> = page.items.iter().map(entry_from_item).collect();
        self.next_up.set_initial_with_limit(self.next_up_limit, entries);
      }
      Err(e) => {
        log::warn!("Next-up refresh failed, keeping cached rows: {}", e);
        failures.push(e);
      }
    }

    failures
  }

  /// Negotiate a playable stream honoring the request's intent.
  pub async fn request_playback_info(
    &self,
    request: &NegotiationRequest,
  ) -> Result<PlaybackStreamInfo> {
    self.negotiator.request_playback_info(request).await
  }

  /// Negotiate a direct play/stream URL or fail.
  pub async fn request_direct_stream_url(
    &self,
    request: &NegotiationRequest,
  ) -> Result<PlaybackStreamInfo> {
    self.negotiator.request_direct_stream_url(request).await
  }

  /// Negotiate a transcoded stream with already-decided parameters.
  pub async fn request_transcoding_url(
    &self,
    request: &NegotiationRequest,
    spec: &TranscodeSpec,
  ) -> Result<PlaybackStreamInfo> {
    self.negotiator.request_transcoding_url(request, spec).await
  }

  /// Stop the background workers. Pending coalesced actions are dropped.
  pub fn shutdown(&self) {
    self.resume.shutdown();
    self.next_up.shutdown();
  }
}

/// Default next-up fetcher: page the catalog endpoint and map to entries.
fn next_up_fetcher(client: Arc<ApiClient>) -> RefreshFetcher {
  Arc::new(move |limit| {
    let client = client.clone();
    Box::pin(async move {
      let page = client.get_next_up(limit).await?;
      let entries: Vec<MediaEntry> = page.items.iter().map(entry_from_item).collect();
      Ok(Some(entries))
    })
  })
}
