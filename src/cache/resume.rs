//! "Continue watching" cache fed by playback progress and stop events.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::{ViewCache, ViewCacheSnapshot};
use crate::coalesce::Coalescer;
use crate::model::{completion_fraction, MediaEntry, COMPLETED_FRACTION};

/// Playback event mirrored from the active player session.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
  /// Periodic position tick while an item plays.
  Progress {
    item_id: String,
    position_ticks: i64,
    run_time_ticks: Option<i64>,
    observed_at: DateTime<Utc>,
  },
  /// Playback ended or was stopped.
  Stopped {
    item_id: String,
    position_ticks: i64,
    run_time_ticks: Option<i64>,
  },
}

/// Cache of partially watched items, resorted through the coalescer so a
/// burst of progress ticks costs one sort, not one per tick.
pub struct ResumeCache {
  cache: Arc<ViewCache>,
  resort: Coalescer<()>,
}

impl ResumeCache {
  pub fn new(debounce: Duration) -> Self {
    let cache = Arc::new(ViewCache::new());

    let resort_target = cache.clone();
    let resort = Coalescer::spawn(debounce, move |()| {
      let cache = resort_target.clone();
      async move {
        cache.resort();
        Ok(())
      }
    });

    Self { cache, resort }
  }

  /// Replace the snapshot wholesale; marks fresh for the new length.
  pub fn set_initial(&self, items: Vec<MediaEntry>) {
    self.cache.set_initial(items);
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

  /// Incorporate a playback event. Ordering is restored by a debounced
  /// resort rather than synchronously per event.
  pub fn apply_event(&self, event: PlaybackEvent) {
    match event {
      PlaybackEvent::Progress {
        item_id,
        position_ticks,
        run_time_ticks,
        observed_at,
      } => {
        self.cache.mutate(|items| {
          if let Some(entry) = items.iter_mut().find(|e| e.id == item_id) {
            entry.playback.position_ticks = position_ticks;
            entry.playback.played =
              completion_fraction(position_ticks, run_time_ticks) >= COMPLETED_FRACTION;
            entry.playback.last_played_at = Some(observed_at);
            if run_time_ticks.is_some() {
              entry.run_time_ticks = run_time_ticks;
            }
          } else {
            log::debug!("Progress event for uncached item {}", item_id);
          }
        });
      }
      PlaybackEvent::Stopped {
        item_id,
        position_ticks,
        run_time_ticks,
      } => {
        // A finished item should not remain in "continue watching".
        if completion_fraction(position_ticks, run_time_ticks) >= COMPLETED_FRACTION {
          self.cache.mutate(|items| {
            items.retain(|e| e.id != item_id);
          });
        }
      }
    }

    self.resort.submit(());
  }

  /// Stop the resort worker.
  pub fn shutdown(&self) {
    self.resort.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::TICKS_PER_SECOND;
  use chrono::TimeZone;

  const DEBOUNCE: Duration = Duration::from_millis(1_000);
  const RUNTIME: i64 = 100 * TICKS_PER_SECOND;

  fn entry(id: &str) -> MediaEntry {
    let mut e = MediaEntry::placeholder(id);
    e.run_time_ticks = Some(RUNTIME);
    e
  }

  fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap()
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_at_completion_removes_entry() {
    let cache = ResumeCache::new(DEBOUNCE);
    cache.set_initial(vec![entry("x"), entry("y")]);

    cache.apply_event(PlaybackEvent::Stopped {
      item_id: "x".to_string(),
      position_ticks: (RUNTIME as f64 * 0.96) as i64,
      run_time_ticks: Some(RUNTIME),
    });

    let ids: Vec<String> = cache.snapshot(10).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["y"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_mid_playback_leaves_entry_untouched() {
    let cache = ResumeCache::new(DEBOUNCE);
    let mut partial = entry("x");
    partial.playback.position_ticks = 40 * TICKS_PER_SECOND;
    cache.set_initial(vec![partial.clone()]);

    cache.apply_event(PlaybackEvent::Stopped {
      item_id: "x".to_string(),
      position_ticks: 50 * TICKS_PER_SECOND,
      run_time_ticks: Some(RUNTIME),
    });

    let items = cache.snapshot(10);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].playback.position_ticks, partial.playback.position_ticks);
  }

  #[tokio::test(start_paused = true)]
  async fn test_progress_updates_state_and_defers_resort() {
    let cache = ResumeCache::new(DEBOUNCE);
    let mut first = entry("a");
    first.playback.last_played_at = Some(at(10));
    let mut second = entry("b");
    second.playback.last_played_at = Some(at(5));
    cache.set_initial(vec![first, second]);

    // A burst of ticks for the older item.
    for i in 1..=5 {
      cache.apply_event(PlaybackEvent::Progress {
        item_id: "b".to_string(),
        position_ticks: i * TICKS_PER_SECOND,
        run_time_ticks: Some(RUNTIME),
        observed_at: at(30),
      });
    }

    // State is visible immediately, order is not yet recomputed.
    let items = cache.snapshot(10);
    assert_eq!(items[0].id, "a");
    assert_eq!(items[1].playback.position_ticks, 5 * TICKS_PER_SECOND);
    assert_eq!(items[1].playback.last_played_at, Some(at(30)));

    // After the quiet period the single resort lands.
    tokio::time::sleep(DEBOUNCE * 2).await;
    let ids: Vec<String> = cache.snapshot(10).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["b", "a"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_progress_without_runtime_counts_as_zero_percent() {
    let cache = ResumeCache::new(DEBOUNCE);
    let mut e = MediaEntry::placeholder("a");
    e.run_time_ticks = None;
    cache.set_initial(vec![e]);

    cache.apply_event(PlaybackEvent::Progress {
      item_id: "a".to_string(),
      position_ticks: i64::MAX / 2,
      run_time_ticks: None,
      observed_at: at(1),
    });

    assert!(!cache.snapshot(1)[0].playback.played);
  }

  #[tokio::test(start_paused = true)]
  async fn test_progress_near_end_marks_played() {
    let cache = ResumeCache::new(DEBOUNCE);
    cache.set_initial(vec![entry("a")]);

    cache.apply_event(PlaybackEvent::Progress {
      item_id: "a".to_string(),
      position_ticks: (RUNTIME as f64 * 0.97) as i64,
      run_time_ticks: Some(RUNTIME),
      observed_at: at(1),
    });

    assert!(cache.snapshot(1)[0].playback.played);
  }
}
