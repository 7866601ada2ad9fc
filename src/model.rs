//! Cached media entries and their playback state.
//!
//! `MediaEntry` is the local representation of a browsable or playable unit,
//! owned by the view caches and the durable store. Wire types stay in
//! `jellyfin::types`; the one mapping boundary between the two is
//! [`entry_from_item`], which also holds the missing-value policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jellyfin::types::BaseItem;

/// Ticks conversion: 1 tick = 100 nanoseconds.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Positions within one second of the end count as finished. Runtime is not
/// always known when the server write happens, so this epsilon is applied at
/// every read path, not only at write time.
pub const COMPLETED_EPSILON_TICKS: i64 = 10_000_000;

/// Fraction of runtime at which a progress or stop event marks an item played.
pub const COMPLETED_FRACTION: f64 = 0.95;

/// Convert seconds to ticks.
pub fn seconds_to_ticks(seconds: f64) -> i64 {
  (seconds * TICKS_PER_SECOND as f64) as i64
}

/// Convert ticks to seconds.
pub fn ticks_to_seconds(ticks: i64) -> f64 {
  ticks as f64 / TICKS_PER_SECOND as f64
}

/// Classification of a media entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
  Movie,
  Series,
  Episode,
  Collection,
  Other(String),
}

impl ItemKind {
  fn from_wire(kind: &str) -> Self {
    match kind {
      "Movie" => ItemKind::Movie,
      "Series" => ItemKind::Series,
      "Episode" => ItemKind::Episode,
      "BoxSet" => ItemKind::Collection,
      other => ItemKind::Other(other.to_string()),
    }
  }
}

/// Per-user playback state of an entry.
///
/// The pending flags mark fields whose authoritative value is still in
/// flight to the server; they exist only locally and never serialize to the
/// wire (wire payloads are built from separate request types).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
  pub is_favorite: bool,
  pub position_ticks: i64,
  pub play_count: i32,
  pub played: bool,
  pub last_played_at: Option<DateTime<Utc>>,
  pub is_watchlisted: bool,
  pub pending_favorite: bool,
  pub pending_played: bool,
  pub pending_watchlist: bool,
}

/// Cached representation of a playable or browsable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
  pub id: String,
  pub kind: ItemKind,
  pub name: String,
  pub series_name: Option<String>,
  pub season_name: Option<String>,
  pub index_number: Option<i32>,
  pub parent_index_number: Option<i32>,
  pub run_time_ticks: Option<i64>,
  pub playback: PlaybackState,
}

impl MediaEntry {
  /// Entry synthesized for an item the local store has never seen.
  pub fn placeholder(id: &str) -> Self {
    Self {
      id: id.to_string(),
      kind: ItemKind::Other("Unknown".to_string()),
      name: "Unknown".to_string(),
      series_name: None,
      season_name: None,
      index_number: None,
      parent_index_number: None,
      run_time_ticks: None,
      playback: PlaybackState::default(),
    }
  }
}

/// Force `played` on when the position sits within the completion epsilon of
/// a known runtime. Idempotent; call on every path that surfaces an entry.
pub fn normalize_played(entry: &mut MediaEntry) {
  if let Some(runtime) = entry.run_time_ticks {
    if runtime > 0 && entry.playback.position_ticks >= runtime - COMPLETED_EPSILON_TICKS {
      entry.playback.played = true;
    }
  }
}

/// Completion fraction of a position against an optional runtime. Unknown
/// runtime counts as zero progress.
pub fn completion_fraction(position_ticks: i64, run_time_ticks: Option<i64>) -> f64 {
  match run_time_ticks {
    Some(runtime) if runtime > 0 => position_ticks as f64 / runtime as f64,
    _ => 0.0,
  }
}

/// Map a wire item to a cache entry.
///
/// All defaulting of absent server fields happens here: name falls back to
/// "Unknown", an unrecognized type string maps to `ItemKind::Other`, and
/// absent user data yields a zeroed `PlaybackState`.
pub fn entry_from_item(item: &BaseItem) -> MediaEntry {
  let playback = match &item.user_data {
    Some(data) => PlaybackState {
      is_favorite: data.is_favorite,
      position_ticks: data.playback_position_ticks,
      play_count: data.play_count,
      played: data.played,
      last_played_at: data.last_played_date,
      is_watchlisted: data.is_watchlisted,
      pending_favorite: false,
      pending_played: false,
      pending_watchlist: false,
    },
    None => PlaybackState::default(),
  };

  let mut entry = MediaEntry {
    id: item.id.clone(),
    kind: ItemKind::from_wire(&item.item_type),
    name: item
      .name
      .clone()
      .filter(|n| !n.trim().is_empty())
      .unwrap_or_else(|| "Unknown".to_string()),
    series_name: item.series_name.clone(),
    season_name: item.season_name.clone(),
    index_number: item.index_number,
    parent_index_number: item.parent_index_number,
    run_time_ticks: item.run_time_ticks,
    playback,
  };
  normalize_played(&mut entry);
  entry
}
