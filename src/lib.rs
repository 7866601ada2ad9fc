//! Synchronization and playback negotiation core for Jellyfin clients.
//!
//! The crate reconciles remote catalog state with local view caches and
//! pending user mutations, and negotiates concrete playable stream URLs
//! against the server's capability-based playback API. The presentation
//! layer, the decode pipeline, the durable database, and the push transport
//! are collaborators behind traits and injected callbacks.

mod cache;
mod capability;
mod coalesce;
mod config;
mod error;
mod jellyfin;
mod journal;
mod model;
mod mutations;
mod playback;
mod store;
mod sync;

pub use cache::{NextUpCache, PlaybackEvent, RefreshFetcher, ResumeCache, ViewCacheSnapshot};
pub use capability::{DecodeCapability, StaticCapabilities, VideoRange};
pub use coalesce::Coalescer;
pub use config::ClientConfig;
pub use error::{CoreError, Result};
pub use jellyfin::ApiClient;
pub use jellyfin::types;
pub use journal::{PendingAction, PendingJournal, PendingKind};
pub use model::{
  completion_fraction, entry_from_item, normalize_played, seconds_to_ticks, ticks_to_seconds,
  ItemKind, MediaEntry, PlaybackState, COMPLETED_EPSILON_TICKS, COMPLETED_FRACTION,
  TICKS_PER_SECOND,
};
pub use mutations::{MutationCoordinator, NextUpHook, UserDataRemote};
pub use playback::{
  direct_play_profile, transcode_profile, NegotiationRequest, Negotiator, PlayIntent,
  PlayStrategy, PlaybackStreamInfo, TranscodeQuality, TranscodeSpec,
};
pub use store::{EntryStore, MemoryStore};
pub use sync::SyncCore;
