//! Durable entry store boundary.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;

use crate::error::Result;
use crate::model::{normalize_played, MediaEntry};

/// Durable store of media entries keyed by (user, media).
///
/// The relational store behind the client implements this. Reads must
/// surface entries with the played threshold already applied.
pub trait EntryStore: Send + Sync {
  fn get(
    &self,
    user_id: &str,
    media_id: &str,
  ) -> impl Future<Output = Result<Option<MediaEntry>>> + Send;

  fn upsert(&self, user_id: &str, entry: &MediaEntry) -> impl Future<Output = Result<()>> + Send;

  fn delete(&self, user_id: &str, media_id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory store, used by tests and cache-only deployments.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<(String, String), MediaEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl EntryStore for MemoryStore {
  async fn get(&self, user_id: &str, media_id: &str) -> Result<Option<MediaEntry>> {
    let entry = self
      .entries
      .lock()
      .get(&(user_id.to_string(), media_id.to_string()))
      .cloned();
    Ok(entry.map(|mut e| {
      normalize_played(&mut e);
      e
    }))
  }

  async fn upsert(&self, user_id: &str, entry: &MediaEntry) -> Result<()> {
    self
      .entries
      .lock()
      .insert((user_id.to_string(), entry.id.clone()), entry.clone());
    Ok(())
  }

  async fn delete(&self, user_id: &str, media_id: &str) -> Result<()> {
    self
      .entries
      .lock()
      .remove(&(user_id.to_string(), media_id.to_string()));
    Ok(())
  }
}
