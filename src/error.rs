//! Error taxonomy for the synchronization and playback core.

use thiserror::Error;

/// Errors surfaced by catalog refreshes, optimistic mutations, and stream
/// negotiation.
#[derive(Debug, Error)]
pub enum CoreError {
  #[error("Network unavailable")]
  NetworkUnavailable,

  #[error("Remote call failed: {0}")]
  Remote(String),

  #[error("Remote call timed out")]
  Timeout,

  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("No playable media source")]
  NoPlayableSource,

  #[error("Incompatible media source: {0}")]
  IncompatibleSource(String),
}

impl From<reqwest::Error> for CoreError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      CoreError::Timeout
    } else if e.is_connect() {
      CoreError::NetworkUnavailable
    } else {
      CoreError::Remote(e.to_string())
    }
  }
}

impl From<serde_json::Error> for CoreError {
  fn from(e: serde_json::Error) -> Self {
    CoreError::Remote(format!("Malformed server payload: {}", e))
  }
}

pub type Result<T> = std::result::Result<T, CoreError>;
