//! Core configuration.

use serde::{Deserialize, Serialize};

use crate::playback::TranscodeQuality;

/// Configuration for the synchronization and playback core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
  /// Device name reported to the server.
  #[serde(default = "default_device_name")]
  pub device_name: String,

  /// Quiet period for coalesced cache refreshes and resorts, in milliseconds.
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,

  /// Bitrate ceiling declared during playback negotiation, in bits per second.
  #[serde(default = "default_max_streaming_bitrate")]
  pub max_streaming_bitrate: i64,

  /// Transcode quality used when the caller does not pick one.
  #[serde(default)]
  pub transcode_quality: TranscodeQuality,

  /// Page size for background next-up refreshes.
  #[serde(default = "default_next_up_limit")]
  pub next_up_limit: usize,
}

fn default_device_name() -> String {
  "Jellysync".to_string()
}

fn default_debounce_ms() -> u64 {
  1_000
}

fn default_max_streaming_bitrate() -> i64 {
  140_000_000
}

fn default_next_up_limit() -> usize {
  24
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      device_name: default_device_name(),
      debounce_ms: default_debounce_ms(),
      max_streaming_bitrate: default_max_streaming_bitrate(),
      transcode_quality: TranscodeQuality::default(),
      next_up_limit: default_next_up_limit(),
    }
  }
}

impl ClientConfig {
  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.device_name.trim().is_empty() {
      return Err("Device name cannot be empty".to_string());
    }
    if self.debounce_ms < 50 || self.debounce_ms > 30_000 {
      return Err("Debounce window must be between 50 and 30000 milliseconds".to_string());
    }
    if self.max_streaming_bitrate <= 0 {
      return Err("Streaming bitrate ceiling must be positive".to_string());
    }
    if self.next_up_limit == 0 {
      return Err("Next-up page size must be at least 1".to_string());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_are_valid() {
    assert!(ClientConfig::default().validate().is_ok());
  }

  #[test]
  fn test_rejects_empty_device_name() {
    let config = ClientConfig {
      device_name: "  ".to_string(),
      ..ClientConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_rejects_out_of_range_debounce() {
    let config = ClientConfig {
      debounce_ms: 10,
      ..ClientConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_deserializes_with_defaults() {
    let config: ClientConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.device_name, "Jellysync");
    assert_eq!(config.debounce_ms, 1_000);
  }
}
