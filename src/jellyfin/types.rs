//! Jellyfin API types.
//!
//! These types mirror the Jellyfin API responses and requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication response from Jellyfin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthResponse {
  pub user: User,
  pub access_token: String,
  pub server_id: String,
}

/// Jellyfin user information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
  pub id: String,
  pub name: String,
}

/// Server information.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
  pub server_name: String,
  pub version: String,
  pub id: String,
}

/// Connection state exposed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
  pub connected: bool,
  pub server_url: Option<String>,
  pub server_name: Option<String>,
  pub user_name: Option<String>,
}

/// Credentials for authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
  pub server_url: String,
  pub username: String,
  pub password: String,
}

/// Saved session data for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
  pub server_url: String,
  pub access_token: String,
  pub user_id: String,
  pub user_name: String,
  pub server_name: Option<String>,
  pub device_id: Option<String>,
}

/// Per-user state attached to an item by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserData {
  #[serde(default)]
  pub is_favorite: bool,
  #[serde(default)]
  pub playback_position_ticks: i64,
  #[serde(default)]
  pub play_count: i32,
  #[serde(default)]
  pub played: bool,
  #[serde(default)]
  pub last_played_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub is_watchlisted: bool,
}

/// Media item (movie, episode, etc.).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BaseItem {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(rename = "Type", default)]
  pub item_type: String,
  #[serde(default)]
  pub series_id: Option<String>,
  #[serde(default)]
  pub series_name: Option<String>,
  #[serde(default)]
  pub season_name: Option<String>,
  #[serde(default)]
  pub index_number: Option<i32>,
  #[serde(default)]
  pub parent_index_number: Option<i32>,
  #[serde(default)]
  pub run_time_ticks: Option<i64>,
  #[serde(default)]
  pub user_data: Option<UserData>,
  #[serde(default)]
  pub media_sources: Vec<MediaSource>,
}

/// Paged item query response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
  pub items: Vec<BaseItem>,
  #[serde(default)]
  pub total_record_count: i32,
  #[serde(default)]
  pub start_index: i32,
}

/// Media source for playback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
  pub id: String,
  #[serde(default)]
  pub path: Option<String>,
  #[serde(default)]
  pub protocol: String,
  #[serde(default)]
  pub container: Option<String>,
  #[serde(default)]
  pub run_time_ticks: Option<i64>,
  #[serde(default)]
  pub transcoding_url: Option<String>,
  #[serde(default)]
  pub media_streams: Vec<MediaStream>,
  #[serde(default)]
  pub supports_direct_play: bool,
  #[serde(default)]
  pub supports_direct_stream: bool,
  #[serde(default)]
  pub supports_transcoding: bool,
}

/// Individual stream (video, audio, subtitle).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
  pub index: i32,
  #[serde(rename = "Type", default)]
  pub stream_type: String,
  #[serde(default)]
  pub codec: Option<String>,
  #[serde(default)]
  pub profile: Option<String>,
  #[serde(default)]
  pub video_range_type: Option<String>,
  #[serde(default)]
  pub bit_depth: Option<i32>,
  #[serde(default)]
  pub language: Option<String>,
  #[serde(default)]
  pub display_title: Option<String>,
  #[serde(default)]
  pub is_default: bool,
  #[serde(default)]
  pub is_external: bool,
}

/// Playback info request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoRequest {
  pub user_id: String,
  pub device_id: String,
  pub max_streaming_bitrate: Option<i64>,
  pub start_time_ticks: Option<i64>,
  pub audio_stream_index: Option<i32>,
  pub subtitle_stream_index: Option<i32>,
  pub media_source_id: Option<String>,
  pub device_profile: DeviceProfile,
  pub enable_direct_play: bool,
  pub enable_direct_stream: bool,
  pub enable_transcoding: bool,
  pub auto_open_live_stream: bool,
}

/// Playback info response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoResponse {
  #[serde(default)]
  pub media_sources: Vec<MediaSource>,
  #[serde(default)]
  pub play_session_id: Option<String>,
  #[serde(default)]
  pub error_code: Option<String>,
}

/// Declared playback capabilities sent with a playback info request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceProfile {
  pub name: String,
  pub max_streaming_bitrate: Option<i64>,
  pub direct_play_profiles: Vec<DirectPlayProfile>,
  pub transcoding_profiles: Vec<TranscodingProfile>,
  pub codec_profiles: Vec<CodecProfile>,
  pub subtitle_profiles: Vec<SubtitleProfile>,
}

/// Container/codec combination accepted without transformation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectPlayProfile {
  pub container: String,
  #[serde(rename = "Type")]
  pub profile_type: String,
  pub video_codec: Option<String>,
  pub audio_codec: Option<String>,
}

/// Server-side re-encode target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscodingProfile {
  #[serde(rename = "Type")]
  pub profile_type: String,
  pub container: String,
  pub protocol: String,
  pub video_codec: String,
  pub audio_codec: String,
  pub context: String,
}

/// Per-codec constraint on direct playback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodecProfile {
  #[serde(rename = "Type")]
  pub profile_type: String,
  pub codec: String,
  pub conditions: Vec<ProfileCondition>,
}

/// Single condition inside a codec profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileCondition {
  pub condition: String,
  pub property: String,
  pub value: String,
  pub is_required: bool,
}

/// How a subtitle format should be delivered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubtitleProfile {
  pub format: String,
  pub method: String,
}

/// Playback start info (sent to Jellyfin when playback starts).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStartInfo {
  pub item_id: String,
  pub media_source_id: Option<String>,
  pub play_session_id: Option<String>,
  pub position_ticks: Option<i64>,
  pub is_paused: bool,
  pub is_muted: bool,
  pub volume_level: i32,
  pub audio_stream_index: Option<i32>,
  pub subtitle_stream_index: Option<i32>,
  pub play_method: String,
  pub can_seek: bool,
}

/// Playback progress info (sent periodically to Jellyfin).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackProgressInfo {
  pub item_id: String,
  pub media_source_id: Option<String>,
  pub play_session_id: Option<String>,
  pub position_ticks: Option<i64>,
  pub is_paused: bool,
  pub is_muted: bool,
  pub volume_level: i32,
  pub audio_stream_index: Option<i32>,
  pub subtitle_stream_index: Option<i32>,
  pub play_method: String,
  pub can_seek: bool,
}

/// Playback stop info (sent when playback ends).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStopInfo {
  pub item_id: String,
  pub media_source_id: Option<String>,
  pub play_session_id: Option<String>,
  pub position_ticks: Option<i64>,
}
