//! Stream negotiation against the server's playback-info endpoint.
//!
//! One negotiation is a single pass: pick a strategy, declare a matching
//! device profile, select a candidate source from the response, and resolve
//! the final playable URL. Nothing is cached across calls and failures are
//! returned typed, never retried here.

use std::sync::Arc;

use crate::capability::{DecodeCapability, VideoRange};
use crate::error::{CoreError, Result};
use crate::jellyfin::types::{BaseItem, MediaSource, PlaybackInfoRequest};
use crate::jellyfin::{redact_url, ApiClient};

use super::profile::{direct_play_profile, transcode_profile, TranscodeQuality};
use super::url;

/// How the stream will be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStrategy {
  /// Original container/codec, unmodified.
  DirectPlay,
  /// Server-side re-encode into a segmented stream.
  Transcode,
}

/// Caller intent for one negotiation.
#[derive(Debug, Clone, Default)]
pub enum PlayIntent {
  /// Deliver the original stream or fail.
  DirectOnly,
  /// Re-encode with the given parameters.
  Transcode(TranscodeSpec),
  /// Decide from local decode capability.
  #[default]
  Adaptive,
}

/// Explicit transcode parameters.
#[derive(Debug, Clone, Default)]
pub struct TranscodeSpec {
  pub quality: TranscodeQuality,
  /// Target codec override; falls back to the quality rung, then to the
  /// device's ranked codec list.
  pub video_codec: Option<String>,
  /// Bitrate ceiling override, bits per second.
  pub max_bitrate: Option<i64>,
}

/// One stream negotiation request.
#[derive(Debug, Clone, Default)]
pub struct NegotiationRequest {
  pub item_id: String,
  pub media_source_id: String,
  pub audio_stream_index: Option<i32>,
  pub subtitle_stream_index: Option<i32>,
  pub start_ticks: Option<i64>,
  pub intent: PlayIntent,
}

/// Negotiated stream ready for the player.
#[derive(Debug, Clone)]
pub struct PlaybackStreamInfo {
  pub url: String,
  /// Session id passed through verbatim for progress/stop correlation.
  pub play_session_id: Option<String>,
  pub strategy: PlayStrategy,
}

/// Playback negotiation engine. Holds no per-call state; safe to share.
pub struct Negotiator<C> {
  client: Arc<ApiClient>,
  capability: Arc<C>,
  device_name: String,
  max_streaming_bitrate: i64,
  default_quality: TranscodeQuality,
}

impl<C: DecodeCapability> Negotiator<C> {
  pub fn new(
    client: Arc<ApiClient>,
    capability: Arc<C>,
    device_name: String,
    max_streaming_bitrate: i64,
    default_quality: TranscodeQuality,
  ) -> Self {
    Self {
      client,
      capability,
      device_name,
      max_streaming_bitrate,
      default_quality,
    }
  }

  /// Full negotiation honoring the request's intent.
  pub async fn request_playback_info(&self, request: &NegotiationRequest) -> Result<PlaybackStreamInfo> {
    match &request.intent {
      PlayIntent::DirectOnly => self.negotiate_direct(request).await,
      PlayIntent::Transcode(spec) => self.negotiate_transcode(request, spec).await,
      PlayIntent::Adaptive => match self.decide_strategy(request).await? {
        PlayStrategy::DirectPlay => self.negotiate_direct(request).await,
        PlayStrategy::Transcode => {
          let spec = TranscodeSpec {
            quality: self.default_quality,
            ..TranscodeSpec::default()
          };
          self.negotiate_transcode(request, &spec).await
        }
      },
    }
  }

  /// Fixed-strategy shortcut: direct play/stream only.
  pub async fn request_direct_stream_url(&self, request: &NegotiationRequest) -> Result<PlaybackStreamInfo> {
    self.negotiate_direct(request).await
  }

  /// Fixed-strategy shortcut: transcode with already-decided parameters.
  pub async fn request_transcoding_url(
    &self,
    request: &NegotiationRequest,
    spec: &TranscodeSpec,
  ) -> Result<PlaybackStreamInfo> {
    self.negotiate_transcode(request, spec).await
  }

  /// Adaptive branch: direct play when the source video codec decodes
  /// locally. An absent codec counts as supported.
  async fn decide_strategy(&self, request: &NegotiationRequest) -> Result<PlayStrategy> {
    let item = self.client.get_item(&request.item_id).await?;
    let supported = source_video_supported(&item, &request.media_source_id, self.capability.as_ref());
    Ok(if supported {
      PlayStrategy::DirectPlay
    } else {
      PlayStrategy::Transcode
    })
  }

  async fn negotiate_direct(&self, request: &NegotiationRequest) -> Result<PlaybackStreamInfo> {
    let base = self.client.server_url()?;
    let token = self.client.access_token()?;

    let profile = direct_play_profile(&self.device_name, Some(self.max_streaming_bitrate));
    let info_request = self.info_request(request, PlayStrategy::DirectPlay, profile, Some(self.max_streaming_bitrate))?;
    let response = self.client.get_playback_info(&request.item_id, &info_request).await?;

    let candidate = select_candidate(&response.media_sources, &request.media_source_id)?;
    let url = resolve_direct_url(&base, &token, request, candidate)?;
    log::info!("Direct stream negotiated: {}", redact_url(&url));

    Ok(PlaybackStreamInfo {
      url,
      play_session_id: response.play_session_id.clone(),
      strategy: PlayStrategy::DirectPlay,
    })
  }

  async fn negotiate_transcode(
    &self,
    request: &NegotiationRequest,
    spec: &TranscodeSpec,
  ) -> Result<PlaybackStreamInfo> {
    let base = self.client.server_url()?;
    let token = self.client.access_token()?;

    let video_codec = spec
      .video_codec
      .clone()
      .or_else(|| spec.quality.video_codec().map(str::to_string))
      .or_else(|| self.capability.ranked_video_codecs().into_iter().next())
      .unwrap_or_else(|| "h264".to_string());
    // Ceiling: explicit override, then the quality rung, else unset.
    let bitrate = spec.max_bitrate.or_else(|| spec.quality.bitrate());

    let profile = transcode_profile(&self.device_name, &video_codec, bitrate);
    let info_request = self.info_request(request, PlayStrategy::Transcode, profile, bitrate)?;
    let response = self.client.get_playback_info(&request.item_id, &info_request).await?;

    let candidate = select_candidate(&response.media_sources, &request.media_source_id)?;
    let url = resolve_transcode_url(&base, &token, &response.media_sources, candidate)?;
    log::info!("Transcode stream negotiated ({}): {}", video_codec, redact_url(&url));

    Ok(PlaybackStreamInfo {
      url,
      play_session_id: response.play_session_id.clone(),
      strategy: PlayStrategy::Transcode,
    })
  }

  fn info_request(
    &self,
    request: &NegotiationRequest,
    strategy: PlayStrategy,
    profile: crate::jellyfin::types::DeviceProfile,
    max_streaming_bitrate: Option<i64>,
  ) -> Result<PlaybackInfoRequest> {
    let direct = strategy == PlayStrategy::DirectPlay;
    Ok(PlaybackInfoRequest {
      user_id: self.client.user_id()?,
      device_id: self.client.device_id(),
      max_streaming_bitrate,
      start_time_ticks: request.start_ticks,
      audio_stream_index: request.audio_stream_index,
      subtitle_stream_index: request.subtitle_stream_index,
      media_source_id: Some(request.media_source_id.clone()),
      device_profile: profile,
      enable_direct_play: direct,
      enable_direct_stream: direct,
      enable_transcoding: !direct,
      auto_open_live_stream: true,
    })
  }
}

/// Whether the source's video stream is declared locally decodable.
fn source_video_supported<C: DecodeCapability>(
  item: &BaseItem,
  media_source_id: &str,
  capability: &C,
) -> bool {
  let source = item
    .media_sources
    .iter()
    .find(|s| s.id == media_source_id)
    .or_else(|| item.media_sources.first());
  let video = source.and_then(|s| s.media_streams.iter().find(|m| m.stream_type == "Video"));

  match video {
    Some(stream) => match stream.codec.as_deref() {
      Some(codec) => capability.supports_video(
        codec,
        VideoRange::from_wire(stream.video_range_type.as_deref()),
        stream.profile.as_deref(),
        stream.bit_depth,
      ),
      // No codec reported: assume the device can handle it.
      None => true,
    },
    None => true,
  }
}

/// The candidate matching the requested source id, else the first, else
/// there is nothing to play.
fn select_candidate<'a>(sources: &'a [MediaSource], requested_id: &str) -> Result<&'a MediaSource> {
  if sources.is_empty() {
    return Err(CoreError::NoPlayableSource);
  }
  Ok(
    sources
      .iter()
      .find(|s| s.id == requested_id)
      .unwrap_or(&sources[0]),
  )
}

/// Resolve a direct play/stream URL from the selected candidate.
fn resolve_direct_url(
  base: &str,
  token: &str,
  request: &NegotiationRequest,
  candidate: &MediaSource,
) -> Result<String> {
  // A delivery path the server already prepared wins: a transcoding path
  // set despite the direct request, or an http-protocol source path.
  if let Some(path) = candidate
    .transcoding_url
    .as_deref()
    .filter(|p| !p.trim().is_empty())
  {
    return Ok(url::with_credential(&url::merge_with_base(base, path), token));
  }
  if candidate.protocol.eq_ignore_ascii_case("http") {
    if let Some(path) = candidate.path.as_deref().filter(|p| !p.trim().is_empty()) {
      return Ok(url::with_credential(&url::merge_with_base(base, path), token));
    }
  }

  if candidate.supports_direct_play || candidate.supports_direct_stream {
    let container = candidate.container.as_deref().unwrap_or("mkv");
    return Ok(url::direct_stream_url(
      base,
      &request.item_id,
      container,
      &candidate.id,
      request.audio_stream_index,
      request.subtitle_stream_index,
      token,
    ));
  }

  Err(CoreError::IncompatibleSource(
    "Server did not return a direct-playable stream".to_string(),
  ))
}

/// Resolve a transcode URL. Any returned source carrying a segmented
/// playlist wins over the selected candidate's own path.
fn resolve_transcode_url(
  base: &str,
  token: &str,
  sources: &[MediaSource],
  candidate: &MediaSource,
) -> Result<String> {
  let path = sources
    .iter()
    .filter_map(|s| s.transcoding_url.as_deref())
    .find(|u| url::is_segmented_playlist(u))
    .or(candidate.transcoding_url.as_deref());

  let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
    return Err(CoreError::IncompatibleSource(
      "Transcoding URL missing or invalid".to_string(),
    ));
  };
  if !url::is_segmented_playlist(path) {
    return Err(CoreError::IncompatibleSource(
      "Not a valid segmented stream".to_string(),
    ));
  }

  Ok(url::with_credential(&url::merge_with_base(base, path), token))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::capability::StaticCapabilities;
  use crate::jellyfin::types::MediaStream;

  const BASE: &str = "http://server";
  const TOKEN: &str = "tok";

  fn request(source_id: &str) -> NegotiationRequest {
    NegotiationRequest {
      item_id: "item1".to_string(),
      media_source_id: source_id.to_string(),
      ..NegotiationRequest::default()
    }
  }

  fn source(id: &str) -> MediaSource {
    MediaSource {
      id: id.to_string(),
      protocol: "File".to_string(),
      ..MediaSource::default()
    }
  }

  #[test]
  fn test_select_candidate_prefers_requested_then_first() {
    let sources = vec![source("a"), source("b")];
    assert_eq!(select_candidate(&sources, "b").unwrap().id, "b");
    assert_eq!(select_candidate(&sources, "missing").unwrap().id, "a");
  }

  #[test]
  fn test_empty_candidate_list_is_no_playable_source() {
    assert!(matches!(
      select_candidate(&[], "a"),
      Err(CoreError::NoPlayableSource)
    ));
  }

  #[test]
  fn test_direct_url_synthesized_for_direct_play_source() {
    let mut candidate = source("src1");
    candidate.supports_direct_play = true;

    let url = resolve_direct_url(BASE, TOKEN, &request("src1"), &candidate).unwrap();
    assert!(url.contains("/stream"));
    assert!(url.contains("MediaSourceId=src1"));
    assert_eq!(url.matches("api_key=").count(), 1);
    // Container falls back to mkv when the source does not report one.
    assert!(url.contains("/stream.mkv?"));
  }

  #[test]
  fn test_direct_url_prefers_prepared_delivery_path() {
    let mut candidate = source("src1");
    candidate.supports_direct_play = true;
    candidate.transcoding_url = Some("/videos/item1/master.m3u8?Api_Key=present".to_string());

    let url = resolve_direct_url(BASE, TOKEN, &request("src1"), &candidate).unwrap();
    // The existing credential survives, no second one is appended.
    assert_eq!(url, "http://server/videos/item1/master.m3u8?Api_Key=present");
    assert!(!url.contains("api_key=tok"));
  }

  #[test]
  fn test_direct_url_uses_http_source_path() {
    let mut candidate = source("src1");
    candidate.protocol = "Http".to_string();
    candidate.path = Some("http://origin/live/channel.ts".to_string());

    let url = resolve_direct_url(BASE, TOKEN, &request("src1"), &candidate).unwrap();
    assert_eq!(url, "http://origin/live/channel.ts?api_key=tok");
  }

  #[test]
  fn test_direct_url_fails_when_nothing_direct_playable() {
    let candidate = source("src1");
    let result = resolve_direct_url(BASE, TOKEN, &request("src1"), &candidate);
    assert!(matches!(result, Err(CoreError::IncompatibleSource(_))));
  }

  #[test]
  fn test_transcode_prefers_any_segmented_candidate() {
    let mut matched = source("src1");
    matched.transcoding_url = Some("/videos/item1/stream.mp4".to_string());
    let mut other = source("src2");
    other.transcoding_url = Some("/videos/item1/master.m3u8?DeviceId=d".to_string());
    let sources = vec![matched.clone(), other];

    // The requested source id matched src1, but only src2 carries a
    // segmented playlist.
    let url = resolve_transcode_url(BASE, TOKEN, &sources, &sources[0]).unwrap();
    assert!(url.contains("master.m3u8"));
    assert!(url.contains("api_key=tok"));
  }

  #[test]
  fn test_transcode_rejects_non_segmented_path() {
    let mut candidate = source("src1");
    candidate.transcoding_url = Some("/videos/item1/stream.mp4".to_string());
    let sources = vec![candidate.clone()];

    let result = resolve_transcode_url(BASE, TOKEN, &sources, &sources[0]);
    assert!(matches!(result, Err(CoreError::IncompatibleSource(_))));
  }

  #[test]
  fn test_transcode_fails_without_any_path() {
    let sources = vec![source("src1")];
    let result = resolve_transcode_url(BASE, TOKEN, &sources, &sources[0]);
    assert!(matches!(result, Err(CoreError::IncompatibleSource(_))));
  }

  fn item_with_video(codec: Option<&str>, range: Option<&str>, bit_depth: Option<i32>) -> BaseItem {
    let mut src = source("src1");
    src.media_streams = vec![MediaStream {
      index: 0,
      stream_type: "Video".to_string(),
      codec: codec.map(str::to_string),
      video_range_type: range.map(str::to_string),
      bit_depth,
      ..MediaStream::default()
    }];
    BaseItem {
      id: "item1".to_string(),
      media_sources: vec![src],
      ..BaseItem::default()
    }
  }

  #[test]
  fn test_supported_codec_chooses_direct_play() {
    let probe = StaticCapabilities::baseline();
    let item = item_with_video(Some("h264"), Some("SDR"), Some(8));
    assert!(source_video_supported(&item, "src1", &probe));
  }

  #[test]
  fn test_unsupported_codec_chooses_transcode() {
    let probe = StaticCapabilities::baseline();
    let item = item_with_video(Some("hevc"), Some("HDR10"), Some(10));
    assert!(!source_video_supported(&item, "src1", &probe));
  }

  #[test]
  fn test_missing_codec_defaults_to_supported() {
    let probe = StaticCapabilities::baseline();
    let item = item_with_video(None, None, None);
    assert!(source_video_supported(&item, "src1", &probe));

    // No sources at all behaves the same way.
    let empty = BaseItem {
      id: "item1".to_string(),
      ..BaseItem::default()
    };
    assert!(source_video_supported(&empty, "src1", &probe));
  }
}
