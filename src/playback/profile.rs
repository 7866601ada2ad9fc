//! Device profile construction for playback negotiation.
//!
//! The profile is the outbound declaration of what the client will accept.
//! Direct play declares a broad container/codec allow-list; transcode
//! declares exactly one target pair delivered over segmented HTTP with
//! subtitles burned in server-side.

use serde::{Deserialize, Serialize};

use crate::jellyfin::types::{
  CodecProfile, DeviceProfile, DirectPlayProfile, ProfileCondition, SubtitleProfile,
  TranscodingProfile,
};

/// Containers accepted without remux.
const DIRECT_PLAY_CONTAINERS: &str = "mp4,mkv,webm,mov,ts,m2ts,avi,flv,ogv,3gp";
const DIRECT_PLAY_VIDEO_CODECS: &str = "h264,hevc,av1,vp8,vp9,mpeg2video,mpeg4,vc1";
const DIRECT_PLAY_AUDIO_CODECS: &str = "aac,ac3,eac3,mp3,flac,opus,vorbis,dts,truehd,pcm_s16le";

/// Transcodes always target segmented MPEG-TS over HLS with AAC audio.
const TRANSCODE_CONTAINER: &str = "ts";
const TRANSCODE_PROTOCOL: &str = "hls";
const TRANSCODE_AUDIO_CODEC: &str = "aac";

const EMBEDDED_SUBTITLE_FORMATS: &[&str] = &["srt", "subrip", "ass", "ssa", "vtt"];
const BURN_IN_SUBTITLE_FORMATS: &[&str] =
  &["srt", "subrip", "ass", "ssa", "vtt", "pgs", "pgssub", "dvdsub"];

/// Requested transcode quality rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TranscodeQuality {
  /// Let the server ladder the bitrate.
  #[default]
  Auto,
  P2160,
  P1080,
  P720,
  P480,
  P360,
}

impl TranscodeQuality {
  /// Bitrate ceiling implied by the rung, bits per second.
  pub fn bitrate(self) -> Option<i64> {
    match self {
      TranscodeQuality::Auto => None,
      TranscodeQuality::P2160 => Some(20_000_000),
      TranscodeQuality::P1080 => Some(8_000_000),
      TranscodeQuality::P720 => Some(4_000_000),
      TranscodeQuality::P480 => Some(1_500_000),
      TranscodeQuality::P360 => Some(800_000),
    }
  }

  /// Target codec implied by the rung. 4K transcodes target hevc; the
  /// lower rungs stick to h264 for compatibility. Auto defers to the
  /// device's ranked codec list.
  pub fn video_codec(self) -> Option<&'static str> {
    match self {
      TranscodeQuality::Auto => None,
      TranscodeQuality::P2160 => Some("hevc"),
      _ => Some("h264"),
    }
  }
}

/// Profile accepting every combination the client can pass through
/// untouched.
pub fn direct_play_profile(device_name: &str, max_bitrate: Option<i64>) -> DeviceProfile {
  DeviceProfile {
    name: device_name.to_string(),
    max_streaming_bitrate: max_bitrate,
    direct_play_profiles: vec![DirectPlayProfile {
      container: DIRECT_PLAY_CONTAINERS.to_string(),
      profile_type: "Video".to_string(),
      video_codec: Some(DIRECT_PLAY_VIDEO_CODECS.to_string()),
      audio_codec: Some(DIRECT_PLAY_AUDIO_CODECS.to_string()),
    }],
    transcoding_profiles: Vec::new(),
    codec_profiles: decode_limit_profiles(),
    subtitle_profiles: subtitle_profiles(EMBEDDED_SUBTITLE_FORMATS, "Embed"),
  }
}

/// Profile declaring exactly one transcode target pair.
pub fn transcode_profile(
  device_name: &str,
  video_codec: &str,
  max_bitrate: Option<i64>,
) -> DeviceProfile {
  DeviceProfile {
    name: device_name.to_string(),
    max_streaming_bitrate: max_bitrate,
    direct_play_profiles: Vec::new(),
    transcoding_profiles: vec![TranscodingProfile {
      profile_type: "Video".to_string(),
      container: TRANSCODE_CONTAINER.to_string(),
      protocol: TRANSCODE_PROTOCOL.to_string(),
      video_codec: video_codec.to_string(),
      audio_codec: TRANSCODE_AUDIO_CODEC.to_string(),
      context: "Streaming".to_string(),
    }],
    codec_profiles: decode_limit_profiles(),
    subtitle_profiles: subtitle_profiles(BURN_IN_SUBTITLE_FORMATS, "Encode"),
  }
}

/// Bit-depth limits the server must honor when judging direct playability.
fn decode_limit_profiles() -> Vec<CodecProfile> {
  vec![
    CodecProfile {
      profile_type: "Video".to_string(),
      codec: "h264".to_string(),
      conditions: vec![ProfileCondition {
        condition: "LessThanEqual".to_string(),
        property: "VideoBitDepth".to_string(),
        value: "8".to_string(),
        is_required: false,
      }],
    },
    CodecProfile {
      profile_type: "Video".to_string(),
      codec: "hevc".to_string(),
      conditions: vec![ProfileCondition {
        condition: "LessThanEqual".to_string(),
        property: "VideoBitDepth".to_string(),
        value: "10".to_string(),
        is_required: false,
      }],
    },
  ]
}

fn subtitle_profiles(formats: &[&str], method: &str) -> Vec<SubtitleProfile> {
  formats
    .iter()
    .map(|format| SubtitleProfile {
      format: format.to_string(),
      method: method.to_string(),
    })
    .collect()
}
