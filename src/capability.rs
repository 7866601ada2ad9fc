//! Local decode capability boundary.

/// Dynamic range of a video stream as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoRange {
  #[default]
  Sdr,
  Hdr10,
  Hdr10Plus,
  Hlg,
  DolbyVision,
  Unknown,
}

impl VideoRange {
  /// Parse the server's `VideoRangeType` string.
  pub fn from_wire(value: Option<&str>) -> Self {
    match value {
      Some(s) if s.eq_ignore_ascii_case("SDR") => VideoRange::Sdr,
      Some(s) if s.eq_ignore_ascii_case("HDR10") => VideoRange::Hdr10,
      Some(s) if s.eq_ignore_ascii_case("HDR10Plus") => VideoRange::Hdr10Plus,
      Some(s) if s.eq_ignore_ascii_case("HLG") => VideoRange::Hlg,
      Some(s) if s.eq_ignore_ascii_case("DOVI") => VideoRange::DolbyVision,
      Some(_) => VideoRange::Unknown,
      None => VideoRange::Unknown,
    }
  }

  pub fn is_hdr(self) -> bool {
    matches!(
      self,
      VideoRange::Hdr10 | VideoRange::Hdr10Plus | VideoRange::Hlg | VideoRange::DolbyVision
    )
  }
}

/// Answers whether the device can decode a stream without server help.
///
/// Implemented by the OS-specific probe; [`StaticCapabilities`] is the
/// list-backed stand-in for tests and conservative defaults.
pub trait DecodeCapability: Send + Sync {
  /// Whether the codec, with the given range/profile/bit depth, decodes
  /// locally.
  fn supports_video(
    &self,
    codec: &str,
    range: VideoRange,
    profile: Option<&str>,
    bit_depth: Option<i32>,
  ) -> bool;

  /// Video codecs the device prefers as transcode targets, best first.
  fn ranked_video_codecs(&self) -> Vec<String>;
}

/// Capability probe backed by static lists.
pub struct StaticCapabilities {
  video_codecs: Vec<String>,
  hdr_capable: bool,
  max_bit_depth: i32,
}

impl StaticCapabilities {
  pub fn new(video_codecs: Vec<String>, hdr_capable: bool, max_bit_depth: i32) -> Self {
    Self {
      video_codecs,
      hdr_capable,
      max_bit_depth,
    }
  }

  /// Conservative default: 8-bit SDR h264 only.
  pub fn baseline() -> Self {
    Self::new(vec!["h264".to_string()], false, 8)
  }
}

impl DecodeCapability for StaticCapabilities {
  fn supports_video(
    &self,
    codec: &str,
    range: VideoRange,
    _profile: Option<&str>,
    bit_depth: Option<i32>,
  ) -> bool {
    if !self.video_codecs.iter().any(|c| c.eq_ignore_ascii_case(codec)) {
      return false;
    }
    if range.is_hdr() && !self.hdr_capable {
      return false;
    }
    if let Some(depth) = bit_depth {
      if depth > self.max_bit_depth {
        return false;
      }
    }
    true
  }

  fn ranked_video_codecs(&self) -> Vec<String> {
    self.video_codecs.clone()
  }
}
