//! Stream URL assembly and credential handling.

/// Query parameter names that already carry a credential, matched
/// case-insensitively.
const CREDENTIAL_PARAMS: &[&str] = &["api_key", "apikey"];

/// Marker identifying a segmented-playlist delivery URL.
pub(crate) fn is_segmented_playlist(url: &str) -> bool {
  url.to_ascii_lowercase().contains(".m3u8")
}

/// Whether the query string already names a credential parameter.
pub(crate) fn has_credential_param(url: &str) -> bool {
  let Some(query) = url.splitn(2, '?').nth(1) else {
    return false;
  };
  query.split('&').any(|pair| {
    let name = pair.splitn(2, '=').next().unwrap_or("");
    CREDENTIAL_PARAMS.iter().any(|c| name.eq_ignore_ascii_case(c))
  })
}

/// Append `api_key` unless some casing of a credential parameter is
/// already present.
pub(crate) fn with_credential(url: &str, token: &str) -> String {
  if has_credential_param(url) {
    return url.to_string();
  }
  let separator = if url.contains('?') { '&' } else { '?' };
  format!("{}{}api_key={}", url, separator, token)
}

/// Merge a server-relative delivery path against the base URL. Absolute
/// paths pass through unchanged.
pub(crate) fn merge_with_base(base: &str, path: &str) -> String {
  if path.starts_with("http://") || path.starts_with("https://") {
    return path.to_string();
  }
  let base = base.trim_end_matches('/');
  if path.starts_with('/') {
    format!("{}{}", base, path)
  } else {
    format!("{}/{}", base, path)
  }
}

/// Synthesize the direct byte-range URL for a media source.
///
/// The source path on the wire points at the server's filesystem, so the
/// stream endpoint is always used, never the raw path.
pub(crate) fn direct_stream_url(
  base: &str,
  item_id: &str,
  container: &str,
  source_id: &str,
  audio_stream_index: Option<i32>,
  subtitle_stream_index: Option<i32>,
  token: &str,
) -> String {
  let mut url = format!(
    "{}/Videos/{}/stream.{}?Static=true&MediaSourceId={}",
    base.trim_end_matches('/'),
    item_id,
    container,
    source_id
  );
  if let Some(index) = audio_stream_index {
    url.push_str(&format!("&AudioStreamIndex={}", index));
  }
  if let Some(index) = subtitle_stream_index {
    url.push_str(&format!("&SubtitleStreamIndex={}", index));
  }
  with_credential(&url, token)
}
