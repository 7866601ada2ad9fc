//! Jellyfin HTTP client for REST API calls.

use parking_lot::RwLock;
use reqwest::{header, Client, Method};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::model::{entry_from_item, MediaEntry};

use super::types::*;

/// Device info for client identification.
const DEFAULT_DEVICE_NAME: &str = "Jellysync";
const DEVICE_ID_PREFIX: &str = "jsync-";
const CLIENT_NAME: &str = "Jellysync";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Item query fields needed to build cache entries and negotiate playback.
const ITEM_FIELDS: &str = "MediaSources,MediaStreams";

/// Jellyfin HTTP API client.
pub struct ApiClient {
  http: Client,
  state: Arc<RwLock<ClientState>>,
}

/// Internal connection state.
struct ClientState {
  server_url: Option<String>,
  access_token: Option<String>,
  user_id: Option<String>,
  user_name: Option<String>,
  server_name: Option<String>,
  device_id: String,
  device_name: String,
}

impl ApiClient {
  /// Create a new client with a freshly generated device id.
  pub fn new() -> Self {
    let device_id = format!("{}{}", DEVICE_ID_PREFIX, Uuid::new_v4());

    Self {
      http: Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client"),
      state: Arc::new(RwLock::new(ClientState {
        server_url: None,
        access_token: None,
        user_id: None,
        user_name: None,
        server_name: None,
        device_id,
        device_name: DEFAULT_DEVICE_NAME.to_string(),
      })),
    }
  }

  /// Set the device name reported to the server.
  pub fn set_device_name(&self, name: String) {
    self.state.write().device_name = name;
  }

  /// Get the device ID.
  pub fn device_id(&self) -> String {
    self.state.read().device_id.clone()
  }

  /// Build authorization header value.
  fn auth_header(&self, token: Option<&str>) -> String {
    let state = self.state.read();
    let mut header = format!(
      r#"MediaBrowser Client="{}", Device="{}", DeviceId="{}", Version="{}""#,
      CLIENT_NAME, state.device_name, state.device_id, CLIENT_VERSION
    );
    if let Some(token) = token {
      header.push_str(&format!(r#", Token="{}""#, token));
    }
    header
  }

  /// Authenticate with the server.
  pub async fn authenticate(&self, creds: &Credentials) -> Result<AuthResponse> {
    let server_url = creds.server_url.trim_end_matches('/').to_string();

    if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
      return Err(CoreError::Validation(
        "Server URL must start with http:// or https://".to_string(),
      ));
    }

    let url = format!("{}/Users/AuthenticateByName", server_url);

    let body = serde_json::json!({
      "Username": creds.username,
      "Pw": creds.password
    });

    let response = self
      .http
      .post(&url)
      .header(header::CONTENT_TYPE, "application/json")
      .header("X-Emby-Authorization", self.auth_header(None))
      .json(&body)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let text = response.text().await.unwrap_or_default();
      return Err(CoreError::Remote(format!(
        "Authentication failed: HTTP {} - {}",
        status, text
      )));
    }

    let auth: AuthResponse = response
      .json()
      .await
      .map_err(|e| CoreError::Remote(format!("Malformed auth response: {}", e)))?;

    {
      let mut state = self.state.write();
      state.server_url = Some(server_url);
      state.access_token = Some(auth.access_token.clone());
      state.user_id = Some(auth.user.id.clone());
      state.user_name = Some(auth.user.name.clone());
    }

    self.fetch_server_info().await.ok();

    Ok(auth)
  }

  /// Fetch server public info.
  async fn fetch_server_info(&self) -> Result<ServerInfo> {
    let server_url = self.server_url()?;
    let url = format!("{}/System/Info/Public", server_url);

    let response = self.http.get(&url).send().await?;
    let info: ServerInfo = response
      .json()
      .await
      .map_err(|e| CoreError::Remote(format!("Malformed server info: {}", e)))?;

    {
      let mut state = self.state.write();
      state.server_name = Some(info.server_name.clone());
    }

    Ok(info)
  }

  /// Disconnect from the server.
  pub fn disconnect(&self) {
    let mut state = self.state.write();
    state.server_url = None;
    state.access_token = None;
    state.user_id = None;
    state.user_name = None;
    state.server_name = None;
  }

  /// Restore a session from saved data.
  ///
  /// Validates the token by making a test API call.
  pub async fn restore_session(&self, session: &SavedSession) -> Result<()> {
    {
      let mut state = self.state.write();
      state.server_url = Some(session.server_url.clone());
      state.access_token = Some(session.access_token.clone());
      state.user_id = Some(session.user_id.clone());
      state.user_name = Some(session.user_name.clone());
      state.server_name = session.server_name.clone();
      // Restore device_id if present, otherwise keep the generated one
      if let Some(saved_device_id) = &session.device_id {
        state.device_id = saved_device_id.clone();
      }
    }

    match self.fetch_server_info().await {
      Ok(_) => Ok(()),
      Err(e) => {
        self.disconnect();
        Err(CoreError::Remote(format!("Session validation failed: {}", e)))
      }
    }
  }

  /// Get current session data for persistence.
  pub fn saved_session(&self) -> Option<SavedSession> {
    let state = self.state.read();
    if let (Some(server_url), Some(access_token), Some(user_id), Some(user_name)) = (
      state.server_url.clone(),
      state.access_token.clone(),
      state.user_id.clone(),
      state.user_name.clone(),
    ) {
      Some(SavedSession {
        server_url,
        access_token,
        user_id,
        user_name,
        server_name: state.server_name.clone(),
        device_id: Some(state.device_id.clone()),
      })
    } else {
      None
    }
  }

  /// Check if connected.
  pub fn is_connected(&self) -> bool {
    self.state.read().access_token.is_some()
  }

  /// Get current connection state.
  pub fn connection_state(&self) -> ConnectionState {
    let state = self.state.read();
    ConnectionState {
      connected: state.access_token.is_some(),
      server_url: state.server_url.clone(),
      server_name: state.server_name.clone(),
      user_name: state.user_name.clone(),
    }
  }

  /// Get server URL or error if not connected.
  pub(crate) fn server_url(&self) -> Result<String> {
    self
      .state
      .read()
      .server_url
      .clone()
      .ok_or_else(|| CoreError::Validation("Not connected to a server".to_string()))
  }

  /// Get access token or error if not connected.
  pub(crate) fn access_token(&self) -> Result<String> {
    self
      .state
      .read()
      .access_token
      .clone()
      .ok_or_else(|| CoreError::Validation("Not connected to a server".to_string()))
  }

  /// Get user ID or error if not connected.
  pub fn user_id(&self) -> Result<String> {
    self
      .state
      .read()
      .user_id
      .clone()
      .ok_or_else(|| CoreError::Validation("No signed-in user".to_string()))
  }

  /// Make an authenticated GET request.
  pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
    let server_url = self.server_url()?;
    let token = self.access_token()?;
    let url = format!("{}{}", server_url, path);

    let response = self
      .http
      .get(&url)
      .header("X-Emby-Authorization", self.auth_header(Some(&token)))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      log::error!("GET {} failed with status {}: {}", path, status, body);
      return Err(CoreError::Remote(format!("HTTP {} - {}", status, body)));
    }

    Ok(response.json().await?)
  }

  /// Make an authenticated POST request.
  pub async fn post<T: serde::de::DeserializeOwned, B: serde::Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T> {
    let server_url = self.server_url()?;
    let token = self.access_token()?;
    let url = format!("{}{}", server_url, path);

    let response = self
      .http
      .post(&url)
      .header(header::CONTENT_TYPE, "application/json")
      .header("X-Emby-Authorization", self.auth_header(Some(&token)))
      .json(body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      log::error!("POST {} failed with status {}: {}", path, status, body);
      return Err(CoreError::Remote(format!("HTTP {} - {}", status, body)));
    }

    Ok(response.json().await?)
  }

  /// Make an authenticated request without expecting a response body.
  async fn send_empty<B: serde::Serialize>(
    &self,
    method: Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<()> {
    let server_url = self.server_url()?;
    let token = self.access_token()?;
    let url = format!("{}{}", server_url, path);

    let mut request = self
      .http
      .request(method.clone(), &url)
      .header("X-Emby-Authorization", self.auth_header(Some(&token)));
    if let Some(body) = body {
      request = request
        .header(header::CONTENT_TYPE, "application/json")
        .json(body);
    }

    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      log::error!("{} {} failed with status {}: {}", method, path, status, body);
      return Err(CoreError::Remote(format!("HTTP {} - {}", status, body)));
    }

    Ok(())
  }

  /// Make an authenticated POST request without expecting a response body.
  pub async fn post_empty<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
    self.send_empty(Method::POST, path, Some(body)).await
  }

  /// Get media item by ID, including its sources and streams.
  pub async fn get_item(&self, item_id: &str) -> Result<BaseItem> {
    let user_id = self.user_id()?;
    self
      .get(&format!(
        "/Users/{}/Items/{}?Fields={}",
        user_id, item_id, ITEM_FIELDS
      ))
      .await
  }

  /// Get media item by ID, mapped to a cache entry.
  pub async fn get_entry(&self, item_id: &str) -> Result<MediaEntry> {
    let item = self.get_item(item_id).await?;
    Ok(entry_from_item(&item))
  }

  /// Items the user is partway through, most recently played first.
  pub async fn get_resume_items(&self, start_index: usize, limit: usize) -> Result<ItemsResponse> {
    let user_id = self.user_id()?;
    self
      .get(&format!(
        "/Users/{}/Items/Resume?StartIndex={}&Limit={}&MediaTypes=Video&Fields={}",
        user_id, start_index, limit, ITEM_FIELDS
      ))
      .await
  }

  /// Next unwatched episodes across the user's shows.
  pub async fn get_next_up(&self, limit: usize) -> Result<ItemsResponse> {
    let user_id = self.user_id()?;
    self
      .get(&format!(
        "/Shows/NextUp?UserId={}&Limit={}&Fields={}",
        user_id, limit, ITEM_FIELDS
      ))
      .await
  }

  /// Mark or unmark an item as favorite.
  pub async fn set_favorite_remote(&self, item_id: &str, value: bool) -> Result<()> {
    let user_id = self.user_id()?;
    let path = format!("/Users/{}/FavoriteItems/{}", user_id, item_id);
    let method = if value { Method::POST } else { Method::DELETE };
    self.send_empty::<()>(method, &path, None).await
  }

  /// Mark or unmark an item as played.
  pub async fn set_played_remote(&self, item_id: &str, value: bool) -> Result<()> {
    let user_id = self.user_id()?;
    let path = format!("/Users/{}/PlayedItems/{}", user_id, item_id);
    let method = if value { Method::POST } else { Method::DELETE };
    self.send_empty::<()>(method, &path, None).await
  }

  /// Add or remove an item from the user's watchlist.
  pub async fn set_watchlist_remote(&self, item_id: &str, value: bool) -> Result<()> {
    let user_id = self.user_id()?;
    let path = format!("/Users/{}/WatchlistItems/{}", user_id, item_id);
    let method = if value { Method::POST } else { Method::DELETE };
    self.send_empty::<()>(method, &path, None).await
  }

  /// Negotiate playback for an item against the server's capability API.
  pub async fn get_playback_info(
    &self,
    item_id: &str,
    request: &PlaybackInfoRequest,
  ) -> Result<PlaybackInfoResponse> {
    let path = format!("/Items/{}/PlaybackInfo", item_id);
    self.post(&path, request).await
  }

  /// Report playback started.
  pub async fn report_playback_start(&self, info: &PlaybackStartInfo) -> Result<()> {
    self.post_empty("/Sessions/Playing", info).await
  }

  /// Report playback progress.
  pub async fn report_playback_progress(&self, info: &PlaybackProgressInfo) -> Result<()> {
    self.post_empty("/Sessions/Playing/Progress", info).await
  }

  /// Report playback stopped.
  pub async fn report_playback_stop(&self, info: &PlaybackStopInfo) -> Result<()> {
    self.post_empty("/Sessions/Playing/Stopped", info).await
  }
}

impl Default for ApiClient {
  fn default() -> Self {
    Self::new()
  }
}

/// Redact sensitive query parameters from URLs for logging.
/// Replaces api_key=XXX with api_key=[REDACTED].
pub(crate) fn redact_url(url: &str) -> String {
  if let Some(idx) = url.find("api_key=") {
    let start = idx + 8; // length of "api_key="
    let end = url[start..].find('&').map(|i| start + i).unwrap_or(url.len());
    format!("{}[REDACTED]{}", &url[..start], &url[end..])
  } else {
    url.to_string()
  }
}
