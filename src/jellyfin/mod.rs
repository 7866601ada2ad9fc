//! Jellyfin API client module.
//!
//! Connection state, authenticated REST calls, catalog queries, user-data
//! writes, and playback negotiation/reporting endpoints.

mod client;
pub mod types;

pub use client::ApiClient;
pub(crate) use client::redact_url;
pub use types::*;
