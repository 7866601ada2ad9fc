//! Playback negotiation module.
//!
//! Architecture:
//! - `profile.rs` - outbound device-profile construction per strategy
//! - `url.rs` - delivery URL assembly and credential handling
//! - `negotiate.rs` - strategy decision, candidate selection, URL resolution

mod negotiate;
mod profile;
mod url;

pub use negotiate::{
  NegotiationRequest, Negotiator, PlayIntent, PlayStrategy, PlaybackStreamInfo, TranscodeSpec,
};
pub use profile::{direct_play_profile, transcode_profile, TranscodeQuality};
