//! # Audio Module
//!
//! Track model, shared playback queue and the songbird-backed player.
//!
//! ## Architecture
//!
//! ### [`track`] - Track Model
//! - Immutable track metadata resolved by a source service
//! - Playlists that own their tracks; tracks keep a non-owning back-reference
//!
//! ### [`queue`] - Queue Management
//! - Thread-safe ordered queue shared by every chat command
//! - 1-based positional insertion, duration limits, batch insertion
//! - Single extraction point (`next`) for the player
//!
//! ### [`player`] - Audio Player
//! - Pulls tracks from the queue and streams them into the voice call
//! - Advances on track end and publishes the playback position
//!
//! ### [`download`] - Local Cache
//! - Materializes tracks on disk with yt-dlp when caching is enabled

pub mod download;
pub mod player;
pub mod queue;
pub mod track;

use std::time::Duration;

/// Formatea una duración como `m:ss` o `h:mm:ss`.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
