//! Active video track inference
//!
//! Adaptive streams never say which variant is playing. The engine's access
//! log does record which playlist it fetched last, so the active variant is
//! the known track whose identifier equals that URI relative to the master
//! playlist's directory.
//!
//! ```text
//! source   https://host/path/master.m3u8?token=1
//! base     https://host/path/
//! log      https://host/path/track-720p.m3u8
//! active   track-720p.m3u8
//! ```

use player_signal::{AccessLogEntry, TrackHandle};
use url::Url;

/// Directory of the item's source URI, with query and fragment removed
pub fn base_uri(source_uri: &str) -> String {
    match Url::parse(source_uri) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            match url.join("./") {
                Ok(base) => base.to_string(),
                Err(_) => fallback_base_uri(source_uri),
            }
        }
        Err(_) => fallback_base_uri(source_uri),
    }
}

fn fallback_base_uri(source_uri: &str) -> String {
    let path = source_uri.split(['?', '#']).next().unwrap_or_default();
    match path.rfind('/') {
        Some(slash) => path[..=slash].to_string(),
        None => String::new(),
    }
}

/// Identifier of the variant fetched most recently
///
/// Entries without a URI are skipped. A URI outside the base directory is
/// returned whole.
pub fn active_identifier(source_uri: &str, log: &[AccessLogEntry]) -> Option<String> {
    let latest = log.iter().rev().find_map(|entry| entry.uri.as_deref())?;
    let base = base_uri(source_uri);

    let identifier = if base.is_empty() {
        latest
    } else {
        latest.strip_prefix(base.as_str()).unwrap_or(latest)
    };
    Some(identifier.to_string())
}

/// Known track matching the most recent access-log entry
pub fn find_active_track<'a>(
    source_uri: &str,
    log: &[AccessLogEntry],
    tracks: &'a [TrackHandle],
) -> Option<&'a TrackHandle> {
    let identifier = active_identifier(source_uri, log)?;
    tracks.iter().find(|track| track.id == identifier)
}

/// First video track, for sources that expose their tracks directly
pub fn first_video_track(tracks: &[TrackHandle]) -> Option<&TrackHandle> {
    tracks.iter().find(|track| track.is_video())
}
