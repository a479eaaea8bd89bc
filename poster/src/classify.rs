use now_playing_common::notification::{EventKind, MediaKind, PlaybackNotification};

/// What a notification does to the published artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDecision {
    /// Fetch and render the artwork at this reference.
    ShowArtwork(String),
    /// Publish the placeholder.
    ShowBlank,
    Ignore,
}

/// Decide the visible effect of a notification. Pure.
///
/// Only movies and episodes are displayed. For episodes the show-level
/// artwork wins over the episode still when the server supplies one.
pub fn classify(notification: &PlaybackNotification) -> RenderDecision {
    if !matches!(notification.media, MediaKind::Movie | MediaKind::Episode) {
        return RenderDecision::Ignore;
    }

    match notification.event {
        EventKind::Play | EventKind::Resume => {
            let reference = match notification.media {
                MediaKind::Episode if !notification.grandparent_thumb.is_empty() => {
                    &notification.grandparent_thumb
                }
                _ => &notification.thumb,
            };
            RenderDecision::ShowArtwork(reference.clone())
        }
        EventKind::Stop => RenderDecision::ShowBlank,
        EventKind::Other(_) => RenderDecision::Ignore,
    }
}
