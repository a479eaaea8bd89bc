use serde::Deserialize;

/// Playback state change reported by the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Play,
    Resume,
    Stop,
    /// Pause, scrobble, rate, library events and anything else.
    Other(String),
}

impl EventKind {
    pub fn from_wire(event: &str) -> Self {
        match event {
            "media.play" => Self::Play,
            "media.resume" => Self::Resume,
            "media.stop" => Self::Stop,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Episode,
    /// Trailers, clips, tracks, photos.
    Other(String),
}

impl MediaKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "movie" => Self::Movie,
            "episode" => Self::Episode,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Movie => "movie",
            Self::Episode => "episode",
            Self::Other(kind) => kind,
        }
    }
}

/// A decoded webhook notification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackNotification {
    pub event: EventKind,
    pub media: MediaKind,
    pub title: String,
    /// Item-level artwork path, e.g. `/library/metadata/1/thumb/1700000000`.
    pub thumb: String,
    /// Show-level artwork for episodes. Empty when absent.
    pub grandparent_thumb: String,
    /// Receipt order stamped by the receiver; higher is newer.
    pub sequence: u64,
}

/// JSON carried in the `payload` form field.
///
/// ```json
/// {"event":"media.play","Metadata":{"type":"movie","title":"...","thumb":"/library/...","grandparentThumb":""}}
/// ```
#[derive(Debug, Deserialize)]
struct WirePayload {
    event: String,
    #[serde(rename = "Metadata", default)]
    metadata: WireMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct WireMetadata {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumb: String,
    #[serde(rename = "grandparentThumb", default)]
    grandparent_thumb: String,
}

impl PlaybackNotification {
    /// Decode the JSON `payload` field of a webhook request.
    pub fn from_json(payload: &str, sequence: u64) -> Result<Self, PayloadError> {
        let wire: WirePayload =
            serde_json::from_str(payload).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        Ok(Self {
            event: EventKind::from_wire(&wire.event),
            media: MediaKind::from_wire(&wire.metadata.kind),
            title: wire.metadata.title,
            thumb: wire.metadata.thumb,
            grandparent_thumb: wire.metadata.grandparent_thumb,
            sequence,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("missing payload field")]
    MissingPayload,
    #[error("malformed form data: {0}")]
    MalformedForm(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
}
