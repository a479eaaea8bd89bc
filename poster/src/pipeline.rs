use bytes::Bytes;
use now_playing_common::config::ConfigError;
use now_playing_common::notification::PlaybackNotification;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::artwork::{ArtworkSource, FetchError};
use crate::classify::{classify, RenderDecision};
use crate::compose::{decode_artwork, encode_png, Canvas, ComposeError, DecodeError};
use crate::publish::{PublishError, PublishStatus, Publisher};

/// What a handled notification did to the published file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Published,
    /// Rendered, but a newer notification had already been published.
    Superseded,
}

/// Encoded placeholder shown while nothing is playing. Loaded once at startup.
#[derive(Debug, Clone)]
pub struct Placeholder(Bytes);

impl Placeholder {
    /// Read the placeholder and check that it decodes as an image.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ConfigError::Placeholder(path.display().to_string(), e.to_string()))?;
        decode_artwork(&bytes)
            .map_err(|e| ConfigError::Placeholder(path.display().to_string(), e.to_string()))?;
        Ok(Self(Bytes::from(bytes)))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Turns notifications into published artwork. Cheap to share across
/// request tasks; holds no lock across a render.
pub struct PosterPipeline {
    source: Arc<dyn ArtworkSource>,
    publisher: Arc<Publisher>,
    canvas: Canvas,
    placeholder: Placeholder,
}

impl PosterPipeline {
    pub fn new(
        source: Arc<dyn ArtworkSource>,
        publisher: Arc<Publisher>,
        canvas: Canvas,
        placeholder: Placeholder,
    ) -> Self {
        Self {
            source,
            publisher,
            canvas,
            placeholder,
        }
    }

    /// Classify and perform at most one render. Errors leave the published
    /// file as it was.
    pub async fn handle(&self, notification: &PlaybackNotification) -> Result<Outcome, PipelineError> {
        match classify(notification) {
            RenderDecision::Ignore => {
                debug!(
                    event = ?notification.event,
                    kind = notification.media.as_str(),
                    "ignoring notification"
                );
                Ok(Outcome::Ignored)
            }
            RenderDecision::ShowArtwork(reference) => {
                info!(
                    title = notification.title,
                    kind = notification.media.as_str(),
                    reference,
                    "now playing"
                );
                if reference.is_empty() {
                    return Err(PipelineError::EmptyReference);
                }
                let png = self.render(&reference).await?;
                self.publish(&png, notification.sequence).await
            }
            RenderDecision::ShowBlank => {
                info!(title = notification.title, "media stopped, showing placeholder");
                self.publish(self.placeholder.bytes(), notification.sequence)
                    .await
            }
        }
    }

    async fn render(&self, reference: &str) -> Result<Vec<u8>, PipelineError> {
        let raw = self.source.fetch(reference).await?;

        // Decode and resample off the async workers.
        let canvas = self.canvas;
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, PipelineError> {
            let image = decode_artwork(&raw)?;
            let composed = canvas.composite(&image)?;
            Ok(encode_png(&composed)?)
        })
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))?
    }

    async fn publish(&self, bytes: &[u8], sequence: u64) -> Result<Outcome, PipelineError> {
        match self.publisher.publish(bytes, sequence).await? {
            PublishStatus::Published => Ok(Outcome::Published),
            PublishStatus::Superseded { latest } => {
                warn!(sequence, latest, "render superseded by a newer notification");
                Ok(Outcome::Superseded)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("notification has no artwork reference")]
    EmptyReference,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("render task failed: {0}")]
    Join(String),
}
