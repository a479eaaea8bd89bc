//! Event-to-render pipeline for the now-playing poster.
//!
//! A webhook notification is classified, the matching artwork is fetched and
//! fitted onto a fixed canvas (or the placeholder is chosen), and the result
//! is published to a single file by atomic rename.

pub mod artwork;
pub mod classify;
pub mod compose;
pub mod pipeline;
pub mod publish;

pub use artwork::{ArtworkSource, FetchError, PlexArtwork};
pub use classify::{classify, RenderDecision};
pub use compose::{composite, Canvas, ComposeError, DecodeError};
pub use pipeline::{Outcome, PipelineError, Placeholder, PosterPipeline};
pub use publish::{PublishError, PublishStatus, Publisher};
