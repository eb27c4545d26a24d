use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod direct;
pub mod embedded;
pub mod interception;
pub mod rendered;

pub use direct::DirectFetchLayer;
pub use embedded::EmbeddedStateLayer;
pub use interception::InterceptionLayer;
pub use rendered::RenderedPanelLayer;

use crate::config::Config;
use crate::page::PageInspector;
use crate::resolver::{CaptionFetcher, CaptionTrack};
use crate::transcript::{LayerKind, TranscriptResult};
use crate::ExtractionError;

/// Everything a layer may look at for one video view
#[derive(Clone)]
pub struct VideoContext {
    pub video_id: String,

    /// Read surface over the page currently showing the video
    pub page: Arc<dyn PageInspector>,

    /// Tracks discovered before the pipeline ran, if any
    pub known_tracks: Vec<CaptionTrack>,
}

impl VideoContext {
    pub fn new(video_id: impl Into<String>, page: Arc<dyn PageInspector>) -> Self {
        Self {
            video_id: video_id.into(),
            page,
            known_tracks: Vec::new(),
        }
    }

    pub fn with_known_tracks(mut self, tracks: Vec<CaptionTrack>) -> Self {
        self.known_tracks = tracks;
        self
    }
}

/// One transcript acquisition strategy
#[async_trait]
pub trait ExtractionLayer: Send + Sync {
    /// Position and name of this layer
    fn kind(&self) -> LayerKind;

    /// Upper bound on a whole attempt, enforced by the coordinator
    fn time_budget(&self) -> Duration;

    /// Try to produce a transcript.
    ///
    /// Layers whose preconditions do not hold must fail immediately with
    /// [`ExtractionError::PreconditionUnmet`] instead of waiting.
    async fn attempt(&self, ctx: &VideoContext) -> Result<TranscriptResult, ExtractionError>;
}

/// The default chain, cheapest and most reliable first
pub fn default_layers(
    config: &Config,
    fetcher: Arc<dyn CaptionFetcher>,
) -> Vec<Box<dyn ExtractionLayer>> {
    vec![
        Box::new(EmbeddedStateLayer::new(config, Arc::clone(&fetcher))),
        Box::new(InterceptionLayer::new(config, Arc::clone(&fetcher))),
        Box::new(RenderedPanelLayer::new(config)),
        Box::new(DirectFetchLayer::new(config, fetcher)),
    ]
}
