use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{ExtractionLayer, VideoContext};
use crate::captions::{self, CaptionFormat};
use crate::config::Config;
use crate::resolver::{caption_tracks, CaptionFetcher, FetchPolicy, TrackPreference};
use crate::transcript::{LayerKind, TranscriptResult};
use crate::ExtractionError;

/// Layer 1: caption tracks listed in the player state the page embedded at load time
pub struct EmbeddedStateLayer {
    fetcher: Arc<dyn CaptionFetcher>,
    preference: TrackPreference,
    policy: FetchPolicy,
    base_url: String,
    budget: Duration,
}

impl EmbeddedStateLayer {
    pub fn new(config: &Config, fetcher: Arc<dyn CaptionFetcher>) -> Self {
        Self {
            fetcher,
            preference: config.extraction.track_preference(),
            policy: config.extraction.fetch_policy(),
            base_url: config.http.base_url.clone(),
            budget: Duration::from_millis(config.extraction.timeouts.embedded_state_ms),
        }
    }
}

#[async_trait]
impl ExtractionLayer for EmbeddedStateLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::EmbeddedState
    }

    fn time_budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, ctx: &VideoContext) -> Result<TranscriptResult, ExtractionError> {
        let state = ctx.page.player_response().ok_or_else(|| {
            ExtractionError::PreconditionUnmet("page embeds no player state".to_string())
        })?;

        // In-page navigation leaves the first video's state behind
        if let Some(embedded_id) = state["videoDetails"]["videoId"].as_str() {
            if embedded_id != ctx.video_id {
                return Err(ExtractionError::PreconditionUnmet(format!(
                    "embedded player state belongs to {}",
                    embedded_id
                )));
            }
        }

        let tracks = caption_tracks(&state)?;
        let choice = self.preference.select(&tracks).ok_or_else(|| {
            ExtractionError::PreconditionUnmet(
                "no embedded track matches the language preference".to_string(),
            )
        })?;

        let url = choice.caption_url(&self.base_url, CaptionFormat::Xml)?;
        tracing::debug!(language = %choice.track.language_code, "fetching embedded caption track");

        let payload = self.policy.get_text(self.fetcher.as_ref(), &url).await?;
        let cues = captions::parse(&payload, CaptionFormat::Xml)?;

        Ok(TranscriptResult::from_cues(
            cues,
            choice.metadata(LayerKind::EmbeddedState),
            LayerKind::EmbeddedState,
        ))
    }
}
