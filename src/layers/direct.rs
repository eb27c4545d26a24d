use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{ExtractionLayer, VideoContext};
use crate::captions::{self, CaptionFormat};
use crate::config::{Config, HttpConfig};
use crate::resolver::{caption_tracks, CaptionFetcher, CaptionTrack, FetchPolicy, TrackPreference};
use crate::transcript::{LayerKind, TranscriptResult};
use crate::ExtractionError;

/// Layer 4: asks the player endpoint for caption tracks and downloads one directly.
///
/// Works without any page state, so it is the only acquisition layer that can
/// succeed when the watch page itself could not be loaded.
pub struct DirectFetchLayer {
    fetcher: Arc<dyn CaptionFetcher>,
    preference: TrackPreference,
    policy: FetchPolicy,
    http: HttpConfig,
    budget: Duration,
}

impl DirectFetchLayer {
    pub fn new(config: &Config, fetcher: Arc<dyn CaptionFetcher>) -> Self {
        Self {
            fetcher,
            preference: config.extraction.track_preference(),
            policy: config.extraction.fetch_policy(),
            http: config.http.clone(),
            budget: Duration::from_millis(config.extraction.timeouts.direct_fetch_ms),
        }
    }

    fn player_endpoint(&self) -> String {
        let mut endpoint = format!(
            "{}/youtubei/v1/player",
            self.http.base_url.trim_end_matches('/')
        );
        if let Some(key) = &self.http.innertube_api_key {
            endpoint.push_str("?key=");
            endpoint.push_str(&urlencoding::encode(key));
        }
        endpoint
    }

    fn player_request(&self, video_id: &str) -> Value {
        json!({
            "context": {
                "client": {
                    "clientName": self.http.innertube_client_name,
                    "clientVersion": self.http.innertube_client_version,
                    "hl": "en",
                }
            },
            "videoId": video_id,
        })
    }

    /// Caption tracks the player endpoint advertises for `video_id`
    pub async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, ExtractionError> {
        let response = self
            .policy
            .post_json(
                self.fetcher.as_ref(),
                &self.player_endpoint(),
                &self.player_request(video_id),
            )
            .await?;

        let playability = &response["playabilityStatus"];
        if let Some(status) = playability["status"].as_str() {
            if status != "OK" {
                let reason = playability["reason"].as_str().unwrap_or("no reason given");
                return Err(ExtractionError::PreconditionUnmet(format!(
                    "video is not playable ({}): {}",
                    status, reason
                )));
            }
        }

        caption_tracks(&response)
    }
}

#[async_trait]
impl ExtractionLayer for DirectFetchLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::DirectFetch
    }

    fn time_budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, ctx: &VideoContext) -> Result<TranscriptResult, ExtractionError> {
        let tracks = if ctx.known_tracks.is_empty() {
            self.list_tracks(&ctx.video_id).await?
        } else {
            ctx.known_tracks.clone()
        };

        let choice = self.preference.select(&tracks).ok_or_else(|| {
            ExtractionError::PreconditionUnmet(format!(
                "none of {} advertised tracks matches the language preference",
                tracks.len()
            ))
        })?;

        let url = choice.caption_url(&self.http.base_url, CaptionFormat::Json)?;
        tracing::debug!(language = %choice.track.language_code, "fetching caption track directly");

        let payload = self.policy.get_text(self.fetcher.as_ref(), &url).await?;
        let cues = captions::parse(&payload, CaptionFormat::Json)?;

        Ok(TranscriptResult::from_cues(
            cues,
            choice.metadata(LayerKind::DirectFetch),
            LayerKind::DirectFetch,
        ))
    }
}
