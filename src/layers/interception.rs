use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{ExtractionLayer, VideoContext};
use crate::captions::{self, CaptionFormat};
use crate::config::Config;
use crate::resolver::tracks::absolute_url;
use crate::resolver::{CaptionFetcher, FetchPolicy};
use crate::transcript::{LayerKind, TrackKind, TranscriptMetadata, TranscriptResult};
use crate::ExtractionError;

const TIMEDTEXT_PATH: &str = "/api/timedtext";

/// Layer 2: replays the caption request the player itself already issued
pub struct InterceptionLayer {
    fetcher: Arc<dyn CaptionFetcher>,
    policy: FetchPolicy,
    base_url: String,
    budget: Duration,
}

impl InterceptionLayer {
    pub fn new(config: &Config, fetcher: Arc<dyn CaptionFetcher>) -> Self {
        Self {
            fetcher,
            policy: config.extraction.fetch_policy(),
            base_url: config.http.base_url.clone(),
            budget: Duration::from_millis(config.extraction.timeouts.interception_ms),
        }
    }

    /// Most recent observed caption request for `video_id`
    fn latest_caption_request(&self, requests: &[String], video_id: &str) -> Option<Url> {
        requests
            .iter()
            .rev()
            .filter_map(|raw| absolute_url(&self.base_url, raw).ok())
            .find(|url| {
                url.path().ends_with(TIMEDTEXT_PATH)
                    && query_param(url, "v").as_deref() == Some(video_id)
            })
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn request_metadata(url: &Url) -> TranscriptMetadata {
    let translated = query_param(url, "tlang");
    let track_kind = if translated.is_some() {
        TrackKind::Translated
    } else if query_param(url, "kind").as_deref() == Some("asr") {
        TrackKind::Generated
    } else {
        TrackKind::Manual
    };

    TranscriptMetadata {
        language: translated.or_else(|| query_param(url, "lang")),
        track_kind,
        track_name: query_param(url, "name").filter(|name| !name.is_empty()),
        source_layer: LayerKind::NetworkInterception,
    }
}

#[async_trait]
impl ExtractionLayer for InterceptionLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::NetworkInterception
    }

    fn time_budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, ctx: &VideoContext) -> Result<TranscriptResult, ExtractionError> {
        let requests = ctx.page.observed_requests();
        let url = self
            .latest_caption_request(&requests, &ctx.video_id)
            .ok_or_else(|| {
                ExtractionError::PreconditionUnmet(format!(
                    "no caption request observed for {} among {} requests",
                    ctx.video_id,
                    requests.len()
                ))
            })?;

        let format = CaptionFormat::from_fmt_param(query_param(&url, "fmt").as_deref());
        tracing::debug!(%url, %format, "replaying observed caption request");

        let payload = self.policy.get_text(self.fetcher.as_ref(), url.as_str()).await?;
        let cues = captions::parse(&payload, format)?;

        Ok(TranscriptResult::from_cues(
            cues,
            request_metadata(&url),
            LayerKind::NetworkInterception,
        ))
    }
}
