//! Hand-written fakes shared by unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::layers::{ExtractionLayer, VideoContext};
use crate::page::{PageError, PageInspector, PanelSelectors, RenderedCue};
use crate::resolver::{CaptionFetcher, FetchError};
use crate::transcript::{LayerKind, TranscriptResult};
use crate::ExtractionError;

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Body(String),
    Json(Value),
    Status(u16),
    Hang,
}

struct Route {
    pattern: String,
    replies: Vec<Reply>,
    served: usize,
}

/// Fetcher answering from canned routes matched by substring, recording every call
#[derive(Default)]
pub(crate) struct FakeFetcher {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(self, pattern: &str, reply: Reply) -> Self {
        self.route_sequence(pattern, vec![reply])
    }

    /// Replies are served in order; the last one repeats
    pub(crate) fn route_sequence(self, pattern: &str, replies: Vec<Reply>) -> Self {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            replies,
            served: 0,
        });
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|url| url.contains(pattern)).count()
    }

    async fn answer(&self, url: &str) -> Result<Reply, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .find(|route| url.contains(&route.pattern))
                .ok_or(FetchError::Status(404))?;
            let index = route.served.min(route.replies.len() - 1);
            route.served += 1;
            route.replies[index].clone()
        };

        match reply {
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Network("hung".into()))
            }
            Reply::Status(code) => Err(FetchError::Status(code)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl CaptionFetcher for FakeFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        match self.answer(url).await? {
            Reply::Body(body) => Ok(body),
            Reply::Json(value) => Ok(value.to_string()),
            _ => Err(FetchError::Network("unexpected reply".into())),
        }
    }

    async fn post_json(&self, url: &str, _body: &Value) -> Result<Value, FetchError> {
        match self.answer(url).await? {
            Reply::Json(value) => Ok(value),
            Reply::Body(body) => {
                serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
            }
            _ => Err(FetchError::Network("unexpected reply".into())),
        }
    }
}

/// Page with fixed contents; tracks panel interactions
#[derive(Default)]
pub(crate) struct FakePage {
    pub(crate) player_response: Option<Value>,
    pub(crate) requests: Vec<String>,
    pub(crate) elements: Vec<String>,
    pub(crate) rendered: Vec<RenderedCue>,
    /// Rows that appear once the panel is opened
    pub(crate) rendered_after_open: Option<Vec<RenderedCue>>,
    pub(crate) panel_open: Mutex<bool>,
    pub(crate) closed_count: AtomicUsize,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_elements(mut self, selectors: &[&str]) -> Self {
        self.elements = selectors.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl PageInspector for FakePage {
    fn player_response(&self) -> Option<Value> {
        self.player_response.clone()
    }

    fn observed_requests(&self) -> Vec<String> {
        self.requests.clone()
    }

    fn has_element(&self, selector: &str) -> Result<bool, PageError> {
        Ok(self.elements.iter().any(|element| element == selector))
    }

    fn rendered_cues(&self, _selectors: &PanelSelectors) -> Result<Vec<RenderedCue>, PageError> {
        if *self.panel_open.lock().unwrap() {
            if let Some(rows) = &self.rendered_after_open {
                return Ok(rows.clone());
            }
        }
        Ok(self.rendered.clone())
    }

    async fn open_transcript_panel(&self) -> Result<bool, PageError> {
        if self.rendered_after_open.is_none() {
            return Ok(false);
        }
        *self.panel_open.lock().unwrap() = true;
        Ok(true)
    }

    async fn close_transcript_panel(&self) -> Result<(), PageError> {
        *self.panel_open.lock().unwrap() = false;
        self.closed_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) fn row(timestamp: &str, text: &str) -> RenderedCue {
    RenderedCue {
        timestamp: timestamp.to_string(),
        text: text.to_string(),
    }
}

pub(crate) fn context(page: impl PageInspector + 'static) -> VideoContext {
    VideoContext::new("abcdefghijk", Arc::new(page))
}

/// What a scripted layer does when attempted
#[derive(Clone)]
pub(crate) enum Script {
    Return(TranscriptResult),
    Fail(fn() -> ExtractionError),
    Sleep(Duration),
}

/// Layer replaying a fixed script and counting its attempts
pub(crate) struct ScriptedLayer {
    kind: LayerKind,
    budget: Duration,
    script: Script,
    pub(crate) attempts: Arc<AtomicUsize>,
}

impl ScriptedLayer {
    pub(crate) fn new(kind: LayerKind, script: Script) -> Self {
        Self {
            kind,
            budget: Duration::from_secs(5),
            script,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub(crate) fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl ExtractionLayer for ScriptedLayer {
    fn kind(&self) -> LayerKind {
        self.kind
    }

    fn time_budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, _ctx: &VideoContext) -> Result<TranscriptResult, ExtractionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Return(result) => Ok(result.clone()),
            Script::Fail(make) => Err(make()),
            Script::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Err(ExtractionError::Transient("slept".into()))
            }
        }
    }
}

/// Player state as embedded in a watch page, advertising one manual English track
pub(crate) fn player_state(video_id: &str) -> Value {
    serde_json::json!({
        "videoDetails": {"videoId": video_id},
        "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {"baseUrl": "https://www.youtube.com/api/timedtext?v=abcdefghijk&lang=en",
             "languageCode": "en", "name": {"simpleText": "English"}}
        ]}}
    })
}

pub(crate) const THREE_CUES_XML: &str = concat!(
    r#"<transcript><text start="0" dur="1">one</text>"#,
    r#"<text start="1" dur="1">two</text>"#,
    r#"<text start="2" dur="1">three</text></transcript>"#
);
