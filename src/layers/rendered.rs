use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{ExtractionLayer, VideoContext};
use crate::captions::parse_rendered;
use crate::config::Config;
use crate::page::{PageInspector, PanelSelectors, RenderedCue};
use crate::transcript::{LayerKind, TrackKind, TranscriptMetadata, TranscriptResult};
use crate::ExtractionError;

/// Layer 3: scrapes the transcript panel the page renders for viewers.
///
/// When the panel is not already showing, the layer opens it, waits a bounded time
/// for rows to appear and closes it again before returning. An empty wait is
/// retried once.
pub struct RenderedPanelLayer {
    selectors: PanelSelectors,
    panel_wait: Duration,
    poll_interval: Duration,
    retry_delay: Duration,
    budget: Duration,
}

/// An opened transcript panel, closed by [`OpenPanel::close`] or on drop
struct OpenPanel {
    page: Option<Arc<dyn PageInspector>>,
}

impl OpenPanel {
    fn new(page: Arc<dyn PageInspector>) -> Self {
        Self { page: Some(page) }
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close_transcript_panel().await {
                tracing::debug!(error = %e, "failed to close transcript panel");
            }
        }
    }
}

impl Drop for OpenPanel {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close_transcript_panel().await {
                        tracing::debug!(error = %e, "failed to close abandoned transcript panel");
                    }
                });
            }
            Err(_) => tracing::warn!("transcript panel left open, no runtime to close it on"),
        }
    }
}

impl RenderedPanelLayer {
    pub fn new(config: &Config) -> Self {
        let timeouts = &config.extraction.timeouts;
        Self {
            selectors: config.selectors.panel.clone(),
            panel_wait: Duration::from_millis(timeouts.panel_wait_ms),
            poll_interval: Duration::from_millis(timeouts.panel_poll_ms),
            retry_delay: Duration::from_millis(config.extraction.retry_delay_ms),
            budget: Duration::from_millis(timeouts.rendered_panel_ms),
        }
    }

    async fn wait_for_rows(
        &self,
        page: &dyn PageInspector,
    ) -> Result<Vec<RenderedCue>, ExtractionError> {
        let deadline = Instant::now() + self.panel_wait;
        loop {
            let rows = page.rendered_cues(&self.selectors)?;
            if !rows.is_empty() {
                return Ok(rows);
            }
            if Instant::now() + self.poll_interval > deadline {
                return Err(ExtractionError::Transient(format!(
                    "transcript panel rendered no rows within {}ms",
                    self.panel_wait.as_millis()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn rows_via_panel(
        &self,
        page: Arc<dyn PageInspector>,
    ) -> Result<Vec<RenderedCue>, ExtractionError> {
        if !page.open_transcript_panel().await? {
            return Err(ExtractionError::PreconditionUnmet(
                "transcript panel cannot be opened on this page".to_string(),
            ));
        }
        let panel = OpenPanel::new(page.clone());

        let rows = match self.wait_for_rows(page.as_ref()).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "retrying transcript panel wait");
                tokio::time::sleep(self.retry_delay).await;
                self.wait_for_rows(page.as_ref()).await
            }
            other => other,
        };

        panel.close().await;
        rows
    }
}

#[async_trait]
impl ExtractionLayer for RenderedPanelLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::RenderedPanel
    }

    fn time_budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, ctx: &VideoContext) -> Result<TranscriptResult, ExtractionError> {
        let mut rows = ctx.page.rendered_cues(&self.selectors)?;
        if rows.is_empty() {
            rows = self.rows_via_panel(ctx.page.clone()).await?;
        }
        tracing::debug!(rows = rows.len(), "read rendered transcript panel");

        let cues = parse_rendered(&rows)?;
        let metadata = TranscriptMetadata {
            language: None,
            track_kind: TrackKind::Rendered,
            track_name: None,
            source_layer: LayerKind::RenderedPanel,
        };

        Ok(TranscriptResult::from_cues(cues, metadata, LayerKind::RenderedPanel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, row, FakePage};
    use crate::transcript::TranscriptStatus;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn layer() -> RenderedPanelLayer {
        let mut config = Config::default();
        config.extraction.timeouts.panel_wait_ms = 50;
        config.extraction.timeouts.panel_poll_ms = 10;
        config.extraction.retry_delay_ms = 1;
        RenderedPanelLayer::new(&config)
    }

    #[tokio::test]
    async fn test_reads_panel_already_on_screen() {
        let page = FakePage {
            rendered: vec![row("0:00", "first"), row("0:04", "second"), row("1:02", "third")],
            ..FakePage::new()
        };

        let result = layer().attempt(&context(page)).await.unwrap();

        assert_eq!(result.status, TranscriptStatus::Success);
        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.segments[1].duration_seconds, 58.0);
        assert_eq!(result.metadata.unwrap().track_kind, TrackKind::Rendered);
    }

    #[tokio::test]
    async fn test_opens_and_closes_panel() {
        let page = Arc::new(FakePage {
            rendered_after_open: Some(vec![row("0:00", "hi"), row("0:02", "there")]),
            ..FakePage::new()
        });
        let ctx = VideoContext::new("abcdefghijk", page.clone());

        let result = layer().attempt(&ctx).await.unwrap();

        assert_eq!(result.segments.len(), 2);
        assert_eq!(page.closed_count.load(Ordering::SeqCst), 1);
        assert!(!*page.panel_open.lock().unwrap());
    }

    #[tokio::test]
    async fn test_panel_that_stays_empty_is_transient_and_closed() {
        let page = Arc::new(FakePage {
            rendered_after_open: Some(Vec::new()),
            ..FakePage::new()
        });
        let ctx = VideoContext::new("abcdefghijk", page.clone());

        let err = layer().attempt(&ctx).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(page.closed_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_panel_wait_is_retried_once() {
        let page = Arc::new(FakePage {
            rendered_after_open: Some(Vec::new()),
            ..FakePage::new()
        });
        let ctx = VideoContext::new("abcdefghijk", page.clone());

        let started = Instant::now();
        let err = layer().attempt(&ctx).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_transient());
        assert!(elapsed >= Duration::from_millis(80), "waited only {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500));
        assert_eq!(page.closed_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_attempt_still_closes_panel() {
        let mut config = Config::default();
        config.extraction.timeouts.panel_wait_ms = 2_000;
        config.extraction.timeouts.panel_poll_ms = 10;
        let layer = RenderedPanelLayer::new(&config);
        let page = Arc::new(FakePage {
            rendered_after_open: Some(Vec::new()),
            ..FakePage::new()
        });
        let ctx = VideoContext::new("abcdefghijk", page.clone());

        let cut_short = tokio::time::timeout(Duration::from_millis(30), layer.attempt(&ctx)).await;
        assert!(cut_short.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(page.closed_count.load(Ordering::SeqCst), 1);
        assert!(!*page.panel_open.lock().unwrap());
    }

    #[tokio::test]
    async fn test_static_page_without_panel_fails_fast() {
        let err = layer().attempt(&context(FakePage::new())).await.unwrap_err();
        assert!(matches!(err, ExtractionError::PreconditionUnmet(_)));
    }

    #[tokio::test]
    async fn test_bad_timestamps_make_result_partial() {
        let page = FakePage {
            rendered: vec![row("0:00", "ok"), row("soon", "lost"), row("0:05", "fine")],
            ..FakePage::new()
        };

        let result = layer().attempt(&context(page)).await.unwrap();

        assert_eq!(result.status, TranscriptStatus::Partial);
        assert_eq!(result.segments.len(), 2);
    }
}
