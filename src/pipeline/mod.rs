//! Coordinator driving the acquisition layers in order.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

pub mod cancel;

pub use cancel::CancelToken;

use crate::config::Config;
use crate::confirmer::UnavailabilityConfirmer;
use crate::layers::{default_layers, ExtractionLayer, VideoContext};
use crate::resolver::CaptionFetcher;
use crate::transcript::{LayerKind, TranscriptResult, TranscriptStatus};
use crate::ExtractionError;

/// Diagnostic record of one layer attempt
#[derive(Debug, Clone)]
pub(crate) struct ExtractionAttempt {
    pub(crate) layer: LayerKind,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) elapsed: Duration,
    pub(crate) outcome: AttemptOutcome,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Success,
    Partial,
    /// Layer finished but produced nothing usable
    Empty,
    PreconditionUnmet,
    Transient,
    ParseFailure,
    TimedOut,
}

impl ExtractionAttempt {
    fn log(&self) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        let error = self.error.as_deref().unwrap_or("");
        match self.outcome {
            AttemptOutcome::Success | AttemptOutcome::Partial => tracing::info!(
                layer = self.layer.number(),
                name = self.layer.name(),
                started_at = %self.started_at.to_rfc3339(),
                elapsed_ms,
                outcome = ?self.outcome,
                "layer attempt finished"
            ),
            // Expected on most pages; not an error
            AttemptOutcome::PreconditionUnmet => tracing::debug!(
                layer = self.layer.number(),
                name = self.layer.name(),
                started_at = %self.started_at.to_rfc3339(),
                elapsed_ms,
                error,
                "layer skipped"
            ),
            _ => tracing::warn!(
                layer = self.layer.number(),
                name = self.layer.name(),
                started_at = %self.started_at.to_rfc3339(),
                elapsed_ms,
                outcome = ?self.outcome,
                error,
                "layer attempt failed"
            ),
        }
    }
}

/// Runs acquisition layers in priority order, falling back to the unavailability confirmer
pub struct TranscriptPipeline {
    layers: Vec<Box<dyn ExtractionLayer>>,
    confirmer: UnavailabilityConfirmer,
}

impl TranscriptPipeline {
    pub fn new(layers: Vec<Box<dyn ExtractionLayer>>, confirmer: UnavailabilityConfirmer) -> Self {
        Self { layers, confirmer }
    }

    /// The standard four-layer chain
    pub fn from_config(config: &Config, fetcher: Arc<dyn CaptionFetcher>) -> Self {
        Self::new(
            default_layers(config, fetcher),
            UnavailabilityConfirmer::new(&config.selectors),
        )
    }

    /// Layers in the order they are attempted
    pub fn layers(&self) -> impl Iterator<Item = &dyn ExtractionLayer> {
        self.layers.iter().map(|layer| layer.as_ref())
    }

    /// Extract a transcript. Never fails; every layer error becomes "try the next layer".
    pub async fn extract_transcript(&self, ctx: &VideoContext) -> TranscriptResult {
        let never = CancelToken::new();
        match self.extract_transcript_cancellable(ctx, &never).await {
            Ok(result) => result,
            // Unreachable while nobody holds `never`
            Err(e) => TranscriptResult::error(LayerKind::UnavailabilityConfirmer, e.to_string()),
        }
    }

    /// Like [`TranscriptPipeline::extract_transcript`], but stops as soon as `cancel` fires.
    ///
    /// The only error ever returned is [`ExtractionError::Cancelled`]; the suspended
    /// layer is dropped, which aborts its in-flight requests.
    pub async fn extract_transcript_cancellable(
        &self,
        ctx: &VideoContext,
        cancel: &CancelToken,
    ) -> Result<TranscriptResult, ExtractionError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("extract_transcript", %run_id, video_id = %ctx.video_id);

        async {
            let (result, attempts) = self.run(ctx, cancel).await;
            tracing::debug!(attempts = attempts.len(), "pipeline finished");
            result
        }
        .instrument(span)
        .await
    }

    pub(crate) async fn run(
        &self,
        ctx: &VideoContext,
        cancel: &CancelToken,
    ) -> (Result<TranscriptResult, ExtractionError>, Vec<ExtractionAttempt>) {
        let mut attempts = Vec::with_capacity(self.layers.len());
        let mut best_partial: Option<TranscriptResult> = None;

        for layer in &self.layers {
            if cancel.is_cancelled() {
                return (Err(ExtractionError::Cancelled), attempts);
            }

            let started_at = Utc::now();
            let clock = Instant::now();
            let budget = layer.time_budget();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(layer = layer.kind().number(), "extraction cancelled");
                    return (Err(ExtractionError::Cancelled), attempts);
                }
                outcome = tokio::time::timeout(budget, layer.attempt(ctx)) => outcome,
            };

            let (attempt_outcome, error, result) = match outcome {
                Err(_) => (
                    AttemptOutcome::TimedOut,
                    Some(format!("exceeded its {}ms budget", budget.as_millis())),
                    None,
                ),
                Ok(Err(ExtractionError::Cancelled)) => {
                    return (Err(ExtractionError::Cancelled), attempts);
                }
                Ok(Err(e)) => (classify(&e), Some(e.to_string()), None),
                Ok(Ok(result)) => match result.status {
                    TranscriptStatus::Success if !result.segments.is_empty() => {
                        (AttemptOutcome::Success, None, Some(result))
                    }
                    TranscriptStatus::Partial if !result.segments.is_empty() => {
                        (AttemptOutcome::Partial, result.error.clone(), Some(result))
                    }
                    status => (
                        AttemptOutcome::Empty,
                        Some(
                            result
                                .error
                                .unwrap_or_else(|| format!("returned {} without segments", status)),
                        ),
                        None,
                    ),
                },
            };

            let attempt = ExtractionAttempt {
                layer: layer.kind(),
                started_at,
                elapsed: clock.elapsed(),
                outcome: attempt_outcome,
                error,
            };
            attempt.log();
            attempts.push(attempt);

            match (attempt_outcome, result) {
                (AttemptOutcome::Success, Some(result)) => return (Ok(result), attempts),
                (AttemptOutcome::Partial, Some(result)) => {
                    let better = best_partial
                        .as_ref()
                        .map_or(true, |best| result.segments.len() > best.segments.len());
                    if better {
                        best_partial = Some(result);
                    }
                }
                _ => {}
            }
        }

        if let Some(partial) = best_partial {
            tracing::info!(
                layer = partial.extraction_layer.number(),
                "returning best partial transcript"
            );
            return (Ok(partial), attempts);
        }

        if cancel.is_cancelled() {
            return (Err(ExtractionError::Cancelled), attempts);
        }

        (Ok(self.confirmer.confirm_unavailable(ctx)), attempts)
    }
}

fn classify(err: &ExtractionError) -> AttemptOutcome {
    match err {
        ExtractionError::PreconditionUnmet(_) => AttemptOutcome::PreconditionUnmet,
        ExtractionError::Transient(_) => AttemptOutcome::Transient,
        ExtractionError::Parse(_) => AttemptOutcome::ParseFailure,
        ExtractionError::Cancelled => AttemptOutcome::Transient,
    }
}
