//! Terminal verdict once every acquisition layer has failed.
//!
//! Two page heuristics run in order and short-circuit on the first confirming
//! signal. The checks are plain predicates over a [`PageInspector`] so they can be
//! tested against mocks.

use crate::config::SelectorConfig;
use crate::layers::VideoContext;
use crate::page::{PageError, PageInspector};
use crate::transcript::{LayerKind, TranscriptResult};

/// Prefix of the `error` field when neither heuristic confirmed absence
pub const INDETERMINATE: &str =
    "indeterminate: all layers failed but transcript affordance present";

/// Outcome of the unavailability heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailabilityVerdict {
    /// The platform shows no transcript control, so it has no captions to offer
    NoTranscriptAffordance,
    /// The player settings control is missing; the page is in an abnormal state
    NoSettingsControl,
    /// Captions appear to exist but extraction failed anyway
    Indeterminate,
}

impl UnavailabilityVerdict {
    pub fn is_confirmed(self) -> bool {
        !matches!(self, UnavailabilityVerdict::Indeterminate)
    }

    fn reason(self) -> String {
        match self {
            UnavailabilityVerdict::NoTranscriptAffordance => {
                "confirmed: platform offers no transcript for this video".to_string()
            }
            UnavailabilityVerdict::NoSettingsControl => {
                "confirmed: player settings control missing, page cannot expose captions"
                    .to_string()
            }
            UnavailabilityVerdict::Indeterminate => INDETERMINATE.to_string(),
        }
    }
}

/// Whether any transcript affordance is on the page
pub fn transcript_affordance_present(
    page: &dyn PageInspector,
    selectors: &[String],
) -> Result<bool, PageError> {
    any_present(page, selectors)
}

/// Whether the player settings control is on the page
pub fn settings_control_present(
    page: &dyn PageInspector,
    selectors: &[String],
) -> Result<bool, PageError> {
    any_present(page, selectors)
}

fn any_present(page: &dyn PageInspector, selectors: &[String]) -> Result<bool, PageError> {
    for selector in selectors {
        if page.has_element(selector)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Layer 5
#[derive(Debug, Clone)]
pub struct UnavailabilityConfirmer {
    affordance_selectors: Vec<String>,
    settings_selectors: Vec<String>,
}

impl UnavailabilityConfirmer {
    pub fn new(selectors: &SelectorConfig) -> Self {
        Self {
            affordance_selectors: selectors.transcript_affordance.clone(),
            settings_selectors: selectors.settings_control.clone(),
        }
    }

    /// Run both heuristics in order
    pub fn assess(&self, page: &dyn PageInspector) -> Result<UnavailabilityVerdict, PageError> {
        if !transcript_affordance_present(page, &self.affordance_selectors)? {
            return Ok(UnavailabilityVerdict::NoTranscriptAffordance);
        }
        if !settings_control_present(page, &self.settings_selectors)? {
            return Ok(UnavailabilityVerdict::NoSettingsControl);
        }
        Ok(UnavailabilityVerdict::Indeterminate)
    }

    /// Final answer for a video no layer could extract. Never fails.
    pub fn confirm_unavailable(&self, ctx: &VideoContext) -> TranscriptResult {
        match self.assess(ctx.page.as_ref()) {
            Ok(verdict) => {
                tracing::info!(video_id = %ctx.video_id, ?verdict, "transcript unavailable");
                TranscriptResult::unavailable(LayerKind::UnavailabilityConfirmer, verdict.reason())
            }
            Err(e) => {
                tracing::warn!(
                    video_id = %ctx.video_id,
                    error = %e,
                    "unavailability heuristics could not run"
                );
                TranscriptResult::error(
                    LayerKind::UnavailabilityConfirmer,
                    format!("unavailability could not be confirmed: {}", e),
                )
            }
        }
    }
}
