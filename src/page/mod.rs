//! Read surface over the platform's watch page.
//!
//! Layers and the unavailability confirmer never touch HTML directly. They ask a
//! [`PageInspector`], which lets the decision logic be exercised against fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod html;

pub use html::HtmlPage;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PageError {
    /// The page could not be read at all
    #[error("page is inaccessible: {0}")]
    Inaccessible(String),

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("page interaction failed: {0}")]
    Interaction(String),
}

impl From<PageError> for crate::ExtractionError {
    fn from(err: PageError) -> Self {
        crate::ExtractionError::PreconditionUnmet(err.to_string())
    }
}

/// One row of the platform's rendered transcript panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCue {
    /// Clock text as displayed, e.g. `1:23`
    pub timestamp: String,
    pub text: String,
}

/// CSS selectors locating rows of the rendered transcript panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSelectors {
    pub segment: String,
    pub timestamp: String,
    pub text: String,
}

impl Default for PanelSelectors {
    fn default() -> Self {
        Self {
            segment: "ytd-transcript-segment-renderer".to_string(),
            timestamp: ".segment-timestamp".to_string(),
            text: ".segment-text".to_string(),
        }
    }
}

/// Abstract page inspection capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageInspector: Send + Sync {
    /// The player state object the page embedded at load time, if any
    fn player_response(&self) -> Option<Value>;

    /// URLs of requests the page has issued so far, oldest first
    fn observed_requests(&self) -> Vec<String>;

    /// Whether at least one element matches `selector`
    fn has_element(&self, selector: &str) -> Result<bool, PageError>;

    /// Rows currently rendered in the transcript panel
    fn rendered_cues(&self, selectors: &PanelSelectors) -> Result<Vec<RenderedCue>, PageError>;

    /// Open the transcript panel. `Ok(false)` when the page cannot be interacted with.
    async fn open_transcript_panel(&self) -> Result<bool, PageError>;

    /// Undo [`PageInspector::open_transcript_panel`]
    async fn close_transcript_panel(&self) -> Result<(), PageError>;
}

/// Stand-in for a page that could not be loaded
#[derive(Debug, Clone)]
pub struct UnreachablePage {
    reason: String,
}

impl UnreachablePage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> PageError {
        PageError::Inaccessible(self.reason.clone())
    }
}

#[async_trait]
impl PageInspector for UnreachablePage {
    fn player_response(&self) -> Option<Value> {
        None
    }

    fn observed_requests(&self) -> Vec<String> {
        Vec::new()
    }

    fn has_element(&self, _selector: &str) -> Result<bool, PageError> {
        Err(self.error())
    }

    fn rendered_cues(&self, _selectors: &PanelSelectors) -> Result<Vec<RenderedCue>, PageError> {
        Err(self.error())
    }

    async fn open_transcript_panel(&self) -> Result<bool, PageError> {
        Err(self.error())
    }

    async fn close_transcript_panel(&self) -> Result<(), PageError> {
        Ok(())
    }
}
