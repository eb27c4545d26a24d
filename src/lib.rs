//! Layered Transcript - acquire YouTube transcripts through an ordered chain of extraction layers
//!
//! The pipeline tries four independent acquisition strategies, cheapest first, and falls
//! through to a heuristic unavailability check when all of them fail. Whatever happens,
//! callers receive a single [`TranscriptResult`].

pub mod captions;
pub mod cli;
pub mod config;
pub mod confirmer;
pub mod layers;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod resolver;
pub mod transcript;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use captions::{CaptionFormat, ParseError, ParsedCues};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use confirmer::UnavailabilityConfirmer;
pub use layers::{ExtractionLayer, VideoContext};
pub use page::{HtmlPage, PageError, PageInspector};
pub use pipeline::{CancelToken, TranscriptPipeline};
pub use resolver::{CaptionFetcher, FetchError, HttpFetcher};
pub use transcript::{LayerKind, TranscriptResult, TranscriptSegment, TranscriptStatus};

/// Result type used throughout the application layer
pub type Result<T> = anyhow::Result<T>;

/// Failure of a single extraction layer.
///
/// The coordinator never lets one of these escape to the caller; it turns every
/// variant except `Cancelled` into "try the next layer".
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("caption payload could not be decoded: {0}")]
    Parse(ParseError),

    #[error("transcript extraction cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// Whether one more attempt inside the same layer could help
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Transient(_))
    }

    /// Short label used in attempt logs
    pub fn class(&self) -> &'static str {
        match self {
            ExtractionError::PreconditionUnmet(_) => "precondition_unmet",
            ExtractionError::Transient(_) => "transient",
            ExtractionError::Parse(_) => "parse_failure",
            ExtractionError::Cancelled => "cancelled",
        }
    }
}

impl From<ParseError> for ExtractionError {
    fn from(err: ParseError) -> Self {
        match err {
            // A blank document means the platform has nothing for this track
            ParseError::EmptyPayload => {
                ExtractionError::PreconditionUnmet("caption document is empty".to_string())
            }
            other => ExtractionError::Parse(other),
        }
    }
}
