use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::captions::ParsedCues;

/// Overall outcome of one pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranscriptStatus {
    Success,
    Partial,
    Unavailable,
    Error,
}

impl fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptStatus::Success => write!(f, "SUCCESS"),
            TranscriptStatus::Partial => write!(f, "PARTIAL"),
            TranscriptStatus::Unavailable => write!(f, "UNAVAILABLE"),
            TranscriptStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Which layer produced (or failed to produce) a result.
///
/// Serialized as its position in the chain, 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    EmbeddedState,
    NetworkInterception,
    RenderedPanel,
    DirectFetch,
    UnavailabilityConfirmer,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::EmbeddedState,
        LayerKind::NetworkInterception,
        LayerKind::RenderedPanel,
        LayerKind::DirectFetch,
        LayerKind::UnavailabilityConfirmer,
    ];

    pub fn number(self) -> u8 {
        match self {
            LayerKind::EmbeddedState => 1,
            LayerKind::NetworkInterception => 2,
            LayerKind::RenderedPanel => 3,
            LayerKind::DirectFetch => 4,
            LayerKind::UnavailabilityConfirmer => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        LayerKind::ALL.into_iter().find(|kind| kind.number() == number)
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::EmbeddedState => "embedded-state",
            LayerKind::NetworkInterception => "network-interception",
            LayerKind::RenderedPanel => "rendered-panel",
            LayerKind::DirectFetch => "direct-fetch",
            LayerKind::UnavailabilityConfirmer => "unavailability-confirmer",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{} {}", self.number(), self.name())
    }
}

impl Serialize for LayerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for LayerKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = u8::deserialize(deserializer)?;
        LayerKind::from_number(number)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown extraction layer {number}")))
    }
}

/// One caption cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Decoded caption text
    pub text: String,

    /// Start offset in seconds
    pub start_seconds: f64,

    /// Duration in seconds
    pub duration_seconds: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            duration_seconds,
        }
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }
}

/// How the caption track behind a transcript was authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Uploaded by the channel
    Manual,
    /// Automatic speech recognition
    Generated,
    /// Machine-translated by the platform
    Translated,
    /// Scraped from the on-page transcript panel; authorship unknown
    Rendered,
}

/// Descriptive record attached to usable results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMetadata {
    /// Language code of the delivered text
    pub language: Option<String>,

    /// Track authorship
    pub track_kind: TrackKind,

    /// Human-readable track name as the platform labels it
    pub track_name: Option<String>,

    /// Layer the transcript came from
    pub source_layer: LayerKind,
}

/// The single output contract of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResult {
    pub status: TranscriptStatus,
    pub segments: Vec<TranscriptSegment>,
    pub metadata: Option<TranscriptMetadata>,
    pub error: Option<String>,
    pub extraction_layer: LayerKind,
}

impl TranscriptResult {
    /// Build a usable result from parsed cues.
    ///
    /// SUCCESS when every cue decoded, PARTIAL when the parser had to drop some.
    pub fn from_cues(cues: ParsedCues, metadata: TranscriptMetadata, layer: LayerKind) -> Self {
        let ParsedCues { segments, dropped } = cues;

        if dropped == 0 && !segments.is_empty() {
            return Self {
                status: TranscriptStatus::Success,
                segments,
                metadata: Some(metadata),
                error: None,
                extraction_layer: layer,
            };
        }

        let note = if segments.is_empty() {
            "no usable cues".to_string()
        } else {
            format!("{} malformed cue(s) dropped", dropped)
        };

        Self {
            status: TranscriptStatus::Partial,
            segments,
            metadata: Some(metadata),
            error: Some(note),
            extraction_layer: layer,
        }
    }

    pub fn unavailable(layer: LayerKind, reason: impl Into<String>) -> Self {
        Self {
            status: TranscriptStatus::Unavailable,
            segments: Vec::new(),
            metadata: None,
            error: Some(reason.into()),
            extraction_layer: layer,
        }
    }

    pub fn error(layer: LayerKind, reason: impl Into<String>) -> Self {
        Self {
            status: TranscriptStatus::Error,
            segments: Vec::new(),
            metadata: None,
            error: Some(reason.into()),
            extraction_layer: layer,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TranscriptStatus::Success
    }

    /// SUCCESS or PARTIAL
    pub fn is_usable(&self) -> bool {
        matches!(self.status, TranscriptStatus::Success | TranscriptStatus::Partial)
    }

    /// Whether the consuming UI should offer "try again"
    pub fn is_retryable(&self) -> bool {
        self.status == TranscriptStatus::Error
    }

    /// Total covered time in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.segments
            .iter()
            .map(TranscriptSegment::end_seconds)
            .fold(0.0, f64::max)
    }

    /// Segment text joined with single spaces
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> TranscriptMetadata {
        TranscriptMetadata {
            language: Some("en".to_string()),
            track_kind: TrackKind::Manual,
            track_name: None,
            source_layer: LayerKind::EmbeddedState,
        }
    }

    #[test]
    fn test_clean_cues_are_success_without_error() {
        let cues = ParsedCues {
            segments: vec![TranscriptSegment::new("hi", 0.0, 1.0)],
            dropped: 0,
        };
        let result = TranscriptResult::from_cues(cues, metadata(), LayerKind::EmbeddedState);

        assert_eq!(result.status, TranscriptStatus::Success);
        assert!(result.error.is_none());
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn test_dropped_cues_downgrade_to_partial() {
        let cues = ParsedCues {
            segments: vec![TranscriptSegment::new("hi", 0.0, 1.0)],
            dropped: 2,
        };
        let result = TranscriptResult::from_cues(cues, metadata(), LayerKind::EmbeddedState);

        assert_eq!(result.status, TranscriptStatus::Partial);
        assert_eq!(result.error.as_deref(), Some("2 malformed cue(s) dropped"));
    }

    #[test]
    fn test_unavailable_has_no_segments() {
        let result = TranscriptResult::unavailable(LayerKind::UnavailabilityConfirmer, "none");
        assert!(result.segments.is_empty());
        assert!(!result.is_retryable());
        assert!(TranscriptResult::error(LayerKind::UnavailabilityConfirmer, "x").is_retryable());
    }

    #[test]
    fn test_json_shape_uses_layer_number_and_camel_case() {
        let result = TranscriptResult::from_cues(
            ParsedCues {
                segments: vec![TranscriptSegment::new("hi", 1.5, 2.0)],
                dropped: 0,
            },
            metadata(),
            LayerKind::RenderedPanel,
        );
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["extractionLayer"], 3);
        assert_eq!(json["segments"][0]["startSeconds"], 1.5);
        assert_eq!(json["metadata"]["trackKind"], "manual");
        assert_eq!(json["metadata"]["sourceLayer"], 1);
    }

    #[test]
    fn test_layer_numbers_round_trip() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_number(kind.number()), Some(kind));
        }
        assert_eq!(LayerKind::from_number(6), None);
    }
}
