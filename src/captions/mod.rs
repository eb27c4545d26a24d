//! Caption payload decoding.
//!
//! The platform serves the same track in several shapes. Each shape gets its own
//! submodule; they all funnel cues through [`CueCollector`] so timing validation,
//! malformed-cue accounting and ordering behave identically across formats.

use scraper::Html;
use std::fmt;

use crate::transcript::TranscriptSegment;

pub mod json;
pub mod rendered;
pub mod xml;

pub use rendered::parse_rendered;

/// Declared format of a raw caption payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    /// `<transcript><text start dur>` and the `srv3` `<p t d>` variant
    Xml,
    /// `json3` events, or a plain array of `{start, duration, text}` objects
    Json,
}

impl CaptionFormat {
    /// Value of the `fmt` query parameter that asks the platform for this format
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            CaptionFormat::Xml => None,
            CaptionFormat::Json => Some("json3"),
        }
    }

    /// Infer the payload format from the `fmt` parameter of a caption URL
    pub fn from_fmt_param(fmt: Option<&str>) -> Self {
        match fmt {
            Some(value) if value.starts_with("json") => CaptionFormat::Json,
            _ => CaptionFormat::Xml,
        }
    }
}

impl fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptionFormat::Xml => write!(f, "xml"),
            CaptionFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("caption payload is empty")]
    EmptyPayload,

    #[error("payload does not match the declared format: {0}")]
    Malformed(String),

    #[error("payload contained no usable cues ({dropped} malformed)")]
    NoUsableCues { dropped: usize },
}

/// Segments decoded from one payload, plus how many cues had to be discarded
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCues {
    pub segments: Vec<TranscriptSegment>,
    pub dropped: usize,
}

/// Decode a raw caption payload into ordered segments
pub fn parse(raw: &str, format: CaptionFormat) -> Result<ParsedCues, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyPayload);
    }

    let cues = match format {
        CaptionFormat::Xml => xml::parse_xml(raw)?,
        CaptionFormat::Json => json::parse_json(raw)?,
    };

    tracing::debug!(
        %format,
        segments = cues.segments.len(),
        dropped = cues.dropped,
        "decoded caption payload"
    );

    Ok(cues)
}

/// Accumulates cues, discarding ones whose timing cannot be trusted
#[derive(Debug, Default)]
pub(crate) struct CueCollector {
    segments: Vec<TranscriptSegment>,
    dropped: usize,
}

impl CueCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one cue. Missing duration counts as zero; missing start does not.
    pub(crate) fn push(&mut self, text: String, start: Option<f64>, duration: Option<f64>) {
        let start = match start {
            Some(value) if is_valid_offset(value) => value,
            _ => {
                self.dropped += 1;
                return;
            }
        };
        let duration = match duration {
            None => 0.0,
            Some(value) if is_valid_offset(value) => value,
            Some(_) => {
                self.dropped += 1;
                return;
            }
        };

        // Blank cues are line breaks or positioning windows, not damage
        if text.is_empty() {
            return;
        }

        self.segments.push(TranscriptSegment::new(text, start, duration));
    }

    pub(crate) fn mark_dropped(&mut self) {
        self.dropped += 1;
    }

    pub(crate) fn finish(mut self) -> Result<ParsedCues, ParseError> {
        if self.segments.is_empty() {
            return Err(ParseError::NoUsableCues {
                dropped: self.dropped,
            });
        }

        self.segments
            .sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));

        Ok(ParsedCues {
            segments: self.segments,
            dropped: self.dropped,
        })
    }
}

fn is_valid_offset(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Strip tags, decode entities and collapse whitespace
pub(crate) fn markup_to_text(raw: &str) -> String {
    if !raw.contains('<') && !raw.contains('&') {
        return collapse_whitespace(raw);
    }

    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_to_text_strips_tags_and_entities() {
        assert_eq!(markup_to_text("<font color=\"#fff\">Hello</font> &amp; bye"), "Hello & bye");
        assert_eq!(markup_to_text("it&#39;s\n  fine"), "it's fine");
        assert_eq!(markup_to_text("plain"), "plain");
    }

    #[test]
    fn test_collector_drops_bad_timing_only() {
        let mut collector = CueCollector::new();
        collector.push("b".to_string(), Some(2.0), Some(1.0));
        collector.push("bad".to_string(), Some(-1.0), Some(1.0));
        collector.push("nan".to_string(), Some(f64::NAN), None);
        collector.push("a".to_string(), Some(0.0), None);
        collector.push(String::new(), Some(3.0), Some(1.0));

        let cues = collector.finish().unwrap();
        assert_eq!(cues.dropped, 2);
        assert_eq!(cues.segments.len(), 2);
        assert_eq!(cues.segments[0].text, "a");
        assert_eq!(cues.segments[0].duration_seconds, 0.0);
        assert_eq!(cues.segments[1].text, "b");
    }

    #[test]
    fn test_empty_collector_is_no_usable_cues() {
        let mut collector = CueCollector::new();
        collector.push("x".to_string(), None, Some(1.0));
        assert_eq!(
            collector.finish().unwrap_err(),
            ParseError::NoUsableCues { dropped: 1 }
        );
    }

    #[test]
    fn test_blank_payload_is_empty() {
        assert_eq!(parse("  \n", CaptionFormat::Xml).unwrap_err(), ParseError::EmptyPayload);
        assert_eq!(parse("", CaptionFormat::Json).unwrap_err(), ParseError::EmptyPayload);
    }

    #[test]
    fn test_format_from_fmt_param() {
        assert_eq!(CaptionFormat::from_fmt_param(Some("json3")), CaptionFormat::Json);
        assert_eq!(CaptionFormat::from_fmt_param(Some("srv3")), CaptionFormat::Xml);
        assert_eq!(CaptionFormat::from_fmt_param(None), CaptionFormat::Xml);
    }
}
