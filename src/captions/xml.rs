use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use super::{markup_to_text, CueCollector, ParseError, ParsedCues};

lazy_static! {
    static ref TEXT_CUE: Regex = Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").unwrap();
    static ref SRV3_CUE: Regex = Regex::new(r"(?s)<p\b([^>]*)>(.*?)</p>").unwrap();
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// Parse the XML caption document.
///
/// `<text start dur>` cues carry seconds; `srv3` `<p t d>` cues carry milliseconds.
pub fn parse_xml(raw: &str) -> Result<ParsedCues, ParseError> {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with('<') {
        return Err(ParseError::Malformed("not an XML caption document".to_string()));
    }

    let mut collector = CueCollector::new();
    let mut matched = false;

    for cue in TEXT_CUE.captures_iter(raw) {
        matched = true;
        let attributes = attributes(&cue[1]);
        collector.push(
            decode_body(&cue[2]),
            seconds(&attributes, "start"),
            seconds(&attributes, "dur"),
        );
    }

    if !matched {
        for cue in SRV3_CUE.captures_iter(raw) {
            matched = true;
            let attributes = attributes(&cue[1]);
            collector.push(
                decode_body(&cue[2]),
                millis(&attributes, "t"),
                millis(&attributes, "d"),
            );
        }
    }

    if !matched && !(raw.contains("<transcript") || raw.contains("<timedtext")) {
        return Err(ParseError::Malformed(
            "no <transcript> or <timedtext> root element".to_string(),
        ));
    }

    collector.finish()
}

/// Render segments back into the `<transcript><text start dur>` document
pub fn encode_xml(segments: &[crate::transcript::TranscriptSegment]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\" ?><transcript>");
    for segment in segments {
        out.push_str(&format!(
            "<text start=\"{}\" dur=\"{}\">{}</text>",
            segment.start_seconds,
            segment.duration_seconds,
            escape(&escape(&segment.text))
        ));
    }
    out.push_str("</transcript>");
    out
}

// The platform escapes cue bodies twice: once as XML, once as HTML
fn decode_body(body: &str) -> String {
    markup_to_text(&markup_to_text(body))
}

fn attributes(raw: &str) -> HashMap<&str, &str> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|capture| {
            let name = capture.get(1)?.as_str();
            let value = capture.get(2).or_else(|| capture.get(3))?.as_str();
            Some((name, value))
        })
        .collect()
}

fn seconds(attributes: &HashMap<&str, &str>, name: &str) -> Option<f64> {
    attributes.get(name).map(|value| value.trim().parse::<f64>().unwrap_or(f64::NAN))
}

fn millis(attributes: &HashMap<&str, &str>, name: &str) -> Option<f64> {
    seconds(attributes, name).map(|value| value / 1000.0)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
