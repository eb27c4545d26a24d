use anyhow::Result;

use crate::captions::xml::encode_xml;
use crate::transcript::{TranscriptResult, TranscriptSegment};
use crate::utils::format_timestamp;

/// Plain text, one cue per line, optionally prefixed with its start time
pub fn format_as_text(result: &TranscriptResult, include_timestamps: bool) -> String {
    if result.segments.is_empty() {
        return result.error.clone().unwrap_or_default();
    }

    if !include_timestamps {
        return result.plain_text();
    }

    result
        .segments
        .iter()
        .map(|segment| {
            format!(
                "[{}] {}",
                format_timestamp(segment.start_seconds, '.'),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The full result record, as handed to downstream consumers
pub fn format_as_json(result: &TranscriptResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn format_as_srt(result: &TranscriptResult) -> String {
    let mut out = String::new();

    for (index, segment) in result.segments.iter().enumerate() {
        out.push_str(&format!("{}\n", index + 1));
        out.push_str(&cue_timing(segment, ','));
        out.push_str(&segment.text);
        out.push_str("\n\n");
    }

    out
}

pub fn format_as_vtt(result: &TranscriptResult) -> String {
    let mut out = String::from("WEBVTT\n\n");

    for segment in &result.segments {
        out.push_str(&cue_timing(segment, '.'));
        out.push_str(&segment.text);
        out.push_str("\n\n");
    }

    out
}

/// Timed-text XML, readable by the same parser that reads platform documents
pub fn format_as_xml(result: &TranscriptResult) -> String {
    encode_xml(&result.segments)
}

fn cue_timing(segment: &TranscriptSegment, separator: char) -> String {
    format!(
        "{} --> {}\n",
        format_timestamp(segment.start_seconds, separator),
        format_timestamp(segment.end_seconds(), separator)
    )
}
