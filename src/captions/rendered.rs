use crate::page::RenderedCue;
use crate::transcript::TranscriptSegment;
use crate::utils::parse_clock_timestamp;

use super::{markup_to_text, ParseError, ParsedCues};

/// Turn rows scraped from the on-page transcript panel into segments.
///
/// The panel only shows start times, so each cue lasts until the next one starts.
/// The last cue gets a zero duration.
pub fn parse_rendered(rows: &[RenderedCue]) -> Result<ParsedCues, ParseError> {
    if rows.is_empty() {
        return Err(ParseError::EmptyPayload);
    }

    let mut dropped = 0;
    let mut timed: Vec<(f64, String)> = Vec::with_capacity(rows.len());

    for row in rows {
        let text = markup_to_text(&row.text);
        match parse_clock_timestamp(&row.timestamp) {
            Some(start) if !text.is_empty() => timed.push((start, text)),
            Some(_) => {}
            None => dropped += 1,
        }
    }

    if timed.is_empty() {
        return Err(ParseError::NoUsableCues { dropped });
    }

    timed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let starts: Vec<f64> = timed.iter().map(|(start, _)| *start).collect();
    let segments = timed
        .into_iter()
        .enumerate()
        .map(|(index, (start, text))| {
            let duration = starts
                .get(index + 1)
                .map(|next| (next - start).max(0.0))
                .unwrap_or(0.0);
            TranscriptSegment::new(text, start, duration)
        })
        .collect();

    Ok(ParsedCues { segments, dropped })
}
