use serde_json::{Map, Value};

use super::{markup_to_text, CueCollector, ParseError, ParsedCues};

/// Parse a JSON caption document.
///
/// Accepted shapes:
/// - `json3`: `{"events": [{"tStartMs", "dDurationMs", "segs": [{"utf8"}]}]}` (milliseconds)
/// - an array of `{"start", "duration", "text"}` objects (seconds)
/// - `{"segments": [{"offset", "duration", "text"}]}` as served by the transcript API
///   (milliseconds)
pub fn parse_json(raw: &str) -> Result<ParsedCues, ParseError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ParseError::Malformed(format!("invalid JSON: {}", e)))?;

    if let Some(events) = value.get("events") {
        return parse_events(events);
    }

    if let Some(segments) = value.get("segments") {
        return parse_offset_segments(segments);
    }

    if value.is_array() {
        return parse_cue_array(&value);
    }

    Err(ParseError::Malformed("unrecognized JSON caption shape".to_string()))
}

fn parse_events(events: &Value) -> Result<ParsedCues, ParseError> {
    let events = events
        .as_array()
        .ok_or_else(|| ParseError::Malformed("events must be an array".to_string()))?;
    let mut collector = CueCollector::new();

    for event in events {
        let Some(event) = event.as_object() else {
            collector.mark_dropped();
            continue;
        };

        // Window and style events carry no segs
        let Some(segs) = event.get("segs").and_then(Value::as_array) else {
            continue;
        };

        let text: String = segs
            .iter()
            .filter_map(|seg| seg.get("utf8").and_then(Value::as_str))
            .collect();

        collector.push(
            markup_to_text(&text),
            number(event, "tStartMs").map(|ms| ms / 1000.0),
            number(event, "dDurationMs").map(|ms| ms / 1000.0),
        );
    }

    collector.finish()
}

fn parse_cue_array(cues: &Value) -> Result<ParsedCues, ParseError> {
    let cues = cues
        .as_array()
        .ok_or_else(|| ParseError::Malformed("cues must be an array".to_string()))?;
    let mut collector = CueCollector::new();

    for cue in cues {
        let Some(cue) = cue.as_object() else {
            collector.mark_dropped();
            continue;
        };

        let text = cue.get("text").and_then(Value::as_str).unwrap_or_default();
        let duration = number(cue, "duration").or_else(|| number(cue, "dur"));
        collector.push(markup_to_text(text), number(cue, "start"), duration);
    }

    collector.finish()
}

fn parse_offset_segments(segments: &Value) -> Result<ParsedCues, ParseError> {
    let segments = segments
        .as_array()
        .ok_or_else(|| ParseError::Malformed("segments must be an array".to_string()))?;
    let mut collector = CueCollector::new();

    for segment in segments {
        let Some(segment) = segment.as_object() else {
            collector.mark_dropped();
            continue;
        };

        let text = segment.get("text").and_then(Value::as_str).unwrap_or_default();
        collector.push(
            markup_to_text(text),
            number(segment, "offset").map(|ms| ms / 1000.0),
            number(segment, "duration").map(|ms| ms / 1000.0),
        );
    }

    collector.finish()
}

/// Numeric field that may also arrive as a string; unparseable values become NaN
/// so the collector counts the cue as malformed instead of treating it as absent.
fn number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::Number(n) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
        Value::Null => None,
        _ => Some(f64::NAN),
    }
}
