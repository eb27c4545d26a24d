use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

/// Resolve a video identifier from a watch URL, short link, or bare id
pub fn resolve_video_id(input: &str) -> Result<String> {
    let input = input.trim();

    if VIDEO_ID.is_match(input) {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input)
        .map_err(|_| anyhow::anyhow!("Not a video URL or id: {}", input))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let candidate = if host == "youtu.be" {
        parsed.path_segments().and_then(|mut segments| segments.next()).map(str::to_string)
    } else if host.ends_with("youtube.com") {
        let from_query = parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());

        from_query.or_else(|| {
            let segments: Vec<&str> = parsed.path_segments()?.collect();
            match segments.as_slice() {
                ["embed" | "shorts" | "live" | "v", id, ..] => Some(id.to_string()),
                _ => None,
            }
        })
    } else {
        anyhow::bail!("Unsupported host: {}", host);
    };

    candidate
        .filter(|id| VIDEO_ID.is_match(id))
        .ok_or_else(|| anyhow::anyhow!("No video id found in URL: {}", input))
}

/// Canonical watch page URL for a video
pub fn watch_url(base_url: &str, video_id: &str) -> String {
    format!(
        "{}/watch?v={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(video_id)
    )
}

/// Parse `H:MM:SS`, `M:SS` or plain seconds into seconds
pub fn parse_clock_timestamp(timestamp: &str) -> Option<f64> {
    let timestamp = timestamp.trim();
    if timestamp.is_empty() {
        return None;
    }

    let mut total = 0.0;
    for part in timestamp.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }

    Some(total)
}

/// Format seconds as `HH:MM:SS` followed by `separator` and milliseconds
pub fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, millis)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
