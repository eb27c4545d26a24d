use anyhow::{Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use super::{PageError, PageInspector, PanelSelectors, RenderedCue};

lazy_static! {
    static ref PLAYER_RESPONSE: Regex = Regex::new(
        r#"(?s)ytInitialPlayerResponse"?\]?\s*=\s*(\{.+?\})\s*;\s*(?:var\s|const\s|let\s|if\s*\(|</script>)"#
    )
    .unwrap();
}

/// A watch page snapshot: its HTML plus the requests the browser was seen issuing.
///
/// `scraper::Html` is not `Send`, so the document is kept as text and parsed per query.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    html: String,
    player_response: Option<Value>,
    requests: Vec<String>,
}

impl HtmlPage {
    pub fn from_html(html: impl Into<String>) -> Self {
        let html = html.into();
        let player_response = extract_player_response(&html);

        Self {
            html,
            player_response,
            requests: Vec::new(),
        }
    }

    /// Load a saved page from disk
    pub fn load(path: &Path) -> Result<Self> {
        let html = fs_err::read_to_string(path).context("Failed to read page snapshot")?;
        Ok(Self::from_html(html))
    }

    /// Attach the request log captured alongside the page
    pub fn with_observed_requests(mut self, requests: Vec<String>) -> Self {
        self.requests = requests;
        self
    }

    fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[async_trait]
impl PageInspector for HtmlPage {
    fn player_response(&self) -> Option<Value> {
        self.player_response.clone()
    }

    fn observed_requests(&self) -> Vec<String> {
        self.requests.clone()
    }

    fn has_element(&self, selector: &str) -> Result<bool, PageError> {
        let selector = parse_selector(selector)?;
        Ok(self.document().select(&selector).next().is_some())
    }

    fn rendered_cues(&self, selectors: &PanelSelectors) -> Result<Vec<RenderedCue>, PageError> {
        let segment = parse_selector(&selectors.segment)?;
        let timestamp = parse_selector(&selectors.timestamp)?;
        let text = parse_selector(&selectors.text)?;
        let document = self.document();

        let rows = document
            .select(&segment)
            .map(|row| RenderedCue {
                timestamp: first_text(row, &timestamp),
                text: first_text(row, &text),
            })
            .collect();

        Ok(rows)
    }

    async fn open_transcript_panel(&self) -> Result<bool, PageError> {
        // A snapshot cannot be clicked
        Ok(false)
    }

    async fn close_transcript_panel(&self) -> Result<(), PageError> {
        Ok(())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, PageError> {
    Selector::parse(selector).map_err(|_| PageError::InvalidSelector(selector.to_string()))
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_player_response(html: &str) -> Option<Value> {
    let captures = PLAYER_RESPONSE.captures(html)?;
    match serde_json::from_str(&captures[1]) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "embedded player response is not valid JSON");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct Har {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    url: String,
}

/// Request URLs from a HAR capture, in capture order
pub fn parse_har(content: &str) -> Result<Vec<String>> {
    let har: Har = serde_json::from_str(content).context("Failed to parse HAR capture")?;
    Ok(har.log.entries.into_iter().map(|entry| entry.request.url).collect())
}

pub fn load_har(path: &Path) -> Result<Vec<String>> {
    let content = fs_err::read_to_string(path).context("Failed to read HAR capture")?;
    parse_har(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><script>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"abcdefghijk"},"captions":{"x":"};"}};var meta = document.createElement('meta');</script></head>
<body>
<button class="ytp-settings-button"></button>
<ytd-transcript-segment-renderer><div class="segment-timestamp"> 0:01 </div><yt-formatted-string class="segment-text">Hello &amp; welcome</yt-formatted-string></ytd-transcript-segment-renderer>
<ytd-transcript-segment-renderer><div class="segment-timestamp">0:05</div><yt-formatted-string class="segment-text">second</yt-formatted-string></ytd-transcript-segment-renderer>
</body></html>"#;

    #[test]
    fn test_extracts_embedded_player_response() {
        let page = HtmlPage::from_html(PAGE);
        let response = page.player_response().unwrap();
        assert_eq!(response["videoDetails"]["videoId"], "abcdefghijk");
        assert_eq!(response["captions"]["x"], "};");
    }

    #[test]
    fn test_missing_player_response_is_none() {
        let page = HtmlPage::from_html("<html><body></body></html>");
        assert!(page.player_response().is_none());
    }

    #[test]
    fn test_has_element() {
        let page = HtmlPage::from_html(PAGE);
        assert!(page.has_element(".ytp-settings-button").unwrap());
        assert!(!page.has_element("ytd-video-description-transcript-section-renderer").unwrap());
        assert!(matches!(page.has_element("[[bad"), Err(PageError::InvalidSelector(_))));
    }

    #[test]
    fn test_reads_rendered_rows() {
        let page = HtmlPage::from_html(PAGE);
        let rows = page.rendered_cues(&PanelSelectors::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, "0:01");
        assert_eq!(rows[0].text, "Hello & welcome");
    }

    #[tokio::test]
    async fn test_snapshot_cannot_open_panel() {
        let page = HtmlPage::from_html(PAGE);
        assert!(!page.open_transcript_panel().await.unwrap());
    }

    #[test]
    fn test_parse_har_keeps_order() {
        let har = r#"{"log":{"version":"1.2","entries":[
            {"request":{"method":"GET","url":"https://www.youtube.com/watch?v=a"}},
            {"request":{"method":"GET","url":"https://www.youtube.com/api/timedtext?v=a&lang=en"}}
        ]}}"#;
        let urls = parse_har(har).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[1].contains("timedtext"));
    }
}
