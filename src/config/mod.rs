use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::page::PanelSelectors;
use crate::resolver::{FetchPolicy, TrackPreference};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Layer ordering inputs: languages, budgets, retry policy
    pub extraction: ExtractionConfig,

    /// How the platform is reached
    pub http: HttpConfig,

    /// DOM selectors used by the rendered-panel layer and the confirmer
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Preferred caption languages, most preferred first
    pub languages: Vec<String>,

    /// Ask the platform to translate into this language when nothing preferred exists
    pub translate_to: Option<String>,

    /// Time limits
    pub timeouts: TimeoutConfig,

    /// Pause before the single retry of a transient failure
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-attempt budget for the embedded-state layer
    pub embedded_state_ms: u64,

    /// Whole-attempt budget for the network-interception layer
    pub interception_ms: u64,

    /// Whole-attempt budget for the rendered-panel layer
    pub rendered_panel_ms: u64,

    /// Whole-attempt budget for the direct-fetch layer
    pub direct_fetch_ms: u64,

    /// Limit for a single HTTP request
    pub request_ms: u64,

    /// How long to wait for panel rows after opening the transcript panel
    pub panel_wait_ms: u64,

    /// Polling interval while waiting for panel rows
    pub panel_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Scheme and host of the platform
    pub base_url: String,

    pub user_agent: String,

    pub accept_language: String,

    /// Key appended to player endpoint calls
    pub innertube_api_key: Option<String>,

    pub innertube_client_name: String,

    pub innertube_client_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Controls whose presence means the platform believes a transcript exists
    pub transcript_affordance: Vec<String>,

    /// Player settings control that normally exposes the captions toggle
    pub settings_control: Vec<String>,

    /// Rows of the rendered transcript panel
    pub panel: PanelSelectors,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
            translate_to: Some("en".to_string()),
            timeouts: TimeoutConfig::default(),
            retry_delay_ms: 250,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedded_state_ms: 4_500,
            interception_ms: 4_500,
            rendered_panel_ms: 5_000,
            direct_fetch_ms: 9_000,
            request_ms: 2_000,
            panel_wait_ms: 2_000,
            panel_poll_ms: 100,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            user_agent: concat!(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
                "(KHTML, like Gecko) Chrome/124.0 Safari/537.36"
            )
            .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            innertube_api_key: None,
            innertube_client_name: "WEB".to_string(),
            innertube_client_version: "2.20240726.00.00".to_string(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            transcript_affordance: vec![
                "ytd-video-description-transcript-section-renderer".to_string(),
                "button[aria-label=\"Show transcript\"]".to_string(),
                ".ytp-subtitles-button".to_string(),
            ],
            settings_control: vec![".ytp-settings-button".to_string()],
            panel: PanelSelectors::default(),
        }
    }
}

impl SelectorConfig {
    /// Every configured selector must parse as CSS
    pub fn validate(&self) -> Result<()> {
        let affordance = self.transcript_affordance.iter().map(|s| ("transcript_affordance", s));
        let settings = self.settings_control.iter().map(|s| ("settings_control", s));
        let panel = [
            ("panel.segment", &self.panel.segment),
            ("panel.timestamp", &self.panel.timestamp),
            ("panel.text", &self.panel.text),
        ];

        for (field, selector) in affordance.chain(settings).chain(panel) {
            if scraper::Selector::parse(selector).is_err() {
                anyhow::bail!("Invalid CSS selector in selectors.{}: {}", field, selector);
            }
        }
        Ok(())
    }
}

impl ExtractionConfig {
    pub fn track_preference(&self) -> TrackPreference {
        TrackPreference {
            languages: self.languages.clone(),
            translate_to: self.translate_to.clone(),
        }
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            request_timeout: Duration::from_millis(self.timeouts.request_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Config {
    /// Load configuration from `path`, the working directory, or the user config dir,
    /// writing defaults when nothing exists yet
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            tracing::info!(path = %config_path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("layered-transcript").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let extraction = &self.extraction;
        let timeouts = &extraction.timeouts;

        if extraction.languages.is_empty() {
            anyhow::bail!("At least one caption language must be configured");
        }

        if timeouts.request_ms == 0 || timeouts.panel_wait_ms == 0 || timeouts.panel_poll_ms == 0 {
            anyhow::bail!("Request, panel wait and panel poll timeouts must be non-zero");
        }

        // Each network request may be retried once after retry_delay_ms
        let attempt_floor = timeouts
            .request_ms
            .saturating_mul(2)
            .saturating_add(extraction.retry_delay_ms);
        // L4 fetches the player response and then the caption track
        let direct_floor = attempt_floor.saturating_mul(2);
        for (name, budget, floor) in [
            ("embedded_state_ms", timeouts.embedded_state_ms, attempt_floor),
            ("interception_ms", timeouts.interception_ms, attempt_floor),
            ("direct_fetch_ms", timeouts.direct_fetch_ms, direct_floor),
        ] {
            if budget < floor {
                anyhow::bail!(
                    "timeouts.{} ({}ms) cannot cover its requests and their retries ({}ms)",
                    name,
                    budget,
                    floor
                );
            }
        }

        // The panel wait may run twice with retry_delay_ms between
        let panel_floor = timeouts
            .panel_wait_ms
            .saturating_mul(2)
            .saturating_add(extraction.retry_delay_ms);
        if timeouts.rendered_panel_ms <= panel_floor {
            anyhow::bail!(
                "timeouts.rendered_panel_ms ({}ms) must exceed two panel waits and a retry ({}ms)",
                timeouts.rendered_panel_ms,
                panel_floor
            );
        }

        self.selectors.validate()?;

        url::Url::parse(&self.http.base_url)
            .with_context(|| format!("Invalid http.base_url: {}", self.http.base_url))?;

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        let timeouts = &self.extraction.timeouts;
        println!("Current Configuration:");
        println!("  Languages: {}", self.extraction.languages.join(", "));
        if let Some(target) = &self.extraction.translate_to {
            println!("  Translate To: {}", target);
        }
        println!(
            "  Layer Budgets: L1 {}ms, L2 {}ms, L3 {}ms, L4 {}ms",
            timeouts.embedded_state_ms,
            timeouts.interception_ms,
            timeouts.rendered_panel_ms,
            timeouts.direct_fetch_ms
        );
        println!(
            "  Request Timeout: {}ms (retry after {}ms)",
            timeouts.request_ms, self.extraction.retry_delay_ms
        );
        println!("  Platform: {}", self.http.base_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_budget_must_cover_retry() {
        let mut config = Config::default();
        config.extraction.timeouts.interception_ms = config.extraction.timeouts.request_ms;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interception_ms"));
    }

    #[test]
    fn test_direct_fetch_budget_covers_both_requests() {
        let mut config = Config::default();
        let timeouts = &mut config.extraction.timeouts;
        timeouts.request_ms = 2_000;
        config.extraction.retry_delay_ms = 250;

        config.extraction.timeouts.direct_fetch_ms = 8_499;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("direct_fetch_ms"));

        config.extraction.timeouts.direct_fetch_ms = 8_500;
        config.validate().unwrap();
    }

    #[test]
    fn test_huge_timeouts_do_not_overflow() {
        let mut config = Config::default();
        config.extraction.timeouts.request_ms = u64::MAX;
        config.extraction.retry_delay_ms = u64::MAX;
        assert!(config.validate().is_err());

        config.extraction.timeouts.request_ms = u64::MAX / 2;
        config.extraction.timeouts.panel_wait_ms = u64::MAX;
        config.extraction.retry_delay_ms = 0;
        let timeouts = &mut config.extraction.timeouts;
        timeouts.embedded_state_ms = u64::MAX;
        timeouts.interception_ms = u64::MAX;
        timeouts.direct_fetch_ms = u64::MAX;
        timeouts.rendered_panel_ms = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rendered_panel_ms"));
    }

    #[test]
    fn test_panel_budget_covers_retried_wait() {
        let mut config = Config::default();
        let timeouts = &mut config.extraction.timeouts;
        timeouts.panel_wait_ms = 2_000;
        timeouts.rendered_panel_ms = 4_000;
        config.extraction.retry_delay_ms = 250;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rendered_panel_ms"));

        config.extraction.timeouts.rendered_panel_ms = 4_251;
        config.validate().unwrap();
    }

    #[test]
    fn test_unparseable_selector_rejected() {
        let mut config = Config::default();
        config.selectors.settings_control.push("button[[".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("selectors.settings_control"));

        let mut config = Config::default();
        config.selectors.panel.timestamp = "..segment".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("selectors.panel.timestamp"));
    }

    #[test]
    fn test_empty_languages_rejected() {
        let mut config = Config::default();
        config.extraction.languages.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_writes_defaults_then_reads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = tokio_test::block_on(Config::load(Some(&path))).unwrap();
        assert!(path.exists());
        assert_eq!(config.extraction.languages, ["en", "en-US", "en-GB"]);

        fs_err::write(&path, "extraction:\n  languages: [de]\n  translate_to: null\n").unwrap();
        let config = tokio_test::block_on(Config::load(Some(&path))).unwrap();
        assert_eq!(config.extraction.languages, ["de"]);
        assert!(config.extraction.translate_to.is_none());
        assert_eq!(config.extraction.timeouts.request_ms, 2_000);
    }
}
