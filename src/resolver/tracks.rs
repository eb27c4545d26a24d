use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::captions::CaptionFormat;
use crate::transcript::{LayerKind, TrackKind, TranscriptMetadata};
use crate::ExtractionError;

/// A caption track advertised by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    pub name: Option<String>,
    /// `true` for automatic speech recognition tracks
    pub is_generated: bool,
    pub is_translatable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    tracklist: Option<Tracklist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tracklist {
    #[serde(default)]
    caption_tracks: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrack {
    base_url: String,
    language_code: String,
    name: Option<TrackName>,
    kind: Option<String>,
    #[serde(default)]
    is_translatable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    simple_text: Option<String>,
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl TrackName {
    fn into_text(self) -> Option<String> {
        self.simple_text.or_else(|| {
            self.runs
                .map(|runs| runs.into_iter().map(|run| run.text).collect::<String>())
        })
    }
}

/// Caption tracks from a player response (embedded page state or the player endpoint)
pub fn caption_tracks(player_response: &Value) -> Result<Vec<CaptionTrack>, ExtractionError> {
    let response: PlayerResponse = serde_json::from_value(player_response.clone())
        .map_err(|e| {
            ExtractionError::PreconditionUnmet(format!("unexpected player state: {}", e))
        })?;

    let tracks: Vec<CaptionTrack> = response
        .captions
        .and_then(|captions| captions.tracklist)
        .map(|tracklist| tracklist.caption_tracks)
        .unwrap_or_default()
        .into_iter()
        .map(|raw| CaptionTrack {
            base_url: raw.base_url,
            language_code: raw.language_code,
            name: raw.name.and_then(TrackName::into_text),
            is_generated: raw.kind.as_deref() == Some("asr"),
            is_translatable: raw.is_translatable,
        })
        .collect();

    if tracks.is_empty() {
        return Err(ExtractionError::PreconditionUnmet(
            "player advertises no caption tracks".to_string(),
        ));
    }

    Ok(tracks)
}

/// Which track to prefer when several are offered
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPreference {
    /// Language codes in order of preference
    pub languages: Vec<String>,
    /// Target language for platform translation when no preferred track exists
    pub translate_to: Option<String>,
}

/// A selected track, possibly with a translation target
#[derive(Debug, Clone, PartialEq)]
pub struct TrackChoice {
    pub track: CaptionTrack,
    pub translate_to: Option<String>,
}

impl TrackPreference {
    /// Manual tracks first, then generated ones, each in language order; finally translation
    pub fn select(&self, tracks: &[CaptionTrack]) -> Option<TrackChoice> {
        for generated in [false, true] {
            for language in &self.languages {
                if let Some(track) = tracks.iter().find(|t| {
                    t.is_generated == generated && t.language_code.eq_ignore_ascii_case(language)
                }) {
                    return Some(TrackChoice {
                        track: track.clone(),
                        translate_to: None,
                    });
                }
            }
        }

        let target = self.translate_to.as_ref()?;
        tracks
            .iter()
            .find(|t| t.is_translatable)
            .map(|track| TrackChoice {
                track: track.clone(),
                translate_to: Some(target.clone()),
            })
    }
}

impl TrackChoice {
    /// Absolute caption URL asking for `format`
    pub fn caption_url(
        &self,
        base_url: &str,
        format: CaptionFormat,
    ) -> Result<String, ExtractionError> {
        let mut url = absolute_url(base_url, &self.track.base_url)?;

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "fmt" && key != "tlang")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &retained {
                query.append_pair(key, value);
            }
            if let Some(fmt) = format.query_value() {
                query.append_pair("fmt", fmt);
            }
            if let Some(target) = &self.translate_to {
                query.append_pair("tlang", target);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url.to_string())
    }

    pub fn metadata(&self, layer: LayerKind) -> TranscriptMetadata {
        let track_kind = if self.translate_to.is_some() {
            TrackKind::Translated
        } else if self.track.is_generated {
            TrackKind::Generated
        } else {
            TrackKind::Manual
        };

        TranscriptMetadata {
            language: Some(
                self.translate_to
                    .clone()
                    .unwrap_or_else(|| self.track.language_code.clone()),
            ),
            track_kind,
            track_name: self.track.name.clone(),
            source_layer: layer,
        }
    }
}

pub(crate) fn absolute_url(base_url: &str, url: &str) -> Result<Url, ExtractionError> {
    Url::parse(url)
        .or_else(|_| Url::parse(base_url).and_then(|base| base.join(url)))
        .map_err(|e| {
            ExtractionError::PreconditionUnmet(format!("bad caption URL '{}': {}", url, e))
        })
}
