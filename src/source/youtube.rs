//! YouTube caption fetcher.
//!
//! Reads the public caption track list embedded in the watch page, then
//! downloads the timed-text XML for the preferred track. Any failure along the
//! way is reported as [`PipelineError::SourceUnavailable`].

use super::video::TranscriptSource;
use crate::error::Result;
use crate::types::TranscriptSegment;
use crate::PipelineError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    /// `"asr"` for auto-generated captions.
    #[serde(default)]
    kind: Option<String>,
}

/// [`TranscriptSource`] backed by YouTube's public caption endpoints.
#[derive(Debug, Clone)]
pub struct YoutubeTranscripts {
    client: Client,
    base_url: String,
    preferred_language: String,
}

impl YoutubeTranscripts {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            preferred_language: "en".to_string(),
        }
    }

    /// Override the host (used to point at a local mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Caption language to prefer when several tracks exist. Default: `en`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.preferred_language = language.into();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("GET {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::SourceUnavailable(format!(
                "GET {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }
        resp.text()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("reading {}: {}", url, e)))
    }

    fn pick_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        let lang = self.preferred_language.as_str();
        tracks
            .iter()
            .find(|t| t.language_code == lang && t.kind.as_deref() != Some("asr"))
            .or_else(|| tracks.iter().find(|t| t.language_code == lang))
            .or_else(|| tracks.first())
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscripts {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let watch_url = format!("{}/watch?v={}", self.base_url, video_id);
        let page = self.get_text(&watch_url).await?;

        let tracks = caption_tracks(&page).ok_or_else(|| {
            PipelineError::SourceUnavailable(format!("no captions listed for {}", video_id))
        })?;
        let track = self.pick_track(&tracks).ok_or_else(|| {
            PipelineError::SourceUnavailable(format!("no caption tracks for {}", video_id))
        })?;
        debug!(video_id, language = %track.language_code, "selected caption track");

        let xml = self.get_text(&track.base_url).await?;
        Ok(parse_timed_text(&xml))
    }
}

/// Pull the `captionTracks` array out of a watch page.
fn caption_tracks(page: &str) -> Option<Vec<CaptionTrack>> {
    let start = page.find(CAPTION_TRACKS_KEY)? + CAPTION_TRACKS_KEY.len();
    // Parse exactly one JSON value and ignore whatever follows it.
    serde_json::Deserializer::from_str(&page[start..])
        .into_iter::<Vec<CaptionTrack>>()
        .next()?
        .ok()
}

/// Parse `<text start=".." dur="..">..</text>` nodes into segments, in order.
pub fn parse_timed_text(xml: &str) -> Vec<TranscriptSegment> {
    let doc = Html::parse_fragment(xml);
    let Ok(sel) = Selector::parse("text") else {
        return Vec::new();
    };

    doc.select(&sel)
        .filter_map(|node| {
            let raw: String = node.text().collect();
            let text = decode_entities(&raw).trim().to_string();
            if text.is_empty() {
                return None;
            }
            let start = parse_seconds(node.value().attr("start")).unwrap_or_default();
            let duration = parse_seconds(node.value().attr("dur"));
            Some(TranscriptSegment {
                text,
                start,
                duration,
            })
        })
        .collect()
}

fn parse_seconds(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Caption text is entity-encoded twice; the HTML parser undoes one layer,
/// this undoes the second.
fn decode_entities(text: &str) -> String {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let numeric = NUMERIC.get_or_init(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").unwrap());

    let replaced = numeric.replace_all(text, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    replaced
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace('\n', " ")
}
