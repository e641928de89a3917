//! Caption track listing and download via the public timedtext endpoint.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::SourceError;
use crate::domain::{TranscriptEntry, TranscriptTrack};

const DEFAULT_BASE_URL: &str = "https://www.youtube.com/api/timedtext";
const SERVICE: &str = "caption service";

/// Client for the caption (timedtext) service
pub struct TimedTextClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for TimedTextClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

impl TimedTextClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a preconfigured HTTP client (for example one with a request timeout)
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn get_text(&self, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let response = self.client.get(&self.base_url).query(query).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(SERVICE.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }

    /// Tracks offered for an item; an item with no captions yields an empty list
    pub async fn list_tracks(&self, item_id: &str) -> Result<Vec<TranscriptTrack>, SourceError> {
        let body = self.get_text(&[("type", "list"), ("v", item_id)]).await?;
        let tracks = parse_track_list(&body);
        debug!(item_id, tracks = tracks.len(), "Listed caption tracks");
        Ok(tracks)
    }

    /// Download one track's timed entries
    pub async fn fetch_track(
        &self,
        item_id: &str,
        track: &TranscriptTrack,
    ) -> Result<Vec<TranscriptEntry>, SourceError> {
        let mut query = vec![
            ("v", item_id),
            ("lang", track.language_code.as_str()),
            ("fmt", "json3"),
        ];
        if track.is_generated {
            query.push(("kind", "asr"));
        }

        let body = self.get_text(&query).await?;
        if body.trim().is_empty() {
            return Err(SourceError::Unavailable(format!(
                "empty caption body for {} ({})",
                item_id, track.language_code
            )));
        }

        parse_json3(&body)
    }
}

fn track_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<track\b([^>]*)>").expect("static track regex"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_]+)="([^"]*)""#).expect("static attribute regex"))
}

/// Parse the `type=list` XML document into tracks, in document order
fn parse_track_list(xml: &str) -> Vec<TranscriptTrack> {
    track_regex()
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let mut lang = None;
            let mut generated = false;

            for attr in attr_regex().captures_iter(attrs) {
                match &attr[1] {
                    "lang_code" => lang = Some(attr[2].to_string()),
                    "kind" => generated = &attr[2] == "asr",
                    _ => {}
                }
            }

            lang.filter(|l| !l.is_empty())
                .map(|l| TranscriptTrack::new(l, generated))
        })
        .collect()
}

/// Parse a json3 caption document into entries measured in seconds
fn parse_json3(body: &str) -> Result<Vec<TranscriptEntry>, SourceError> {
    let doc: Json3 = serde_json::from_str(body).map_err(|e| SourceError::Parse {
        service: SERVICE,
        message: e.to_string(),
    })?;

    let entries = doc
        .events
        .into_iter()
        .filter(|event| !event.segs.is_empty())
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.replace('\n', " ").trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptEntry::new(
                text,
                event.start_ms as f64 / 1000.0,
                event.duration_ms as f64 / 1000.0,
            ))
        })
        .collect();

    Ok(entries)
}
