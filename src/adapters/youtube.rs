//! YouTube Data API v3 client and the composite [`VideoSource`].
//!
//! The Data API handles channel enumeration and metadata enrichment; the
//! caption service handles transcripts. Without an API key, enumeration fails
//! and enrichment is skipped.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::timedtext::TimedTextClient;
use super::{http_client, ChannelRef, SourceError, VideoSource};
use crate::domain::{EngagementStats, Item, TranscriptEntry, TranscriptTrack, VideoMetadata};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const SERVICE: &str = "Data API";

/// Results per page (the API maximum)
const PAGE_SIZE: usize = 50;

/// Pause between playlist pages
const PAGE_PAUSE: Duration = Duration::from_millis(100);

/// YouTube Data API v3 client
pub struct YouTubeDataApi {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: Option<Snippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<PlaylistItemDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemDetails {
    #[serde(rename = "videoId")]
    video_id: String,
    #[serde(rename = "videoPublishedAt")]
    video_published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "channelTitle")]
    channel_title: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    snippet: Option<Snippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<VideoContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

/// Counters arrive as decimal strings
#[derive(Debug, Default, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}

impl Statistics {
    fn into_stats(self) -> EngagementStats {
        let count = |v: Option<String>| v.and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        EngagementStats {
            view_count: count(self.view_count),
            like_count: count(self.like_count),
            comment_count: count(self.comment_count),
        }
    }
}

impl YouTubeDataApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, resource);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Parse {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    /// Resolve a channel reference to (channel id, uploads playlist id)
    #[instrument(skip(self))]
    pub async fn resolve_uploads(&self, channel: &ChannelRef) -> Result<(String, String), SourceError> {
        let response: ListResponse<ChannelResource> = match channel {
            ChannelRef::Handle(handle) => {
                let handle = handle.trim_start_matches('@');
                self.get("channels", &[("part", "id,contentDetails"), ("forHandle", handle)])
                    .await?
            }
            ChannelRef::Id(id) => {
                self.get("channels", &[("part", "id,contentDetails"), ("id", id.as_str())])
                    .await?
            }
        };

        let channel_resource = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound(format!("channel {}", channel)))?;

        let uploads = channel_resource
            .content_details
            .map(|d| d.related_playlists.uploads)
            .ok_or_else(|| SourceError::NotFound(format!("uploads playlist for {}", channel)))?;

        info!(channel_id = %channel_resource.id, %uploads, "Resolved channel");
        Ok((channel_resource.id, uploads))
    }

    /// Page through the uploads playlist
    pub async fn list_uploads(
        &self,
        playlist_id: &str,
        max_count: Option<usize>,
    ) -> Result<Vec<Item>, SourceError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = PAGE_SIZE.to_string();

        loop {
            let page: ListResponse<PlaylistItemResource> = {
                let mut query = vec![
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", page_size.as_str()),
                ];
                if let Some(ref token) = page_token {
                    query.push(("pageToken", token.as_str()));
                }
                self.get("playlistItems", &query).await?
            };

            for resource in page.items {
                if max_count.is_some_and(|max| items.len() >= max) {
                    break;
                }
                if let Some(item) = item_from_playlist_entry(resource) {
                    items.push(item);
                }
            }

            debug!(fetched = items.len(), "Fetched playlist page");

            page_token = page.next_page_token;
            let full = max_count.is_some_and(|max| items.len() >= max);
            if page_token.is_none() || full {
                break;
            }

            tokio::time::sleep(PAGE_PAUSE).await;
        }

        Ok(items)
    }

    /// Metadata for one video
    pub async fn video_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, SourceError> {
        let response: ListResponse<VideoResource> = self
            .get(
                "videos",
                &[("part", "snippet,contentDetails,statistics"), ("id", video_id)],
            )
            .await?;

        Ok(response.items.into_iter().next().map(metadata_from_video))
    }
}

fn item_from_playlist_entry(resource: PlaylistItemResource) -> Option<Item> {
    let details = resource.content_details?;
    let snippet = resource.snippet.unwrap_or_default();

    let published = details.video_published_at.or(snippet.published_at);
    let mut item = Item::new(details.video_id, snippet.title).with_description(snippet.description);
    item.published_at = published;
    item.channel_title = snippet.channel_title;
    Some(item)
}

fn metadata_from_video(resource: VideoResource) -> VideoMetadata {
    let snippet = resource.snippet.unwrap_or_default();
    VideoMetadata {
        title: snippet.title,
        description: snippet.description,
        published_at: snippet.published_at,
        duration: resource.content_details.and_then(|d| d.duration),
        stats: resource.statistics.unwrap_or_default().into_stats(),
        channel_title: snippet.channel_title,
        tags: snippet.tags,
    }
}

/// Data API plus caption service behind one [`VideoSource`]
pub struct YouTubeSource {
    data_api: Option<YouTubeDataApi>,
    captions: TimedTextClient,
}

impl YouTubeSource {
    pub fn new(data_api: Option<YouTubeDataApi>, captions: TimedTextClient) -> Self {
        Self { data_api, captions }
    }

    /// Build from an optional API key with default endpoints.
    ///
    /// Every HTTP request made by either service gives up after `timeout`.
    pub fn from_api_key(api_key: Option<&str>, timeout: Duration) -> Result<Self, SourceError> {
        let client = http_client(timeout)?;
        let data_api = api_key
            .filter(|k| !k.trim().is_empty())
            .map(|k| YouTubeDataApi::new(k).with_client(client.clone()));
        Ok(Self::new(data_api, TimedTextClient::new().with_client(client)))
    }
}

#[async_trait]
impl VideoSource for YouTubeSource {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn list_items(
        &self,
        channel: &ChannelRef,
        max_count: Option<usize>,
    ) -> Result<Vec<Item>, SourceError> {
        let api = self.data_api.as_ref().ok_or(SourceError::MissingApiKey)?;
        let (_, uploads) = api.resolve_uploads(channel).await?;
        api.list_uploads(&uploads, max_count).await
    }

    async fn fetch_metadata(&self, item_id: &str) -> Result<Option<VideoMetadata>, SourceError> {
        match self.data_api {
            Some(ref api) => api.video_metadata(item_id).await,
            None => Ok(None),
        }
    }

    async fn list_transcripts(&self, item_id: &str) -> Result<Vec<TranscriptTrack>, SourceError> {
        self.captions.list_tracks(item_id).await
    }

    async fn fetch_transcript(
        &self,
        item_id: &str,
        track: &TranscriptTrack,
    ) -> Result<Vec<TranscriptEntry>, SourceError> {
        self.captions.fetch_track(item_id, track).await
    }
}
