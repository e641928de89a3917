//! Adapter interfaces for the remote video services.
//!
//! The batch processor only sees the [`VideoSource`] trait. The concrete
//! source combines the Data API (enumeration and metadata) with the caption
//! service (transcripts).

pub mod timedtext;
pub mod youtube;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Item, TranscriptEntry, TranscriptTrack, VideoMetadata};

pub use timedtext::TimedTextClient;
pub use youtube::{YouTubeDataApi, YouTubeSource};

/// Errors returned at the remote service boundary
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Could not parse {service} response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },

    #[error("No API key configured for the Data API")]
    MissingApiKey,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),
}

/// HTTP client whose requests give up after `timeout` (no limit when zero)
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    let mut builder = reqwest::Client::builder();
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// How the channel is identified in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelRef {
    /// Handle such as "@SomeChannel"
    Handle(String),

    /// Channel id such as "UC..."
    Id(String),
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRef::Handle(h) => write!(f, "{}", h),
            ChannelRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Capability boundary for the remote services
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Enumerate the channel's items in upload order, flattened across pages
    async fn list_items(
        &self,
        channel: &ChannelRef,
        max_count: Option<usize>,
    ) -> Result<Vec<Item>, SourceError>;

    /// Detailed metadata for one item, or `None` when unavailable
    async fn fetch_metadata(&self, item_id: &str) -> Result<Option<VideoMetadata>, SourceError>;

    /// Transcript tracks offered for one item
    async fn list_transcripts(&self, item_id: &str) -> Result<Vec<TranscriptTrack>, SourceError>;

    /// Fetch the timed entries of one track
    async fn fetch_transcript(
        &self,
        item_id: &str,
        track: &TranscriptTrack,
    ) -> Result<Vec<TranscriptEntry>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ref_display() {
        assert_eq!(ChannelRef::Handle("@Chan".to_string()).to_string(), "@Chan");
        assert_eq!(ChannelRef::Id("UC123".to_string()).to_string(), "UC123");
    }

    #[test]
    fn test_status_error_message() {
        let err = SourceError::Status {
            service: "Data API",
            status: 403,
            body: "quotaExceeded".to_string(),
        };
        assert_eq!(err.to_string(), "Data API returned 403: quotaExceeded");
    }

    #[test]
    fn test_http_client_accepts_zero_timeout() {
        assert!(http_client(Duration::from_secs(30)).is_ok());
        assert!(http_client(Duration::ZERO).is_ok());
    }
}
