//! Remote items (videos) and their metadata enrichment.
//!
//! An item is discovered by channel enumeration and is immutable afterwards,
//! except for the fields a second metadata fetch can fill in.

use serde::{Deserialize, Serialize};

/// Engagement counters reported by the metadata service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementStats {
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
}

/// One unit of remote content to be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable item identifier (the video id)
    pub id: String,

    /// Title as published
    pub title: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Publish timestamp as reported by the service (RFC 3339)
    pub published_at: Option<String>,

    /// Raw duration token (e.g. "PT1H2M3S"), filled in by enrichment
    pub duration: Option<String>,

    /// Engagement counters, filled in by enrichment
    #[serde(default)]
    pub stats: EngagementStats,

    /// Canonical watch URL
    pub url: String,

    /// Channel display name, filled in by enrichment
    pub channel_title: Option<String>,

    /// Uploader-provided tags, filled in by enrichment
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Item {
    /// Create an item with the canonical watch URL derived from its id
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        let url = watch_url(&id);

        Self {
            id,
            title: title.into(),
            description: String::new(),
            published_at: None,
            duration: None,
            stats: EngagementStats::default(),
            url,
            channel_title: None,
            tags: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the publish timestamp
    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    /// Merge a metadata fetch into this item.
    ///
    /// The identifier and URL never change. Text fields are only replaced
    /// when the fetch returned something non-empty.
    pub fn enrich(&mut self, metadata: VideoMetadata) {
        if !metadata.title.is_empty() {
            self.title = metadata.title;
        }
        if !metadata.description.is_empty() {
            self.description = metadata.description;
        }
        if metadata.published_at.is_some() {
            self.published_at = metadata.published_at;
        }
        if metadata.duration.is_some() {
            self.duration = metadata.duration;
        }
        if metadata.channel_title.is_some() {
            self.channel_title = metadata.channel_title;
        }
        if !metadata.tags.is_empty() {
            self.tags = metadata.tags;
        }
        self.stats = metadata.stats;
    }

    /// Duration in whole seconds (0 when unknown)
    pub fn duration_seconds(&self) -> u64 {
        self.duration
            .as_deref()
            .map(crate::core::parse::parse_duration)
            .unwrap_or(0)
    }
}

/// Detailed metadata returned by the metadata service for one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub published_at: Option<String>,
    pub duration: Option<String>,
    pub stats: EngagementStats,
    pub channel_title: Option<String>,
    pub tags: Vec<String>,
}

/// Build the canonical watch URL for an item id
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}
