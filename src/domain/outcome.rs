//! Per-item outcomes, the error taxonomy, and the records handed to reports.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::Item;
use super::transcript::TranscriptKind;

/// Errors raised while extracting a channel.
///
/// Only `Enumeration` aborts a run. Everything else is caught at the item
/// boundary and becomes a failure record.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("could not enumerate channel items: {0}")]
    Enumeration(String),

    #[error("metadata fetch failed: {0}")]
    MetadataFetch(String),

    #[error("{0}")]
    TranscriptUnavailable(String),

    #[error("could not persist transcript: {0}")]
    Persistence(String),

    #[error("progress store unreadable: {0}")]
    ProgressStoreCorruption(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Enumeration(_) => ErrorKind::Enumeration,
            Self::MetadataFetch(_) => ErrorKind::MetadataFetch,
            Self::TranscriptUnavailable(_) => ErrorKind::TranscriptUnavailable,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::ProgressStoreCorruption(_) => ErrorKind::ProgressStoreCorruption,
        }
    }
}

/// Discriminant of [`ExtractError`], serialized into failure records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Enumeration,
    MetadataFetch,
    TranscriptUnavailable,
    Persistence,
    ProgressStoreCorruption,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Enumeration => "enumeration",
            ErrorKind::MetadataFetch => "metadata_fetch",
            ErrorKind::TranscriptUnavailable => "transcript_unavailable",
            ErrorKind::Persistence => "persistence",
            ErrorKind::ProgressStoreCorruption => "progress_store_corruption",
        };
        write!(f, "{}", s)
    }
}

/// Stage of an item in the extraction state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    Pending,
    FetchingMetadata,
    ExtractingTranscript,
    Classifying,
    Persisting,
    Done,
    Failed,
}

impl ItemStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStage::Done | ItemStage::Failed)
    }
}

impl std::fmt::Display for ItemStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStage::Pending => "pending",
            ItemStage::FetchingMetadata => "fetching_metadata",
            ItemStage::ExtractingTranscript => "extracting_transcript",
            ItemStage::Classifying => "classifying",
            ItemStage::Persisting => "persisting",
            ItemStage::Done => "done",
            ItemStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Classification attached to an item at persistence time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub subcategory: String,
}

impl Classification {
    pub fn new(category: impl Into<String>, subcategory: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.into(),
        }
    }
}

/// Payload of a successful extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSuccess {
    pub transcript_type: TranscriptKind,
    pub language: String,
    pub word_count: usize,
    pub duration_covered: f64,
    pub output_path: PathBuf,
}

/// Final result of processing one item in a run
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Success(ExtractionSuccess),
    Failure { error_kind: ErrorKind, message: String },
}

impl ExtractionOutcome {
    pub fn failure(error: &ExtractError) -> Self {
        Self::Failure {
            error_kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Status column of a catalog row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Failed,
}

/// One catalog row per processed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub item_id: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<String>,
    pub duration: Option<String>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub output_path: Option<String>,
    pub transcript_type: Option<TranscriptKind>,
    pub language: Option<String>,
    pub word_count: usize,
    pub duration_covered: f64,
    pub category: String,
    pub subcategory: String,
    pub status: RecordStatus,
    pub processed_at: DateTime<Utc>,
}

impl ResultRecord {
    /// Build the catalog row for an item's final outcome
    pub fn from_outcome(
        item: &Item,
        classification: &Classification,
        outcome: &ExtractionOutcome,
    ) -> Self {
        let mut record = Self::unprocessed(item, classification);

        if let ExtractionOutcome::Success(success) = outcome {
            record.output_path = Some(success.output_path.display().to_string());
            record.transcript_type = Some(success.transcript_type);
            record.language = Some(success.language.clone());
            record.word_count = success.word_count;
            record.duration_covered = success.duration_covered;
            record.status = RecordStatus::Success;
        }

        record
    }

    /// Row for an item an earlier run settled but whose own row was lost.
    ///
    /// Only the enumerated fields and the status are known.
    pub fn carried_over(item: &Item, classification: &Classification, status: RecordStatus) -> Self {
        Self {
            status,
            ..Self::unprocessed(item, classification)
        }
    }

    fn unprocessed(item: &Item, classification: &Classification) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            published_at: item.published_at.clone(),
            duration: item.duration.clone(),
            view_count: item.stats.view_count,
            like_count: item.stats.like_count,
            comment_count: item.stats.comment_count,
            output_path: None,
            transcript_type: None,
            language: None,
            word_count: 0,
            duration_covered: 0.0,
            category: classification.category.clone(),
            subcategory: classification.subcategory.clone(),
            status: RecordStatus::Failed,
            processed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}

/// Failure entry for the final summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item_id: String,
    pub title: String,
    pub error_kind: ErrorKind,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(item: &Item, error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            error_kind,
            error: message.into(),
            timestamp: Utc::now(),
        }
    }
}
