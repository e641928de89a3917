//! Domain types for channel extraction.
//!
//! This module contains the core data structures:
//! - Item: a remote video and its metadata enrichment
//! - Transcript: tracks, timed entries, and fetched transcripts
//! - Outcome: per-item results, the error taxonomy, and report records
//! - Artifact: the per-item transcript document

pub mod artifact;
pub mod item;
pub mod outcome;
pub mod transcript;

// Re-export commonly used types
pub use artifact::{safe_title, TranscriptArtifact};
pub use item::{watch_url, EngagementStats, Item, VideoMetadata};
pub use outcome::{
    Classification, ErrorKind, ExtractError, ExtractionOutcome, ExtractionSuccess,
    FailureRecord, ItemStage, RecordStatus, ResultRecord,
};
pub use transcript::{Transcript, TranscriptEntry, TranscriptKind, TranscriptTrack};
