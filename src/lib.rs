//! chanscribe - Resumable channel transcript extraction
//!
//! Bulk-extracts transcripts and metadata for every item of a video channel,
//! classifies each item into a subject taxonomy, and writes an organized
//! transcript tree with a catalog and reports.
//!
//! # Architecture
//!
//! The system is a single sequential batch loop:
//! - Items are enumerated once and cut into fixed-size batches
//! - Each item is enriched, extracted with retries, classified and persisted
//! - Progress is committed atomically at every batch boundary
//! - An interrupted run resumes from the last committed batch
//!
//! # Modules
//!
//! - `adapters`: Remote services (Data API, caption service)
//! - `core`: Parsers, classifier, progress store, batch processor
//! - `domain`: Data structures (Item, Transcript, outcomes)
//! - `library`: Transcript files, catalog and reports
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Extract the configured channel (resumes automatically)
//! chanscribe extract
//!
//! # Look at the channel before extracting
//! chanscribe scan --max-items 200
//!
//! # Check stored progress
//! chanscribe status
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{ChannelRef, SourceError, VideoSource, YouTubeSource};
pub use config::{Config, ExtractionSettings};
pub use core::{BatchProcessor, Classifier, ProgressState, ProgressStore, RunSummary};
pub use domain::{ExtractError, ExtractionOutcome, Item, ResultRecord};
pub use library::{ArtifactSink, FsSink, ReportWriter};
