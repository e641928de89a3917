//! Core extraction logic.
//!
//! This module contains:
//! - Parse: duration tokens and item identifiers
//! - Classifier: ordered pattern tables
//! - Progress: durable progress store
//! - Retry: backoff and pacing
//! - Processor: the resumable batch loop

pub mod classifier;
pub mod parse;
pub mod processor;
pub mod progress;
pub mod retry;

// Re-export commonly used types
pub use classifier::{ClassificationTables, Classifier, OverrideRule, PatternRule};
pub use parse::{extract_item_id, format_seconds, parse_duration};
pub use processor::{select_track, BatchProcessor, RunSummary};
pub use progress::{ProgressLock, ProgressState, ProgressStore, PROGRESS_FILE_NAME};
pub use retry::{seconds, RetryPolicy};
