//! Transcript tracks and entries.

use serde::{Deserialize, Serialize};

/// How a transcript track was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptKind {
    /// Uploaded by the channel owner
    Manual,

    /// Produced by speech recognition
    AutoGenerated,
}

impl std::fmt::Display for TranscriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptKind::Manual => write!(f, "manual"),
            TranscriptKind::AutoGenerated => write!(f, "auto-generated"),
        }
    }
}

/// A transcript track offered for an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTrack {
    /// Language code (e.g. "en", "en-US", "he")
    pub language_code: String,

    /// Whether the track was generated by speech recognition
    pub is_generated: bool,
}

impl TranscriptTrack {
    pub fn new(language_code: impl Into<String>, is_generated: bool) -> Self {
        Self {
            language_code: language_code.into(),
            is_generated,
        }
    }

    pub fn kind(&self) -> TranscriptKind {
        if self.is_generated {
            TranscriptKind::AutoGenerated
        } else {
            TranscriptKind::Manual
        }
    }
}

/// One timed line of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,

    /// Offset from the start of the item, in seconds
    pub start: f64,

    /// Length of the line, in seconds
    pub duration: f64,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// A fetched transcript with the track it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub kind: TranscriptKind,
    pub language: String,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Flattened text: entry texts joined by single spaces
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Whitespace-separated word count of the flattened text
    pub fn word_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.text.split_whitespace().count())
            .sum()
    }

    /// Seconds covered: end of the last entry
    pub fn duration_covered(&self) -> f64 {
        self.entries
            .last()
            .map(|e| e.start + e.duration)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.text.trim().is_empty())
    }
}
