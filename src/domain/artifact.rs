//! Per-item transcript documents.
//!
//! A document is a fixed-order header block, the flattened transcript text,
//! and the raw timed entries serialized as JSON for archival.

use anyhow::{Context, Result};

use super::item::Item;
use super::outcome::Classification;
use super::transcript::Transcript;

/// Separator between the header block and the transcript text
pub const HEADER_SEPARATOR_WIDTH: usize = 80;

/// Heading of the structured-data section
pub const STRUCTURED_DATA_HEADING: &str = "STRUCTURED TRANSCRIPT DATA (JSON)";

/// A transcript document ready to be written by a sink
#[derive(Debug, Clone)]
pub struct TranscriptArtifact {
    pub item: Item,
    pub classification: Classification,
    pub transcript: Transcript,
}

impl TranscriptArtifact {
    pub fn new(item: Item, classification: Classification, transcript: Transcript) -> Self {
        Self {
            item,
            classification,
            transcript,
        }
    }

    /// File name: sanitized title followed by the item id
    pub fn file_name(&self) -> String {
        format!("{}_{}.txt", safe_title(&self.item.title), self.item.id)
    }

    /// Render the full document
    pub fn render(&self) -> Result<String> {
        let item = &self.item;
        let transcript = &self.transcript;

        let mut doc = String::new();
        doc.push_str(&format!("Title: {}\n", item.title));
        doc.push_str(&format!("Video ID: {}\n", item.id));
        doc.push_str(&format!("URL: {}\n", item.url));
        doc.push_str(&format!(
            "Published: {}\n",
            item.published_at.as_deref().unwrap_or("Unknown")
        ));
        doc.push_str(&format!("Category: {}\n", self.classification.category));
        doc.push_str(&format!("Subcategory: {}\n", self.classification.subcategory));
        doc.push_str(&format!("Transcript Type: {}\n", transcript.kind));
        doc.push_str(&format!("Language: {}\n", transcript.language));
        doc.push_str(&format!("Word Count: {}\n", transcript.word_count()));
        doc.push_str(&format!(
            "Duration Covered: {:.1} seconds\n",
            transcript.duration_covered()
        ));
        doc.push_str(&"-".repeat(HEADER_SEPARATOR_WIDTH));
        doc.push_str("\n\n");
        doc.push_str(&transcript.text());

        let raw = serde_json::to_string_pretty(&transcript.entries)
            .context("Failed to serialize transcript entries")?;

        doc.push_str("\n\n");
        doc.push_str(&"=".repeat(HEADER_SEPARATOR_WIDTH));
        doc.push('\n');
        doc.push_str(STRUCTURED_DATA_HEADING);
        doc.push('\n');
        doc.push_str(&"=".repeat(HEADER_SEPARATOR_WIDTH));
        doc.push('\n');
        doc.push_str(&raw);

        Ok(doc)
    }
}

/// Reduce a title to a filesystem-friendly stem.
///
/// Keeps word characters, whitespace and hyphens, then collapses every run
/// of whitespace/hyphens into a single underscore.
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let mut out = String::with_capacity(kept.len());
    let mut in_run = false;
    for c in kept.chars() {
        if c == '-' || c.is_whitespace() {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }

    if out.is_empty() {
        "untitled".to_string()
    } else {
        out
    }
}
