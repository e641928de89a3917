//! Transcript file storage.
//!
//! Writes rendered transcript documents into the output tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::TranscriptArtifact;

/// Folder used when transcripts are not organized by category
pub const FLAT_DIR_NAME: &str = "All_Transcripts";

/// Destination for successful extractions
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Write the document and return where it landed
    async fn persist(&self, artifact: &TranscriptArtifact) -> Result<PathBuf>;
}

/// Filesystem sink rooted at the output directory
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
    organize_by_category: bool,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>, organize_by_category: bool) -> Self {
        Self {
            root: root.into(),
            organize_by_category,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory an artifact belongs in
    pub fn dir_for(&self, artifact: &TranscriptArtifact) -> PathBuf {
        if self.organize_by_category {
            self.root
                .join(&artifact.classification.category)
                .join(&artifact.classification.subcategory)
        } else {
            self.root.join(FLAT_DIR_NAME)
        }
    }

    /// Full path an artifact is written to
    pub fn path_for(&self, artifact: &TranscriptArtifact) -> PathBuf {
        self.dir_for(artifact).join(artifact.file_name())
    }
}

#[async_trait]
impl ArtifactSink for FsSink {
    async fn persist(&self, artifact: &TranscriptArtifact) -> Result<PathBuf> {
        let path = self.path_for(artifact);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.with_context(|| {
                format!("Failed to create transcript directory: {}", dir.display())
            })?;
        }

        let document = artifact.render()?;
        fs::write(&path, document)
            .await
            .with_context(|| format!("Failed to write transcript: {}", path.display()))?;

        debug!(path = %path.display(), "Wrote transcript");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Classification, Item, Transcript, TranscriptEntry, TranscriptKind};
    use tempfile::TempDir;

    fn artifact() -> TranscriptArtifact {
        TranscriptArtifact::new(
            Item::new("vid1", "Yoma Daf 3"),
            Classification::new("Yoma", "Daf_Yomi"),
            Transcript {
                kind: TranscriptKind::AutoGenerated,
                language: "en".to_string(),
                entries: vec![TranscriptEntry::new("today we learn", 0.0, 2.0)],
            },
        )
    }

    #[tokio::test]
    async fn test_persist_by_category() {
        let temp = TempDir::new().unwrap();
        let sink = FsSink::new(temp.path(), true);

        let path = sink.persist(&artifact()).await.unwrap();
        assert_eq!(
            path,
            temp.path().join("Yoma").join("Daf_Yomi").join("Yoma_Daf_3_vid1.txt")
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Title: Yoma Daf 3\n"));
        assert!(content.contains("today we learn"));
    }

    #[tokio::test]
    async fn test_persist_flat() {
        let temp = TempDir::new().unwrap();
        let sink = FsSink::new(temp.path(), false);

        let path = sink.persist(&artifact()).await.unwrap();
        assert_eq!(path, temp.path().join(FLAT_DIR_NAME).join("Yoma_Daf_3_vid1.txt"));
        assert_eq!(sink.path_for(&artifact()), path);
    }

    #[tokio::test]
    async fn test_unwritable_root_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let sink = FsSink::new(&blocker, true);
        assert!(sink.persist(&artifact()).await.is_err());
    }
}
