//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use chanscribe::adapters::{ChannelRef, SourceError, VideoSource};
use chanscribe::config::ExtractionSettings;
use chanscribe::core::{BatchProcessor, ClassificationTables, Classifier, ProgressStore, RunSummary};
use chanscribe::domain::{Item, TranscriptArtifact, TranscriptEntry, TranscriptTrack, VideoMetadata};
use chanscribe::library::{ArtifactSink, Catalog, FsSink, ReportWriter};

pub fn channel() -> ChannelRef {
    ChannelRef::Handle("@TestChannel".to_string())
}

/// Settings with pacing disabled
pub fn settings(batch_size: usize) -> ExtractionSettings {
    ExtractionSettings {
        batch_size,
        rate_limit_seconds: 0.0,
        batch_pause_seconds: 0.0,
        max_retries: 3,
        backoff_base: 2.0,
        ..Default::default()
    }
}

/// In-memory source driven by a script
#[derive(Default)]
pub struct ScriptedSource {
    items: Vec<Item>,
    metadata: HashMap<String, VideoMetadata>,
    tracks: HashMap<String, Vec<TranscriptTrack>>,
    always_fail: HashSet<String>,
    fail_first: HashMap<String, usize>,
    empty: HashSet<String>,
    fail_enumeration: bool,
    fail_metadata: bool,
    stalled_metadata: HashSet<String>,
    stalled_transcripts: HashSet<String>,
    observed_store: Option<ProgressStore>,
    watched_catalog: Option<PathBuf>,

    transcript_calls: Mutex<Vec<String>>,
    metadata_calls: Mutex<Vec<String>>,
    observed_cursor: Mutex<Vec<(String, Option<usize>)>>,
    observed_catalog_rows: Mutex<Vec<usize>>,
}

impl ScriptedSource {
    /// Items titled so they classify as Berachos / Shiurim
    pub fn new(ids: &[&str]) -> Self {
        Self {
            items: ids
                .iter()
                .map(|id| Item::new(*id, format!("Berachos shiur {}", id)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Every transcript attempt for `id` fails
    pub fn failing(mut self, id: &str) -> Self {
        self.always_fail.insert(id.to_string());
        self
    }

    /// The first `n` transcript attempts for `id` fail
    pub fn flaky(mut self, id: &str, n: usize) -> Self {
        self.fail_first.insert(id.to_string(), n);
        self
    }

    /// `id` offers a transcript with only blank lines
    pub fn empty_transcript(mut self, id: &str) -> Self {
        self.empty.insert(id.to_string());
        self
    }

    pub fn with_tracks(mut self, id: &str, tracks: Vec<TranscriptTrack>) -> Self {
        self.tracks.insert(id.to_string(), tracks);
        self
    }

    pub fn with_metadata(mut self, id: &str, metadata: VideoMetadata) -> Self {
        self.metadata.insert(id.to_string(), metadata);
        self
    }

    pub fn fail_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    pub fn fail_metadata(mut self) -> Self {
        self.fail_metadata = true;
        self
    }

    /// Metadata requests for `id` never complete
    pub fn stall_metadata(mut self, id: &str) -> Self {
        self.stalled_metadata.insert(id.to_string());
        self
    }

    /// Transcript listings for `id` never complete
    pub fn stall_transcripts(mut self, id: &str) -> Self {
        self.stalled_transcripts.insert(id.to_string());
        self
    }

    /// Record the committed batch cursor each time an item is attempted
    pub fn observe(mut self, store: ProgressStore) -> Self {
        self.observed_store = Some(store);
        self
    }

    /// Record the catalog row count on disk each time an item is attempted
    pub fn watch_catalog(mut self, path: PathBuf) -> Self {
        self.watched_catalog = Some(path);
        self
    }

    /// Number of transcript attempts made for `id`
    pub fn attempts(&self, id: &str) -> usize {
        self.transcript_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == id)
            .count()
    }

    /// Distinct items attempted, in first-attempt order
    pub fn attempted(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for id in self.transcript_calls.lock().unwrap().iter() {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.lock().unwrap().len()
    }

    pub fn observed_cursor(&self) -> Vec<(String, Option<usize>)> {
        self.observed_cursor.lock().unwrap().clone()
    }

    pub fn observed_catalog_rows(&self) -> Vec<usize> {
        self.observed_catalog_rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_items(
        &self,
        _channel: &ChannelRef,
        max_count: Option<usize>,
    ) -> Result<Vec<Item>, SourceError> {
        if self.fail_enumeration {
            return Err(SourceError::Status {
                service: "scripted",
                status: 403,
                body: "quotaExceeded".to_string(),
            });
        }
        let limit = max_count.unwrap_or(usize::MAX);
        Ok(self.items.iter().take(limit).cloned().collect())
    }

    async fn fetch_metadata(&self, item_id: &str) -> Result<Option<VideoMetadata>, SourceError> {
        self.metadata_calls.lock().unwrap().push(item_id.to_string());
        if self.fail_metadata {
            return Err(SourceError::Unavailable("metadata service down".to_string()));
        }
        if self.stalled_metadata.contains(item_id) {
            return std::future::pending().await;
        }
        Ok(self.metadata.get(item_id).cloned())
    }

    async fn list_transcripts(&self, item_id: &str) -> Result<Vec<TranscriptTrack>, SourceError> {
        let attempt = {
            let mut calls = self.transcript_calls.lock().unwrap();
            calls.push(item_id.to_string());
            calls.iter().filter(|c| c.as_str() == item_id).count()
        };

        if let Some(ref store) = self.observed_store {
            let cursor = store.try_load().ok().flatten().and_then(|s| s.last_completed_batch);
            self.observed_cursor
                .lock()
                .unwrap()
                .push((item_id.to_string(), cursor));
        }

        if let Some(ref path) = self.watched_catalog {
            let rows = Catalog::read_csv(path).map(|c| c.len()).unwrap_or(0);
            self.observed_catalog_rows.lock().unwrap().push(rows);
        }

        if self.stalled_transcripts.contains(item_id) {
            return std::future::pending().await;
        }
        if self.always_fail.contains(item_id) {
            return Err(SourceError::NotFound(format!("captions for {}", item_id)));
        }
        if self.fail_first.get(item_id).is_some_and(|n| attempt <= *n) {
            return Err(SourceError::Unavailable("transient caption error".to_string()));
        }

        Ok(self
            .tracks
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| vec![TranscriptTrack::new("en", false)]))
    }

    async fn fetch_transcript(
        &self,
        item_id: &str,
        track: &TranscriptTrack,
    ) -> Result<Vec<TranscriptEntry>, SourceError> {
        if self.empty.contains(item_id) {
            return Ok(vec![TranscriptEntry::new("  ", 0.0, 1.0)]);
        }
        Ok(vec![
            TranscriptEntry::new(format!("transcript of {}", item_id), 0.0, 2.0),
            TranscriptEntry::new(format!("in {}", track.language_code), 2.0, 1.5),
        ])
    }
}

/// Sink that fails for chosen items and writes the rest to disk
pub struct FailingSink {
    inner: FsSink,
    fail_for: HashSet<String>,
}

impl FailingSink {
    pub fn new(root: &Path, fail_for: &[&str]) -> Self {
        Self {
            inner: FsSink::new(root, true),
            fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ArtifactSink for FailingSink {
    async fn persist(&self, artifact: &TranscriptArtifact) -> Result<PathBuf> {
        if self.fail_for.contains(&artifact.item.id) {
            anyhow::bail!("disk full while writing {}", artifact.item.id);
        }
        self.inner.persist(artifact).await
    }
}

/// Run the processor over `source` with reports in `dir`
pub async fn run(
    source: Arc<ScriptedSource>,
    dir: &Path,
    settings: &ExtractionSettings,
) -> Result<RunSummary> {
    let sink = Arc::new(FsSink::new(dir, true));
    run_with_sink(source, sink, dir, settings).await
}

pub async fn run_with_sink(
    source: Arc<ScriptedSource>,
    sink: Arc<dyn ArtifactSink>,
    dir: &Path,
    settings: &ExtractionSettings,
) -> Result<RunSummary> {
    let classifier = Classifier::new(&ClassificationTables::default());
    BatchProcessor::new(settings, &classifier, source, sink, ProgressStore::in_dir(dir))
        .with_reports(ReportWriter::new(dir))
        .run(&channel(), settings.max_items)
        .await
}
