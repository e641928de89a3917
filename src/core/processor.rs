//! Resumable batch extraction.
//!
//! Drives each item through fetch, retry, classify and persist, committing
//! progress once per batch.
//!
//! Batches are cut from the full enumerated item list, so a batch index
//! names the same items on every run over an unchanged channel. On resume a
//! batch at or below the stored cursor is skipped whole, and items already in
//! the completed set are skipped inside the batches that do run.
//!
//! The catalog and failure list are rewritten at every batch commit, before
//! the progress file. A resumed run starts from the files left by earlier
//! runs, so the final catalog covers the whole pass.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{ChannelRef, SourceError, VideoSource};
use crate::config::ExtractionSettings;
use crate::domain::{
    Classification, ExtractError, ExtractionOutcome, ExtractionSuccess, FailureRecord, Item,
    ItemStage, RecordStatus, ResultRecord, Transcript, TranscriptArtifact, TranscriptTrack,
};
use crate::library::{ArtifactSink, Catalog, ReportWriter};

use super::classifier::Classifier;
use super::progress::{ProgressState, ProgressStore};
use super::retry::{pause, seconds};

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Identifier of the progress state this run worked on
    pub run_id: Uuid,

    /// Items returned by enumeration
    pub total_items: usize,

    /// Items skipped because a prior run covered them
    pub skipped: usize,

    pub succeeded: usize,
    pub failed: usize,

    /// Number of batches the item list was cut into
    pub batches: usize,

    /// Catalog rows for the items processed in this run
    pub records: Vec<ResultRecord>,

    /// Failures of this run
    pub failures: Vec<FailureRecord>,

    /// Whether the run continued progress left by an earlier run
    pub resumed: bool,

    /// Rows for every item the pass has settled, earlier runs included
    pub catalog: Catalog,

    /// Outstanding failures across the pass
    pub pass_failures: Vec<FailureRecord>,

    /// Progress state as last committed
    pub state: ProgressState,

    /// Where the progress file was archived
    pub archived_progress: Option<PathBuf>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Percentage of processed items that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.processed() == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.processed() as f64 * 100.0
        }
    }
}

/// Result of driving one item to a terminal stage
struct ProcessedItem {
    item: Item,
    record: ResultRecord,
    outcome: ExtractionOutcome,
}

/// Pick a track: each priority language in order (manual before generated),
/// then the first offered track when `fallback_to_any` is set
pub fn select_track<'a>(
    tracks: &'a [TranscriptTrack],
    priorities: &[String],
    fallback_to_any: bool,
) -> Option<&'a TranscriptTrack> {
    for language in priorities {
        let matching = |t: &&TranscriptTrack| t.language_code.eq_ignore_ascii_case(language);

        let preferred = tracks
            .iter()
            .filter(matching)
            .find(|t| !t.is_generated)
            .or_else(|| tracks.iter().find(matching));

        if preferred.is_some() {
            return preferred;
        }
    }

    if fallback_to_any {
        tracks.first()
    } else {
        None
    }
}

/// Sequential batch processor
pub struct BatchProcessor<'a> {
    settings: &'a ExtractionSettings,
    classifier: &'a Classifier,
    source: Arc<dyn VideoSource>,
    sink: Arc<dyn ArtifactSink>,
    store: ProgressStore,
    reports: Option<ReportWriter>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        settings: &'a ExtractionSettings,
        classifier: &'a Classifier,
        source: Arc<dyn VideoSource>,
        sink: Arc<dyn ArtifactSink>,
        store: ProgressStore,
    ) -> Self {
        Self {
            settings,
            classifier,
            source,
            sink,
            store,
            reports: None,
        }
    }

    /// Write reports at the end of every completed run
    pub fn with_reports(mut self, reports: ReportWriter) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Extract every item of `channel` not covered by stored progress
    #[instrument(skip(self, channel), fields(channel = %channel))]
    pub async fn run(&self, channel: &ChannelRef, max_items: Option<usize>) -> Result<RunSummary> {
        let _lock = self.store.lock()?;
        let started_at = Utc::now();

        let mut state = if self.settings.resume {
            self.store.load()
        } else {
            info!("Resume disabled, ignoring stored progress");
            ProgressState::new()
        };

        let resumed = state.has_progress();
        let (mut catalog, mut pass_failures) = match self.reports {
            Some(ref reports) if resumed => reports.load_previous(),
            _ => (Catalog::new(), Vec::new()),
        };

        let items = self.enumerate(channel, max_items).await?;
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = items.len().div_ceil(batch_size);

        info!(
            run_id = %state.run_id,
            items = items.len(),
            batches = batch_count,
            completed = state.completed.len(),
            last_batch = ?state.last_completed_batch,
            "Starting extraction"
        );

        let mut summary = RunSummary {
            run_id: state.run_id,
            total_items: items.len(),
            skipped: 0,
            succeeded: 0,
            failed: 0,
            batches: batch_count,
            records: Vec::new(),
            failures: Vec::new(),
            resumed,
            catalog: Catalog::new(),
            pass_failures: Vec::new(),
            state: state.clone(),
            archived_progress: None,
            started_at,
            finished_at: started_at,
        };

        for (index, batch) in items.chunks(batch_size).enumerate() {
            if state.is_batch_done(index) {
                info!(batch = index, "Batch already committed, skipping");
                summary.skipped += batch.len();
                self.carry_over(batch, &state, &mut catalog);
                continue;
            }

            let (first_record, first_failure) = (summary.records.len(), summary.failures.len());
            self.run_batch(index, batch, &mut state, &mut summary).await;

            let batch_records = &summary.records[first_record..];
            let processed: HashSet<&str> =
                batch_records.iter().map(|r| r.item_id.as_str()).collect();
            for record in batch_records {
                catalog.add(record.clone());
            }
            pass_failures.retain(|f| !processed.contains(f.item_id.as_str()));
            pass_failures.extend(summary.failures[first_failure..].iter().cloned());
            self.carry_over(batch, &state, &mut catalog);

            if let Some(ref reports) = self.reports {
                reports
                    .write_catalog(&catalog, &pass_failures)
                    .with_context(|| format!("Failed to write catalog after batch {}", index))?;
            }

            state.complete_batch(index);
            self.store
                .save(&state)
                .with_context(|| format!("Failed to commit progress after batch {}", index))?;

            info!(
                batch = index,
                of = batch_count,
                completed = state.completed.len(),
                failed = state.failed.len(),
                "Batch committed"
            );

            if index + 1 < batch_count {
                pause(seconds(self.settings.batch_pause_seconds)).await;
            }
        }

        summary.archived_progress = self.store.finalize()?;
        summary.state = state;
        summary.catalog = catalog;
        summary.pass_failures = pass_failures;
        summary.finished_at = Utc::now();

        if let Some(ref reports) = self.reports {
            reports
                .write_run(&summary)
                .context("Failed to write run reports")?;
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Extraction finished"
        );
        Ok(summary)
    }

    async fn enumerate(&self, channel: &ChannelRef, max_items: Option<usize>) -> Result<Vec<Item>> {
        let items = self
            .source
            .list_items(channel, max_items)
            .await
            .map_err(|e| ExtractError::Enumeration(e.to_string()))?;

        if items.is_empty() {
            return Err(ExtractError::Enumeration(format!("no items found for {}", channel)).into());
        }

        Ok(items)
    }

    /// Give items settled by earlier runs a catalog row when theirs is missing
    fn carry_over(&self, batch: &[Item], state: &ProgressState, catalog: &mut Catalog) {
        for item in batch {
            if catalog.get(&item.id).is_some() {
                continue;
            }

            let status = if state.is_completed(&item.id) {
                RecordStatus::Success
            } else if state.is_failed(&item.id) {
                RecordStatus::Failed
            } else {
                continue;
            };

            debug!(item_id = %item.id, ?status, "Carrying over row from an earlier run");
            let classification = self
                .classifier
                .classify(&item.title, Some(item.description.as_str()));
            catalog.add(ResultRecord::carried_over(item, &classification, status));
        }
    }

    #[instrument(skip_all, fields(batch = index, size = batch.len()))]
    async fn run_batch(
        &self,
        index: usize,
        batch: &[Item],
        state: &mut ProgressState,
        summary: &mut RunSummary,
    ) {
        let mut processed = Vec::with_capacity(batch.len());

        for item in batch {
            if state.is_completed(&item.id) {
                debug!(item_id = %item.id, "Already completed, skipping");
                summary.skipped += 1;
                continue;
            }

            processed.push(self.process_item(item.clone()).await);
            pause(seconds(self.settings.rate_limit_seconds)).await;
        }

        // Progress only changes at the batch boundary
        for done in processed {
            match done.outcome {
                ExtractionOutcome::Success(_) => {
                    state.mark_completed(&done.item.id);
                    summary.succeeded += 1;
                }
                ExtractionOutcome::Failure {
                    error_kind,
                    ref message,
                } => {
                    state.mark_failed(&done.item.id);
                    summary.failed += 1;
                    summary
                        .failures
                        .push(FailureRecord::new(&done.item, error_kind, message.clone()));
                }
            }
            summary.records.push(done.record);
        }
    }

    /// Drive one item to `done` or `failed`. Never returns an error.
    #[instrument(skip_all, fields(item_id = %item.id))]
    async fn process_item(&self, mut item: Item) -> ProcessedItem {
        let mut stage = ItemStage::Pending;

        advance(&item.id, &mut stage, ItemStage::FetchingMetadata);
        match self
            .with_deadline("metadata fetch", self.source.fetch_metadata(&item.id))
            .await
        {
            Ok(Some(metadata)) => item.enrich(metadata),
            Ok(None) => debug!("No metadata available"),
            Err(e) => {
                let err = ExtractError::MetadataFetch(e.to_string());
                warn!(error = %err, "Continuing with enumerated fields");
            }
        }

        advance(&item.id, &mut stage, ItemStage::ExtractingTranscript);
        let transcript = self.extract_transcript(&item.id).await;

        advance(&item.id, &mut stage, ItemStage::Classifying);
        let classification = self
            .classifier
            .classify(&item.title, Some(item.description.as_str()));

        let outcome = match transcript {
            Ok(transcript) => {
                advance(&item.id, &mut stage, ItemStage::Persisting);
                self.persist(&item, &classification, transcript).await
            }
            Err(e) => ExtractionOutcome::failure(&e),
        };

        match outcome {
            ExtractionOutcome::Success(ref success) => {
                advance(&item.id, &mut stage, ItemStage::Done);
                info!(
                    category = %classification.category,
                    words = success.word_count,
                    "Extracted transcript"
                );
            }
            ExtractionOutcome::Failure { ref message, .. } => {
                advance(&item.id, &mut stage, ItemStage::Failed);
                warn!(error = %message, "Item failed");
            }
        }

        let record = ResultRecord::from_outcome(&item, &classification, &outcome);
        ProcessedItem {
            item,
            record,
            outcome,
        }
    }

    async fn persist(
        &self,
        item: &Item,
        classification: &Classification,
        transcript: Transcript,
    ) -> ExtractionOutcome {
        let transcript_type = transcript.kind;
        let language = transcript.language.clone();
        let word_count = transcript.word_count();
        let duration_covered = transcript.duration_covered();

        let artifact = TranscriptArtifact::new(item.clone(), classification.clone(), transcript);
        match self.sink.persist(&artifact).await {
            Ok(output_path) => ExtractionOutcome::Success(ExtractionSuccess {
                transcript_type,
                language,
                word_count,
                duration_covered,
                output_path,
            }),
            Err(e) => ExtractionOutcome::failure(&ExtractError::Persistence(format!("{:#}", e))),
        }
    }

    /// Attempt extraction up to the configured number of times
    async fn extract_transcript(&self, item_id: &str) -> Result<Transcript, ExtractError> {
        let policy = self.settings.retry_policy();
        let mut attempt = 0u32;

        loop {
            match self.try_extract(item_id).await {
                Ok(transcript) => return Ok(transcript),
                Err(e) => {
                    if policy.should_retry(attempt) {
                        let delay = policy.delay_after_attempt(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transcript attempt failed, retrying"
                        );
                        pause(delay).await;
                        attempt += 1;
                        continue;
                    }

                    error!(attempts = attempt + 1, error = %e, "Transcript extraction failed");
                    return Err(e);
                }
            }
        }
    }

    async fn try_extract(&self, item_id: &str) -> Result<Transcript, ExtractError> {
        let unavailable = |e: SourceError| {
            ExtractError::TranscriptUnavailable(e.to_string())
        };

        let tracks = self
            .with_deadline("transcript listing", self.source.list_transcripts(item_id))
            .await
            .map_err(unavailable)?;

        let track = select_track(
            &tracks,
            &self.settings.language_priority,
            self.settings.fallback_to_any_language,
        )
        .ok_or_else(|| {
            ExtractError::TranscriptUnavailable(if tracks.is_empty() {
                "no transcripts available".to_string()
            } else {
                format!("no transcript in {}", self.settings.language_priority.join(", "))
            })
        })?;

        let entries = self
            .with_deadline("transcript download", self.source.fetch_transcript(item_id, track))
            .await
            .map_err(unavailable)?;

        let transcript = Transcript {
            kind: track.kind(),
            language: track.language_code.clone(),
            entries,
        };

        if transcript.is_empty() {
            return Err(ExtractError::TranscriptUnavailable(format!(
                "transcript {} is empty",
                track.language_code
            )));
        }

        Ok(transcript)
    }

    /// Await a remote call, failing it once the request timeout elapses
    async fn with_deadline<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        let limit = self.settings.request_timeout();
        if limit.is_zero() {
            return call.await;
        }

        timeout(limit, call).await.unwrap_or_else(|_| {
            Err(SourceError::Unavailable(format!(
                "{} timed out after {}s",
                operation,
                limit.as_secs_f64()
            )))
        })
    }
}

fn advance(item_id: &str, stage: &mut ItemStage, next: ItemStage) {
    debug_assert!(!stage.is_terminal(), "item {} advanced past {}", item_id, stage);
    debug!(item_id, from = %stage, to = %next, "Item stage");
    *stage = next;
}
