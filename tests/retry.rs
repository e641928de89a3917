//! Retry Integration Tests
//!
//! Tests for transcript retry, backoff timing and pacing. The clock is paused
//! so waits complete instantly while still being measurable.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chanscribe::domain::{ErrorKind, RecordStatus, TranscriptKind, TranscriptTrack};
use common::{run, settings, ScriptedSource};
use tempfile::TempDir;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_records_failure() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["bad"]).failing("bad"));

    let summary = run(source.clone(), temp.path(), &settings(10)).await.unwrap();

    assert_eq!(source.attempts("bad"), 3);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.records[0].status, RecordStatus::Failed);
    assert!(summary.records[0].output_path.is_none());
    assert_eq!(summary.failures[0].error_kind, ErrorKind::TranscriptUnavailable);
    assert!(summary.failures[0].error.contains("captions for bad"));
    assert!(summary.state.failed.contains("bad"));
    assert!(!summary.state.completed.contains("bad"));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_count_follows_max_retries() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["bad"]).failing("bad"));

    let mut five = settings(10);
    five.max_retries = 5;
    run(source.clone(), temp.path(), &five).await.unwrap();

    assert_eq!(source.attempts("bad"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_between_attempts_only() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["bad"]).failing("bad"));

    let start = Instant::now();
    run(source.clone(), temp.path(), &settings(10)).await.unwrap();
    let elapsed = start.elapsed();

    // 2^0 + 2^1 seconds, nothing after the final attempt
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(7), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["flaky"]).flaky("flaky", 2));

    let summary = run(source.clone(), temp.path(), &settings(10)).await.unwrap();

    assert_eq!(source.attempts("flaky"), 3);
    assert_eq!(summary.succeeded, 1);
    assert!(summary.failures.is_empty());
    assert!(summary.state.completed.contains("flaky"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_transcript_is_a_failure() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["blank"]).empty_transcript("blank"));

    let summary = run(source.clone(), temp.path(), &settings(10)).await.unwrap();

    assert_eq!(source.attempts("blank"), 3);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].error.contains("empty"));
}

#[tokio::test(start_paused = true)]
async fn test_language_priority_and_fallback() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(
        ScriptedSource::new(&["multi", "german"])
            .with_tracks(
                "multi",
                vec![
                    TranscriptTrack::new("de", false),
                    TranscriptTrack::new("he", true),
                ],
            )
            .with_tracks("german", vec![TranscriptTrack::new("de", false)]),
    );

    let summary = run(source.clone(), temp.path(), &settings(10)).await.unwrap();
    assert_eq!(summary.succeeded, 2);

    let multi = &summary.records[0];
    assert_eq!(multi.language.as_deref(), Some("he"));
    assert_eq!(multi.transcript_type, Some(TranscriptKind::AutoGenerated));

    // Not in the priority list, taken through the fallback
    assert_eq!(summary.records[1].language.as_deref(), Some("de"));
}

#[tokio::test(start_paused = true)]
async fn test_no_fallback_fails_without_preferred_language() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(
        ScriptedSource::new(&["german"]).with_tracks("german", vec![TranscriptTrack::new("de", false)]),
    );

    let mut strict = settings(10);
    strict.fallback_to_any_language = false;
    let summary = run(source.clone(), temp.path(), &strict).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].error.contains("no transcript in en"));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_and_batch_pause() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["a", "b", "c"]));

    let mut paced = settings(2);
    paced.rate_limit_seconds = 1.0;
    paced.batch_pause_seconds = 10.0;

    let start = Instant::now();
    let summary = run(source.clone(), temp.path(), &paced).await.unwrap();
    let elapsed = start.elapsed();

    // Three item delays plus one pause between the two batches
    assert_eq!(summary.succeeded, 3);
    assert!(elapsed >= Duration::from_secs(13), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(23), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_remote_calls_time_out() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(
        ScriptedSource::new(&["slow_meta", "stuck", "fine"])
            .stall_metadata("slow_meta")
            .stall_transcripts("stuck"),
    );

    let mut bounded = settings(2);
    bounded.request_timeout_seconds = 5.0;

    let summary = tokio::time::timeout(
        Duration::from_secs(24 * 3600),
        run(source.clone(), temp.path(), &bounded),
    )
    .await
    .expect("run should finish despite stalled calls")
    .unwrap();

    // A stalled metadata fetch degrades the item but does not fail it
    assert_eq!(source.metadata_calls(), 3);
    assert_eq!(summary.succeeded, 2);
    assert!(summary.state.completed.contains("slow_meta"));

    // A stalled transcript listing goes through the normal retry path
    assert_eq!(source.attempts("stuck"), 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].item_id, "stuck");
    assert_eq!(summary.failures[0].error_kind, ErrorKind::TranscriptUnavailable);
    assert!(summary.failures[0]
        .error
        .contains("transcript listing timed out after 5s"));

    // Both batches committed and the run finalized
    assert_eq!(summary.state.last_completed_batch, Some(1));
    assert!(summary.archived_progress.is_some());
}
