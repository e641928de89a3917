//! End-to-end Integration Tests
//!
//! Full runs over a scripted source: output tree, catalog, reports and the
//! archived progress file.

mod common;

use std::sync::Arc;

use chanscribe::domain::{
    EngagementStats, ErrorKind, ExtractError, FailureRecord, Item, RecordStatus, VideoMetadata,
};
use chanscribe::library::{Catalog, CATALOG_FILE_NAME};
use common::{run, run_with_sink, settings, FailingSink, ScriptedSource};
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn test_three_items_two_batches_one_failure() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["item1", "item2", "item3"]).failing("item2"));

    let summary = tokio_test::assert_ok!(run(source.clone(), temp.path(), &settings(2)).await);

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    // Catalog: 2 success rows, 1 failure row
    let catalog = Catalog::read_csv(&temp.path().join(CATALOG_FILE_NAME)).unwrap();
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.with_status(RecordStatus::Success).len(), 2);
    assert_eq!(catalog.with_status(RecordStatus::Failed).len(), 1);
    assert_eq!(catalog.get("item2").unwrap().status, RecordStatus::Failed);

    // Progress state as committed after the last batch
    let state = &summary.state;
    assert_eq!(
        state.completed.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["item1", "item3"]
    );
    assert_eq!(
        state.failed.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["item2"]
    );
    assert_eq!(state.last_completed_batch, Some(1));

    // The archived file holds the same state
    let archived = summary.archived_progress.clone().unwrap();
    let file: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(archived).unwrap()).unwrap();
    assert_eq!(file["state"]["last_completed_batch"], 1);
    assert_eq!(file["state"]["failed"][0], "item2");

    // Transcript files only for successes
    let dir = temp.path().join("Berachos").join("Shiurim");
    assert!(dir.join("Berachos_shiur_item1_item1.txt").exists());
    assert!(dir.join("Berachos_shiur_item3_item3.txt").exists());
    assert!(!dir.join("Berachos_shiur_item2_item2.txt").exists());

    // Failure report
    let failures: Vec<FailureRecord> = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("failed_items.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_id, "item2");

    let report = std::fs::read_to_string(temp.path().join("extraction_summary.txt")).unwrap();
    assert!(report.contains("Successful extractions: 2"));
    assert!(report.contains("Berachos shiur item2 (item2)"));
}

#[tokio::test]
async fn test_enumeration_failure_aborts_run() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["a"]).fail_enumeration());

    let err = run(source.clone(), temp.path(), &settings(2)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ExtractError>(),
        Some(ExtractError::Enumeration(_))
    ));
    assert!(source.attempted().is_empty());
    assert!(!temp.path().join("extraction_progress.json").exists());
    assert!(!temp.path().join(CATALOG_FILE_NAME).exists());
}

#[tokio::test]
async fn test_empty_channel_aborts_run() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&[]));

    let err = run(source, temp.path(), &settings(2)).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ExtractError>().map(|e| e.kind()),
        Some(ErrorKind::Enumeration)
    );
}

#[tokio::test]
async fn test_persistence_failure_fails_only_that_item() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["ok1", "broken", "ok2"]));
    let sink = Arc::new(FailingSink::new(temp.path(), &["broken"]));

    let summary = run_with_sink(source.clone(), sink, temp.path(), &settings(10))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].item_id, "broken");
    assert_eq!(summary.failures[0].error_kind, ErrorKind::Persistence);
    assert!(summary.failures[0].error.contains("disk full"));
    // Persistence is not retried
    assert_eq!(source.attempts("broken"), 1);
}

#[tokio::test]
async fn test_metadata_failure_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["a", "b"]).fail_metadata());

    let summary = run(source.clone(), temp.path(), &settings(10)).await.unwrap();

    assert_eq!(source.metadata_calls(), 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.records[0].title, "Berachos shiur a");
}

#[tokio::test]
async fn test_metadata_enrichment_reaches_catalog() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(
        ScriptedSource::from_items(vec![Item::new("v1", "Untitled upload")]).with_metadata(
            "v1",
            VideoMetadata {
                title: "Sukkah Daf Yomi 20".to_string(),
                duration: Some("PT42M7S".to_string()),
                stats: EngagementStats {
                    view_count: 310,
                    like_count: 12,
                    comment_count: 3,
                },
                ..Default::default()
            },
        ),
    );

    let summary = run(source, temp.path(), &settings(10)).await.unwrap();
    let record = &summary.records[0];

    assert_eq!(record.title, "Sukkah Daf Yomi 20");
    assert_eq!(record.duration.as_deref(), Some("PT42M7S"));
    assert_eq!(record.view_count, 310);
    assert_eq!(record.category, "Sukkah");
    assert_eq!(record.subcategory, "Daf_Yomi");
    assert!(record
        .output_path
        .as_deref()
        .unwrap()
        .ends_with("Sukkah_Daf_Yomi_20_v1.txt"));

    let written = std::fs::read_to_string(record.output_path.as_deref().unwrap()).unwrap();
    assert!(written.starts_with("Title: Sukkah Daf Yomi 20\nVideo ID: v1\n"));
    assert!(written.contains("STRUCTURED TRANSCRIPT DATA (JSON)"));
}

#[tokio::test]
async fn test_max_items_caps_enumeration() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(&["a", "b", "c", "d"]));

    let mut capped = settings(10);
    capped.max_items = Some(2);
    let summary = run(source.clone(), temp.path(), &capped).await.unwrap();

    assert_eq!(summary.total_items, 2);
    assert_eq!(source.attempted(), vec!["a", "b"]);
}
