//! End-to-end tests for submitting images and polling their status.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{ConfigBuilder, TestHarness};
use imgprobe::{
    AnalyzerOutcome, ArtifactKind, Narrowing, ResultKey, ResultStatus, TaskError, TaskOutcome,
    TaskState,
};

const FINISH: Duration = Duration::from_secs(20);

#[tokio::test]
async fn test_task_ids_are_unique() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir).build();
    let dispatcher = harness.dispatcher(&config);
    let image = harness.write_gray_png("a.png", 2, 2, 100);

    let handles: Vec<_> = (0..25).map(|_| dispatcher.submit(image.clone())).collect();
    let ids: HashSet<String> = handles.iter().map(|h| h.id().to_string()).collect();
    assert_eq!(ids.len(), 25);

    for handle in handles {
        assert!(handle.wait().await.unwrap().is_done());
    }
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir).build();
    let dispatcher = harness.dispatcher(&config);

    assert_eq!(
        dispatcher.reporter().status("no-such-task"),
        Err(TaskError::NotFound("no-such-task".to_string()))
    );
}

#[tokio::test]
async fn test_fresh_task_is_not_done() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .analyzer("slow", "sh", &["-c", "sleep 1", "sh"], &[ArtifactKind::Original])
        .build();
    let dispatcher = harness.dispatcher(&config);

    let handle = dispatcher.submit(harness.write_gray_png("fresh.png", 2, 2, 100));
    let task = dispatcher.reporter().status(handle.id()).unwrap();
    assert!(!task.is_done());
    assert!(task.analyzer_results().is_empty());
    assert!(task.derived_paths().is_empty());

    // Mid-flight the analyzer slot is visible but not yet filled
    let reporter = dispatcher.reporter();
    let id = handle.id().to_string();
    TestHarness::poll_until_terminal(&reporter, &id, FINISH, |task| {
        if let Some(slot) = task.result(&ResultKey::new("slow", ArtifactKind::Original)) {
            if !task.is_terminal() {
                assert_eq!(slot.status, ResultStatus::Pending);
                assert!(slot.text.is_none());
            }
        }
    })
    .await;
    assert!(handle.wait().await.unwrap().is_done());
}

#[tokio::test]
async fn test_done_is_never_seen_with_pending_results() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .analyzer("cat", "cat", &[], &[ArtifactKind::Original, ArtifactKind::Brightness])
        .analyzer("slow", "sh", &["-c", "sleep 0.3; echo ok", "sh"], &[ArtifactKind::Gamma])
        .build();
    let dispatcher = harness.dispatcher(&config);
    let reporter = dispatcher.reporter();

    let handle = dispatcher.submit(harness.write_gray_png("watch.png", 3, 3, 50));
    let id = handle.id().to_string();

    let task = TestHarness::poll_until_terminal(&reporter, &id, FINISH, |task| {
        if task.is_done() {
            assert_eq!(task.pending_results(), 0, "done with pending results");
        }
    })
    .await;

    assert!(task.is_done());
    assert_eq!(task.state(), TaskState::Done);
    assert_eq!(task.analyzer_results().len(), 3);
    assert_eq!(task.derived_paths().len(), 4);

    // Stays done on every later read
    for _ in 0..5 {
        assert!(reporter.status(&id).unwrap().is_done());
    }
}

#[tokio::test]
async fn test_missing_analyzer_is_recorded_and_task_completes() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .analyzer("cat", "cat", &[], &[ArtifactKind::Original])
        .analyzer(
            "phantom",
            "imgprobe-test-phantom-binary",
            &[],
            &[ArtifactKind::Original, ArtifactKind::Brightness],
        )
        .analyzer("false", "false", &[], &[ArtifactKind::Original])
        .build();
    let dispatcher = harness.dispatcher(&config);

    let handle = dispatcher.submit(harness.write_gray_png("m.png", 2, 2, 100));
    let id = handle.id().to_string();
    assert_eq!(handle.wait().await.unwrap(), TaskOutcome::Done);

    let task = dispatcher.reporter().status(&id).unwrap();
    assert!(task.is_done());
    assert_eq!(task.analyzer_results().len(), 4);

    for artifact in [ArtifactKind::Original, ArtifactKind::Brightness] {
        let phantom = task.result(&ResultKey::new("phantom", artifact)).unwrap();
        assert!(phantom
            .text
            .as_deref()
            .unwrap()
            .starts_with("Error (phantom)"));
        assert!(matches!(
            phantom.outcome,
            Some(AnalyzerOutcome::NotFound { .. })
        ));
    }

    let failing = task
        .result(&ResultKey::new("false", ArtifactKind::Original))
        .unwrap();
    assert_eq!(failing.text.as_deref(), Some("Error (false): exit status 1"));

    let cat = task
        .result(&ResultKey::new("cat", ArtifactKind::Original))
        .unwrap();
    assert!(cat.outcome.as_ref().unwrap().is_success());
}

#[tokio::test]
async fn test_corrupt_image_fails_while_valid_image_completes() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .analyzer("cat", "cat", &[], &[ArtifactKind::Original])
        .build();
    let dispatcher = harness.dispatcher(&config);

    let corrupt = dispatcher.submit(harness.write_corrupt("broken.png"));
    let valid = dispatcher.submit(harness.write_gray_png("ok.png", 8, 8, 120));
    let corrupt_id = corrupt.id().to_string();
    let valid_id = valid.id().to_string();

    let (corrupt_outcome, valid_outcome) = tokio::join!(corrupt.wait(), valid.wait());
    assert!(matches!(
        corrupt_outcome.unwrap(),
        TaskOutcome::Failed { .. }
    ));
    assert_eq!(valid_outcome.unwrap(), TaskOutcome::Done);

    let reporter = dispatcher.reporter();
    let failed = reporter.status(&corrupt_id).unwrap();
    assert_eq!(failed.state(), TaskState::Failed);
    assert!(!failed.is_done());
    assert!(failed.failure().unwrap().contains("decod"));
    assert!(failed.derived_paths().is_empty());

    let done = reporter.status(&valid_id).unwrap();
    assert!(done.is_done());
    assert_eq!(done.derived_paths().len(), 4);
}

#[tokio::test]
async fn test_artifacts_are_named_by_task_and_suffix() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir).jpeg().build();
    let dispatcher = harness.dispatcher(&config);

    let handle = dispatcher.submit(harness.write_gray_png("named.png", 4, 4, 90));
    let id = handle.id().to_string();
    handle.wait().await.unwrap();

    let task = dispatcher.reporter().status(&id).unwrap();
    let names: Vec<String> = task
        .derived_paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            format!("{}_brightness.jpg", id),
            format!("{}_contrast.jpg", id),
            format!("{}_gamma.jpg", id),
            format!("{}_color.jpg", id),
        ]
    );
    for path in task.derived_paths() {
        assert!(path.starts_with(&harness.artifact_dir));
        let decoded = image::open(path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }
}

#[tokio::test]
async fn test_narrowing_modes_on_persisted_artifacts() {
    for (narrowing, expected) in [(Narrowing::Wrapping, 244u8), (Narrowing::Saturating, 255u8)] {
        let harness = TestHarness::new();
        let config = ConfigBuilder::new(&harness.artifact_dir)
            .narrowing(narrowing)
            .build();
        let dispatcher = harness.dispatcher(&config);

        let handle = dispatcher.submit(harness.write_gray_png("bright.png", 2, 2, 200));
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let path = harness.artifact_dir.join(format!("{}_brightness.png", id));
        let pixel = image::open(&path).unwrap().to_rgba8().get_pixel(0, 0).0;
        assert_eq!(pixel, [expected, expected, expected, 255]);
    }
}

#[tokio::test]
async fn test_task_timeout_and_cancel_end_failed() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .analyzer("sleepy", "sh", &["-c", "sleep 10", "sh"], &[ArtifactKind::Original])
        .task_timeout_secs(1)
        .build();
    let dispatcher = harness.dispatcher(&config);

    let timed = dispatcher.submit(harness.write_gray_png("t.png", 2, 2, 1));
    let cancelled = dispatcher.submit(harness.write_gray_png("c.png", 2, 2, 1));
    let timed_id = timed.id().to_string();
    let cancelled_id = cancelled.id().to_string();

    cancelled.cancel();
    assert_eq!(
        cancelled.wait().await.unwrap(),
        TaskOutcome::Failed {
            reason: "cancelled".to_string()
        }
    );
    assert_eq!(
        timed.wait().await.unwrap(),
        TaskOutcome::Failed {
            reason: "timed out after 1s".to_string()
        }
    );

    let reporter = dispatcher.reporter();
    for id in [&timed_id, &cancelled_id] {
        let task = reporter.status(id).unwrap();
        assert_eq!(task.state(), TaskState::Failed);
        assert!(!task.is_done());
    }
}

#[tokio::test]
async fn test_finished_tasks_are_pruned() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .max_concurrent_tasks(1)
        .max_finished_tasks(2)
        .finished_task_grace_secs(0)
        .build();
    let dispatcher = harness.dispatcher(&config);
    let image = harness.write_gray_png("p.png", 2, 2, 10);

    let mut ids = Vec::new();
    for _ in 0..4 {
        let handle = dispatcher.submit(image.clone());
        ids.push(handle.id().to_string());
        handle.wait().await.unwrap();
    }

    // The fourth submit evicted the oldest; nothing is evicted on completion
    assert_eq!(dispatcher.store().len(), 3);
    let reporter = dispatcher.reporter();
    assert!(reporter.status(&ids[0]).is_err());
    for id in &ids[1..] {
        assert!(reporter.status(id).unwrap().is_done());
    }
}

#[tokio::test]
async fn test_grace_period_keeps_finished_tasks_readable() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new(&harness.artifact_dir)
        .max_concurrent_tasks(1)
        .max_finished_tasks(1)
        .build();
    let dispatcher = harness.dispatcher(&config);
    let image = harness.write_gray_png("g.png", 2, 2, 10);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let handle = dispatcher.submit(image.clone());
        ids.push(handle.id().to_string());
        handle.wait().await.unwrap();
    }

    let reporter = dispatcher.reporter();
    for id in &ids {
        assert!(reporter.status(id).unwrap().is_done());
    }
}
