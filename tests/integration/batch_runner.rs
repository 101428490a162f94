// Batch lifecycle events with mixed outcomes
#![cfg(unix)]

use std::fs;
use videoslim::engine::{ProcessRegistry, ProgressEvent, Task, VideoFile};

use crate::common::fake_encoder::{self, FakeEncoder};

fn task_of(encoder: &FakeEncoder, files: &[(&str, &str)]) -> Task {
    let files = files
        .iter()
        .map(|(name, behavior)| VideoFile::with_default_output(encoder.video(name, behavior)).unwrap())
        .collect();
    Task::new(files, "default", false, false)
}

#[test]
fn test_lifecycle_events_with_a_failure_in_the_middle() {
    let encoder = FakeEncoder::new();
    let task = task_of(
        &encoder,
        &[
            ("a.mp4", fake_encoder::SUCCESS),
            ("b.mp4", fake_encoder::FAILURE),
            ("c.mp4", fake_encoder::SUCCESS),
        ],
    );
    let (runner, rx) = encoder.runner(ProcessRegistry::new());

    let summary = runner.process_task(&task);
    assert_eq!(summary.count, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, encoder.path().join("b.mp4"));

    let events = rx.drain();
    assert_eq!(events.first(), Some(&ProgressEvent::Start { count: 3 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Finished { count: 3 }));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Start { .. }))
            .count(),
        1
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Finished { .. }))
            .count(),
        1
    );

    let totals: Vec<(usize, usize, String)> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::TotalProgress {
                index,
                count,
                current_file,
            } => Some((
                *index,
                *count,
                current_file.file_name().unwrap().to_string_lossy().into_owned(),
            )),
            _ => None,
        })
        .collect();
    assert_eq!(
        totals,
        vec![
            (0, 3, "a.mp4".to_string()),
            (1, 3, "b.mp4".to_string()),
            (2, 3, "c.mp4".to_string()),
        ]
    );

    let errors: Vec<&ProgressEvent> = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    if let ProgressEvent::Error { title, detail } = errors[0] {
        assert_eq!(title, "Error");
        assert!(detail.contains("b.mp4"), "detail: {}", detail);
        assert!(detail.contains("code 1"), "detail: {}", detail);
    }

    // The error comes after b's TotalProgress and before c's
    let error_at = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::Error { .. }))
        .unwrap();
    let b_at = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::TotalProgress { index: 1, .. }))
        .unwrap();
    let c_at = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::TotalProgress { index: 2, .. }))
        .unwrap();
    assert!(b_at < error_at && error_at < c_at);
}

#[test]
fn test_all_failures_still_finish() {
    let encoder = FakeEncoder::new();
    let task = task_of(
        &encoder,
        &[
            ("a.mp4", fake_encoder::FAILURE),
            ("b.mp4", fake_encoder::FAILURE),
        ],
    );
    let (runner, rx) = encoder.runner(ProcessRegistry::new());

    let summary = runner.process_task(&task);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed(), 2);

    let events = rx.drain();
    assert_eq!(events.last(), Some(&ProgressEvent::Finished { count: 2 }));
}

#[test]
fn test_scratch_file_removed_around_each_file() {
    let encoder = FakeEncoder::new();
    let scratch = encoder.path().join("pre_temp.mp4");
    fs::write(&scratch, b"leftover").unwrap();

    // The encode leaves a fresh scratch file behind
    let behavior = format!(
        "touch '{}'\n{}",
        scratch.display(),
        fake_encoder::SUCCESS
    );
    let task = task_of(&encoder, &[("a.mp4", behavior.as_str())]);
    let (runner, _rx) = encoder.runner(ProcessRegistry::new());

    let summary = runner.process_task(&task);
    assert_eq!(summary.succeeded, 1);
    assert!(!scratch.exists());
}

#[test]
fn test_task_files_are_not_modified() {
    let encoder = FakeEncoder::new();
    let task = task_of(&encoder, &[("a.mp4", fake_encoder::SUCCESS)]);
    let before = task.files.clone();
    let (runner, _rx) = encoder.runner(ProcessRegistry::new());

    runner.process_task(&task);
    assert_eq!(task.files, before);
}
