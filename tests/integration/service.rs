// CompressionService entry points
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;
use videoslim::config::Config;
use videoslim::engine::{
    BuiltinProfiles, CompressionService, ProgressEvent, Task, VideoFile,
};

use crate::common::fake_encoder::{self, FakeEncoder, wait_until};

fn config_for(encoder: &FakeEncoder) -> Config {
    let mut config = Config::default();
    config.encoder.ffmpeg_path = encoder.script.clone();
    config.encoder.launcher = vec!["/bin/sh".to_string()];
    config.progress.throttle_ms = 0;
    config.cancellation.terminate_timeout_secs = 2;
    config.cancellation.kill_timeout_secs = 1;
    config.cleanup.scratch_files = vec![encoder.path().join("pre_temp.mp4")];
    config
}

#[test]
fn test_stop_all_fails_current_file_and_batch_continues() {
    let encoder = FakeEncoder::new();
    let (service, rx) = CompressionService::new(&config_for(&encoder), Arc::new(BuiltinProfiles));
    let service = Arc::new(service);

    let files = vec![
        VideoFile::with_default_output(encoder.video("hang.mp4", fake_encoder::HANGS)).unwrap(),
        VideoFile::with_default_output(encoder.video("ok.mp4", fake_encoder::SUCCESS)).unwrap(),
    ];
    let handle = service.spawn_task(Task::new(files, "default", false, false));

    assert!(wait_until(Duration::from_secs(5), || service.is_processing()));
    let report = service.stop_all();
    assert_eq!(report.requested, 1);

    let summary = handle.join().unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, encoder.path().join("hang.mp4"));
    assert!(!service.is_processing());

    let events = rx.drain();
    assert_eq!(events.first(), Some(&ProgressEvent::Start { count: 2 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Finished { count: 2 }));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::TotalProgress { index: 1, .. }
    )));
}

#[test]
fn test_run_task_blocks_until_done() {
    let encoder = FakeEncoder::new();
    let (service, rx) = CompressionService::new(&config_for(&encoder), Arc::new(BuiltinProfiles));

    let task = Task::from_sources(
        vec![encoder.video("a.mp4", fake_encoder::SUCCESS)],
        "fast",
        true,
        false,
    );
    let summary = service.run_task(&task);

    assert_eq!(summary.succeeded, 1);
    assert!(encoder.path().join("a_x264.mp4").exists());
    assert!(
        rx.drain()
            .iter()
            .any(|e| matches!(e, ProgressEvent::CurrentProgress { .. }))
    );
}

#[test]
fn test_bounded_channel_config() {
    let encoder = FakeEncoder::new();
    let mut config = config_for(&encoder);
    config.progress.channel_capacity = Some(4);
    let (service, rx) = CompressionService::new(&config, Arc::new(BuiltinProfiles));

    // Progress lines far outnumber the channel capacity; nobody drains meanwhile
    let burst = r#"echo "  Duration: 00:01:00.00, start: 0.0"
i=0
while [ $i -lt 30 ]; do
    printf 'frame=%d time=00:00:%02d.00 bitrate=1\n' $i $i
    i=$((i + 1))
done
touch "$out"
"#;
    let task = Task::from_sources(vec![encoder.video("a.mp4", burst)], "default", false, false);

    let worker = std::thread::spawn(move || service.run_task(&task));

    // Lifecycle events block for room, so keep receiving until Finished
    let mut events = Vec::new();
    while let Some(event) = rx.recv() {
        let done = matches!(event, ProgressEvent::Finished { .. });
        events.push(event);
        if done {
            break;
        }
    }
    let summary = worker.join().unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(events.first(), Some(&ProgressEvent::Start { count: 1 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Finished { count: 1 }));
}
