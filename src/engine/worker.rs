// Batch runner: drives the compressor over a task, one file at a time

use std::path::{Path, PathBuf};

use super::compressor::Compressor;
use super::events::{EventSender, ProgressEvent};
use super::{CompressError, Task};

/// Scratch files removed around each encode by default
pub const DEFAULT_SCRATCH_FILES: &[&str] = &["pre_temp.mp4"];

/// Outcome of one batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files attempted
    pub count: usize,
    pub succeeded: usize,
    /// Failed files with the failure message
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the files of a task sequentially, isolating per-file failures
pub struct BatchRunner {
    compressor: Compressor,
    events: EventSender,
    scratch_files: Vec<PathBuf>,
}

impl BatchRunner {
    pub fn new(compressor: Compressor, events: EventSender) -> Self {
        Self {
            compressor,
            events,
            scratch_files: DEFAULT_SCRATCH_FILES.iter().map(PathBuf::from).collect(),
        }
    }

    pub fn with_scratch_files(mut self, scratch_files: Vec<PathBuf>) -> Self {
        self.scratch_files = scratch_files;
        self
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Process every file of `task` in order.
    ///
    /// Emits `Start`, one `TotalProgress` per file and `Finished`, or a single
    /// `Error` when the task is empty. A failing file produces an `Error`
    /// event and the loop moves on.
    pub fn process_task(&self, task: &Task) -> BatchSummary {
        let count = task.files_num();
        if count == 0 {
            tracing::warn!("task {} has no files", task.id);
            self.events.send(ProgressEvent::Error {
                title: "Error".to_string(),
                detail: "no video files found".to_string(),
            });
            return BatchSummary::default();
        }

        tracing::info!(
            "task {}: {} file(s) with profile '{}'",
            task.id,
            count,
            task.profile_name
        );
        self.events.send(ProgressEvent::Start { count });

        let mut summary = BatchSummary {
            count,
            ..BatchSummary::default()
        };

        for (index, file) in task.files.iter().enumerate() {
            self.events.send(ProgressEvent::TotalProgress {
                index,
                count,
                current_file: file.source_path().to_path_buf(),
            });

            self.clean_scratch_files();
            let result = self.compressor.process_single_file(
                file,
                &task.profile_name,
                task.delete_audio,
                task.delete_source,
            );
            self.clean_scratch_files();

            match result {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    let detail = failure_detail(file.source_path(), &e);
                    tracing::error!("{}", detail);
                    self.events.send(ProgressEvent::Error {
                        title: "Error".to_string(),
                        detail: detail.clone(),
                    });
                    summary
                        .failures
                        .push((file.source_path().to_path_buf(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "task {} finished: {} of {} succeeded",
            task.id,
            summary.succeeded,
            count
        );
        self.events.send(ProgressEvent::Finished { count });
        summary
    }

    fn clean_scratch_files(&self) {
        for path in &self.scratch_files {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}

fn failure_detail(path: &Path, error: &CompressError) -> String {
    format!("failed to process {}: {}", path.display(), error)
}
