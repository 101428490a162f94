// Process-wide compression service: the two entry points callers use

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crate::config::Config;

use super::compressor::Compressor;
use super::events::{self, EventReceiver};
use super::registry::{ProcessRegistry, StopReport};
use super::worker::{BatchRunner, BatchSummary};
use super::{
    AudioMode, CompressError, EncoderProgram, ProfileStore, ServiceError, Task, VideoFile,
    build_encode_cmd, format_cmd,
};

static SERVICE: OnceLock<CompressionService> = OnceLock::new();

/// Owns the registry, the profile store and the event sender.
///
/// Build one with [`CompressionService::new`], keep the returned receiver
/// for the consumer, and either use the service directly or
/// [`install`](CompressionService::install) it process-wide.
pub struct CompressionService {
    runner: BatchRunner,
    registry: ProcessRegistry,
    profiles: Arc<dyn ProfileStore>,
    program: EncoderProgram,
}

impl CompressionService {
    pub fn new(config: &Config, profiles: Arc<dyn ProfileStore>) -> (Self, EventReceiver) {
        let (tx, rx) = match config.progress.channel_capacity {
            Some(capacity) => events::bounded(capacity),
            None => events::channel(),
        };

        let registry = ProcessRegistry::with_timeouts(
            config.cancellation.terminate_timeout(),
            config.cancellation.kill_timeout(),
        );
        let program = config.encoder.program();

        let compressor = Compressor::new(
            program.clone(),
            Arc::clone(&profiles),
            registry.clone(),
            tx.clone(),
        )
        .with_progress_interval(config.progress.throttle());
        let runner =
            BatchRunner::new(compressor, tx).with_scratch_files(config.cleanup.scratch_files.clone());

        let service = Self {
            runner,
            registry,
            profiles,
            program,
        };
        (service, rx)
    }

    /// Place the service in the process-wide slot.
    ///
    /// Fails if a service is already installed; the rejected service is dropped.
    pub fn install(self) -> Result<&'static CompressionService, ServiceError> {
        let mut installed_now = false;
        let service = SERVICE.get_or_init(|| {
            installed_now = true;
            self
        });
        if installed_now {
            tracing::debug!("compression service installed");
            Ok(service)
        } else {
            Err(ServiceError::AlreadyInstalled)
        }
    }

    /// The installed service, if any
    pub fn global() -> Option<&'static CompressionService> {
        SERVICE.get()
    }

    /// Run a task to completion on the calling thread
    pub fn run_task(&self, task: &Task) -> BatchSummary {
        self.runner.process_task(task)
    }

    /// Run a task on a dedicated worker thread
    pub fn spawn_task(self: &Arc<Self>, task: Task) -> JoinHandle<BatchSummary> {
        let service = Arc::clone(self);
        thread::spawn(move || service.run_task(&task))
    }

    /// Stop every running encoder. Safe to call from any thread.
    pub fn stop_all(&self) -> StopReport {
        self.registry.stop_all()
    }

    pub fn is_processing(&self) -> bool {
        self.registry.is_processing()
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn program(&self) -> &EncoderProgram {
        &self.program
    }

    /// The command line that would be run for `file`, without running it
    pub fn preview_command(
        &self,
        file: &VideoFile,
        profile_name: &str,
        delete_audio: bool,
    ) -> Result<String, CompressError> {
        let profile =
            self.profiles
                .get(profile_name)
                .ok_or_else(|| CompressError::ProfileNotFound {
                    name: profile_name.to_string(),
                })?;
        let cmd = build_encode_cmd(
            &self.program,
            file,
            &profile,
            AudioMode::from_delete_audio(delete_audio),
        );
        Ok(format_cmd(&cmd))
    }
}
