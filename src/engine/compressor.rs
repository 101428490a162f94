// Single-file compression: spawn the encoder, follow its output, finalize

use std::io::{self, BufRead, BufReader, Read};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::events::{EventSender, ProgressEvent};
use super::registry::{ChildProcess, ProcessRegistry, TrackedProcess};
use super::{
    AudioMode, CompressError, EncoderProgram, FileReport, ParsedLine, ProfileStore,
    ProgressParser, VideoFile, build_encode_cmd, format_cmd,
};

/// Default minimum gap between two progress events for one file
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// How often the read loop checks whether the encoder has exited
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Output still buffered after the encoder exits is read for at most this long
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Rate limit for progress events, measured from encoder spawn
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Instant,
}

impl ProgressThrottle {
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            last: started,
        }
    }

    /// True (and resets the window) when more than `interval` has passed
    /// since the last accepted tick
    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Call `on_line` for each line of `reader`, splitting on `\n` and `\r`.
///
/// Bytes are decoded as lossy UTF-8. Empty segments (the `\n` of a `\r\n`)
/// are skipped; a trailing partial line is delivered at end-of-stream.
pub fn for_each_line<R, F>(reader: R, mut on_line: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let chunk = match reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if chunk.is_empty() {
            break;
        }

        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    on_line(&String::from_utf8_lossy(&pending));
                    pending.clear();
                }
            } else {
                pending.push(byte);
            }
        }

        let consumed = chunk.len();
        reader.consume(consumed);
    }

    if !pending.is_empty() {
        on_line(&String::from_utf8_lossy(&pending));
    }
    Ok(())
}

/// Encodes one file at a time with the external encoder
pub struct Compressor {
    program: EncoderProgram,
    profiles: Arc<dyn ProfileStore>,
    registry: ProcessRegistry,
    events: EventSender,
    progress_interval: Duration,
}

impl Compressor {
    pub fn new(
        program: EncoderProgram,
        profiles: Arc<dyn ProfileStore>,
        registry: ProcessRegistry,
        events: EventSender,
    ) -> Self {
        Self {
            program,
            profiles,
            registry,
            events,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Compress `file` with the named profile.
    ///
    /// Blocks until the encoder exits, then reads leftover output for at most
    /// `OUTPUT_DRAIN_TIMEOUT`. A concurrent `stop_all` on the shared registry
    /// ends the encoder, which surfaces here as `EncodeFailed`.
    pub fn process_single_file(
        &self,
        file: &VideoFile,
        profile_name: &str,
        delete_audio: bool,
        delete_source: bool,
    ) -> Result<FileReport, CompressError> {
        let started = Instant::now();

        let profile =
            self.profiles
                .get(profile_name)
                .ok_or_else(|| CompressError::ProfileNotFound {
                    name: profile_name.to_string(),
                })?;

        let mut cmd = build_encode_cmd(
            &self.program,
            file,
            &profile,
            AudioMode::from_delete_audio(delete_audio),
        );
        let command = format_cmd(&cmd);
        tracing::info!(
            "compressing {} -> {}",
            file.source_path().display(),
            file.output_path().display()
        );
        tracing::debug!("encoder command: {}", command);

        // stdout and stderr share one pipe so the reader sees them interleaved
        let (output, writer) = io::pipe()?;
        cmd.stdin(Stdio::null());
        cmd.stdout(writer.try_clone()?);
        cmd.stderr(writer);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        // The reader ends on end-of-stream, which a descendant holding the
        // pipe can postpone past the encoder's exit
        let (line_tx, lines) = mpsc::channel::<String>();
        let reader = thread::Builder::new()
            .name("encoder-output".to_string())
            .spawn(move || {
                for_each_line(output, |line| {
                    let _ = line_tx.send(line.to_string());
                })
            })?;

        let child = cmd.spawn().map_err(|source| CompressError::Spawn {
            command: command.clone(),
            source,
        })?;
        // Release our copies of the write end, or the reader never sees EOF
        drop(cmd);

        #[cfg(unix)]
        let process = Arc::new(ChildProcess::group_leader(child));
        #[cfg(not(unix))]
        let process = Arc::new(ChildProcess::new(child));
        self.registry.register(process.clone());

        let spawned = Instant::now();
        let mut parser = ProgressParser::new();
        let mut throttle = ProgressThrottle::new(self.progress_interval, spawned);
        let source = file.source_path();

        let mut on_line = |line: &str| match parser.parse_line(line) {
            ParsedLine::Duration(total) => {
                tracing::debug!("source duration: {:.2}s", total);
            }
            ParsedLine::Progress(position) => {
                if let Some(total) = parser.known_total() {
                    if throttle.ready(Instant::now()) {
                        self.events.send(ProgressEvent::CurrentProgress {
                            file: source.to_path_buf(),
                            current_seconds: position,
                            total_seconds: total,
                        });
                    }
                }
            }
            ParsedLine::Malformed(reason) => {
                tracing::warn!("{}: {}", source.display(), reason);
            }
            ParsedLine::Other => tracing::debug!("{}", line),
            ParsedLine::Ignored | ParsedLine::Blank => {}
        };

        let status = loop {
            match lines.recv_timeout(EXIT_POLL_INTERVAL) {
                Ok(line) => on_line(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break process.wait(),
            }
            match process.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
        };
        self.registry.deregister(process.handle_id());

        let drain_until = Instant::now() + OUTPUT_DRAIN_TIMEOUT;
        let mut output_closed = false;
        loop {
            let left = drain_until.saturating_duration_since(Instant::now());
            match lines.recv_timeout(left) {
                Ok(line) => on_line(&line),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(
                        "encoder output for {} still open after exit, not waiting for it",
                        source.display()
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    output_closed = true;
                    break;
                }
            }
        }

        // A reader still blocked on an inherited pipe is left to finish alone
        let read_result = if output_closed {
            reader
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("encoder output reader panicked")))
        } else {
            Ok(())
        };

        read_result?;
        let status = status?;

        if !status.success() {
            return Err(CompressError::EncodeFailed {
                exit_code: status.code(),
                command,
            });
        }

        let source_deleted = delete_source && remove_source(file);

        let elapsed = started.elapsed();
        tracing::info!(
            "finished {} in {:.2}s",
            file.source_path().display(),
            elapsed.as_secs_f64()
        );

        Ok(FileReport {
            source_path: file.source_path().to_path_buf(),
            output_path: file.output_path().to_path_buf(),
            total_s: parser.total_s,
            position_s: parser.current_s,
            elapsed,
            source_deleted,
        })
    }
}

/// Delete the source once its output exists. Failure is only logged.
fn remove_source(file: &VideoFile) -> bool {
    if !file.output_path().exists() {
        tracing::warn!(
            "output {} missing, keeping source {}",
            file.output_path().display(),
            file.source_path().display()
        );
        return false;
    }

    match std::fs::remove_file(file.source_path()) {
        Ok(()) => {
            tracing::info!("deleted source {}", file.source_path().display());
            true
        }
        Err(e) => {
            tracing::warn!(
                "failed to delete source {}: {}",
                file.source_path().display(),
                e
            );
            false
        }
    }
}
