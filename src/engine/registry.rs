// Registry of live encoder processes, used to stop everything at once

use std::collections::HashMap;
use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default grace period after a terminate request
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default grace period after a hard kill
pub const KILL_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A process the registry can stop
pub trait TrackedProcess: Send + Sync {
    /// Identity within the registry
    fn handle_id(&self) -> u64;

    /// OS process id, for logs
    fn pid(&self) -> u32;

    /// Non-blocking exit check
    fn has_exited(&self) -> io::Result<bool>;

    /// Ask the process to exit cleanly
    fn terminate(&self) -> io::Result<()>;

    /// Force the process to exit
    fn kill(&self) -> io::Result<()>;
}

/// Shared handle to a spawned encoder.
///
/// Every wait or signal goes through the inner mutex, so a signal is never
/// delivered to a pid that has already been reaped.
#[derive(Debug)]
pub struct ChildProcess {
    id: u64,
    pid: u32,
    leads_group: bool,
    child: Mutex<Child>,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            pid: child.id(),
            leads_group: false,
            child: Mutex::new(child),
        }
    }

    /// Handle for a child spawned as the leader of its own process group
    /// (`process_group(0)`). Signals go to the whole group, so helpers the
    /// child started stop with it.
    pub fn group_leader(child: Child) -> Self {
        Self {
            leads_group: true,
            ..Self::new(child)
        }
    }

    #[cfg(unix)]
    fn signal(&self, child: &mut Child, sig: libc::c_int) -> io::Result<()> {
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        let pid = libc::pid_t::try_from(self.pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        let target = if self.leads_group { -pid } else { pid };
        // SAFETY: the child has not been reaped (checked above under the same
        // lock), so the pid and its group id still belong to it
        let rc = unsafe { libc::kill(target, sig) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        lock(&self.child).try_wait()
    }

    /// Wait for exit without holding the lock across the wait, so a
    /// concurrent stop can still signal the process
    pub fn wait(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(status);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TrackedProcess for ChildProcess {
    fn handle_id(&self) -> u64 {
        self.id
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    fn has_exited(&self) -> io::Result<bool> {
        Ok(self.try_wait()?.is_some())
    }

    #[cfg(unix)]
    fn terminate(&self) -> io::Result<()> {
        let mut child = lock(&self.child);
        self.signal(&mut child, libc::SIGTERM)
    }

    #[cfg(not(unix))]
    fn terminate(&self) -> io::Result<()> {
        // No graceful signal outside Unix
        self.kill()
    }

    #[cfg(unix)]
    fn kill(&self) -> io::Result<()> {
        let mut child = lock(&self.child);
        self.signal(&mut child, libc::SIGKILL)
    }

    #[cfg(not(unix))]
    fn kill(&self) -> io::Result<()> {
        let mut child = lock(&self.child);
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.kill()
    }
}

/// Result of a `stop_all` call
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Handles present in the snapshot
    pub requested: usize,
    /// Exited after the terminate request (or were already gone)
    pub terminated: usize,
    /// Needed a hard kill
    pub killed: usize,
    /// Still not confirmed dead when we gave up
    pub unconfirmed: usize,
}

/// Set of live encoder processes.
///
/// Cloning is cheap and every clone sees the same set. All mutation goes
/// through one mutex.
#[derive(Clone)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<HashMap<u64, Arc<dyn TrackedProcess>>>>,
    terminate_timeout: Duration,
    kill_timeout: Duration,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("live", &self.len())
            .field("terminate_timeout", &self.terminate_timeout)
            .field("kill_timeout", &self.kill_timeout)
            .finish()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::with_timeouts(TERMINATE_TIMEOUT, KILL_TIMEOUT)
    }

    pub fn with_timeouts(terminate_timeout: Duration, kill_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            terminate_timeout,
            kill_timeout,
        }
    }

    pub fn register(&self, process: Arc<dyn TrackedProcess>) {
        tracing::debug!(
            "registered encoder pid {} (handle {})",
            process.pid(),
            process.handle_id()
        );
        lock(&self.entries).insert(process.handle_id(), process);
    }

    /// Remove a handle. Removing an unknown handle is a no-op.
    pub fn deregister(&self, handle_id: u64) {
        if lock(&self.entries).remove(&handle_id).is_some() {
            tracing::debug!("deregistered encoder handle {}", handle_id);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while any encoder is registered
    pub fn is_processing(&self) -> bool {
        !self.is_empty()
    }

    /// Copy of the current handles, taken under the lock
    pub fn snapshot(&self) -> Vec<Arc<dyn TrackedProcess>> {
        lock(&self.entries).values().cloned().collect()
    }

    /// Stop every process registered at the time of the call.
    ///
    /// Each process gets a terminate request and `terminate_timeout` to exit,
    /// then a hard kill and `kill_timeout`. Processes that survive both are
    /// logged. The registry is cleared at the end, confirmed or not, including
    /// handles registered while the stop was running.
    pub fn stop_all(&self) -> StopReport {
        let processes = self.snapshot();
        let mut report = StopReport {
            requested: processes.len(),
            ..StopReport::default()
        };

        if processes.is_empty() {
            return report;
        }

        tracing::info!("stopping {} encoder process(es)", processes.len());

        for process in &processes {
            match self.stop_one(process.as_ref()) {
                StopOutcome::Terminated => report.terminated += 1,
                StopOutcome::Killed => report.killed += 1,
                StopOutcome::Unconfirmed => report.unconfirmed += 1,
            }
        }

        let late = {
            let mut entries = lock(&self.entries);
            let late = entries
                .keys()
                .filter(|id| !processes.iter().any(|p| p.handle_id() == **id))
                .count();
            entries.clear();
            late
        };
        if late > 0 {
            tracing::warn!(
                "dropped {} encoder handle(s) registered during stop",
                late
            );
        }

        tracing::info!(
            "encoder processes stopped: {} terminated, {} killed, {} unconfirmed",
            report.terminated,
            report.killed,
            report.unconfirmed
        );
        report
    }

    fn stop_one(&self, process: &dyn TrackedProcess) -> StopOutcome {
        let pid = process.pid();

        tracing::debug!("terminating encoder pid {}", pid);
        if let Err(e) = process.terminate() {
            tracing::warn!("terminate request for pid {} failed: {}", pid, e);
        }
        if wait_for_exit(process, self.terminate_timeout) {
            tracing::debug!("encoder pid {} exited", pid);
            return StopOutcome::Terminated;
        }

        tracing::warn!(
            "encoder pid {} did not exit within {:?}, killing",
            pid,
            self.terminate_timeout
        );
        if let Err(e) = process.kill() {
            tracing::warn!("kill for pid {} failed: {}", pid, e);
        }
        if wait_for_exit(process, self.kill_timeout) {
            return StopOutcome::Killed;
        }

        tracing::error!(
            "encoder pid {} could not be confirmed dead after kill",
            pid
        );
        StopOutcome::Unconfirmed
    }
}

enum StopOutcome {
    Terminated,
    Killed,
    Unconfirmed,
}

/// Poll until the process exits or the timeout passes
fn wait_for_exit(process: &dyn TrackedProcess, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match process.has_exited() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("wait on pid {} failed: {}", process.pid(), e);
                return false;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
