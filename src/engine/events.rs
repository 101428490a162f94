// Progress events flowing from the engine to whoever is watching

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::time::Duration;

/// Message from the engine to a consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// A batch with `count` files is starting
    Start { count: usize },

    /// The file at zero-based `index` is about to be processed
    TotalProgress {
        index: usize,
        count: usize,
        current_file: PathBuf,
    },

    /// Throttled position update for the file being encoded
    CurrentProgress {
        file: PathBuf,
        current_seconds: f64,
        total_seconds: f64,
    },

    /// Something went wrong; for per-file failures the batch keeps going
    Error { title: String, detail: String },

    /// The batch loop is done. Does not imply that any file succeeded.
    Finished { count: usize },
}

impl ProgressEvent {
    /// Whether the event may be dropped under back-pressure
    pub fn is_droppable(&self) -> bool {
        matches!(self, ProgressEvent::CurrentProgress { .. })
    }
}

#[derive(Debug, Clone)]
enum Inner {
    Unbounded(Sender<ProgressEvent>),
    Bounded(SyncSender<ProgressEvent>),
}

/// Producer half of the event channel
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: Inner,
}

impl EventSender {
    /// Send an event. Never fails: a gone consumer is only logged.
    ///
    /// On a bounded channel that is full, progress updates are dropped while
    /// lifecycle events wait for room.
    pub fn send(&self, event: ProgressEvent) {
        let result = match &self.inner {
            Inner::Unbounded(tx) => tx.send(event).map_err(|e| e.0),
            Inner::Bounded(tx) if event.is_droppable() => match tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(dropped)) => {
                    tracing::debug!("event channel full, dropping {:?}", dropped);
                    Ok(())
                }
                Err(TrySendError::Disconnected(event)) => Err(event),
            },
            Inner::Bounded(tx) => tx.send(event).map_err(|e| e.0),
        };

        if let Err(event) = result {
            tracing::debug!("no consumer for event {:?}", event);
        }
    }
}

/// Consumer half of the event channel
#[derive(Debug)]
pub struct EventReceiver {
    rx: Receiver<ProgressEvent>,
}

impl EventReceiver {
    /// Non-blocking poll
    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Block until an event arrives; `None` once every sender is gone
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ProgressEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Take everything currently queued without blocking
    pub fn drain(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }
}

/// Create an unbounded event channel
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        EventSender {
            inner: Inner::Unbounded(tx),
        },
        EventReceiver { rx },
    )
}

/// Create a channel holding at most `capacity` undelivered events
pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        EventSender {
            inner: Inner::Bounded(tx),
        },
        EventReceiver { rx },
    )
}
