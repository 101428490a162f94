// Compression engine - independent of any front end

pub mod compressor;
pub mod core;
pub mod events;
pub mod registry;
pub mod service;
pub mod worker;

pub use compressor::{Compressor, ProgressThrottle};
pub use self::core::*;
pub use events::{EventReceiver, EventSender, ProgressEvent};
pub use registry::{ProcessRegistry, StopReport, TrackedProcess};
pub use service::CompressionService;
pub use worker::{BatchRunner, BatchSummary};
