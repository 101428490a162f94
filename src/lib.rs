//! Batch video compression with ffmpeg and libx264.
//!
//! The [`engine`] turns a [`engine::Task`] into one encoder run per file,
//! reports progress over an event channel and can stop every running
//! encoder from another thread.

pub mod config;
pub mod engine;
