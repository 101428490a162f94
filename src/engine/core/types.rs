use super::error::ModelError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Suffix appended to the source stem when deriving an output path
pub const OUTPUT_SUFFIX: &str = "_x264";

/// One source file and where its compressed copy goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    source_path: PathBuf,
    output_path: PathBuf,
}

impl VideoFile {
    /// Create a file entry. Fails if both paths are the same.
    pub fn new(source_path: PathBuf, output_path: PathBuf) -> Result<Self, ModelError> {
        if source_path == output_path {
            return Err(ModelError::SameSourceAndOutput(source_path));
        }
        Ok(Self {
            source_path,
            output_path,
        })
    }

    /// Create a file entry with the default output path next to the source
    pub fn with_default_output(source_path: PathBuf) -> Result<Self, ModelError> {
        let output_path = derive_output_path(&source_path);
        Self::new(source_path, output_path)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Derive output path from a source path
/// Format: <dir>/<stem>_x264.mp4
/// Example: holiday.mkv -> holiday_x264.mp4
pub fn derive_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let filename = format!("{}{}.mp4", stem, OUTPUT_SUFFIX);

    match source.parent() {
        Some(parent) => parent.join(filename),
        None => PathBuf::from(filename),
    }
}

/// A batch of files to compress with one profile.
///
/// Built by the caller and only read by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub files: Vec<VideoFile>,
    pub profile_name: String,
    pub delete_audio: bool,
    pub delete_source: bool,
}

impl Task {
    pub fn new(
        files: Vec<VideoFile>,
        profile_name: impl Into<String>,
        delete_audio: bool,
        delete_source: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            files,
            profile_name: profile_name.into(),
            delete_audio,
            delete_source,
        }
    }

    /// Build a task from source paths using the default output naming.
    /// Sources whose derived output would overwrite themselves are skipped.
    pub fn from_sources(
        sources: Vec<PathBuf>,
        profile_name: impl Into<String>,
        delete_audio: bool,
        delete_source: bool,
    ) -> Self {
        let files = sources
            .into_iter()
            .filter_map(|source| match VideoFile::with_default_output(source) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!("skipping source: {}", e);
                    None
                }
            })
            .collect();
        Self::new(files, profile_name, delete_audio, delete_source)
    }

    pub fn files_num(&self) -> usize {
        self.files.len()
    }
}

/// Outcome of one successfully compressed file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub total_s: Option<f64>,
    pub position_s: f64,
    pub elapsed: Duration,
    pub source_deleted: bool,
}

/// What a single line of encoder output turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// First valid `Duration:` line; total length in seconds
    Duration(f64),
    /// A `time=` progress line; position in seconds
    Progress(f64),
    /// A duration or progress marker whose value could not be read
    Malformed(String),
    /// A repeated `Duration:` line after the total was already known
    Ignored,
    Other,
    Blank,
}

const DURATION_MARKER: &str = "Duration: ";
const TIME_MARKER: &str = "time=";

/// Parser for ffmpeg's human-readable stderr output.
///
/// Only two patterns matter: `Duration: H:MM:SS.cc,` near the start of the
/// stream and `time=H:MM:SS.cc ` on each stats line.
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub total_s: Option<f64>,
    pub current_s: f64,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of encoder output and update state
    pub fn parse_line(&mut self, line: &str) -> ParsedLine {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ParsedLine::Blank;
        }

        if let Some(idx) = trimmed.find(TIME_MARKER) {
            let value = trimmed[idx + TIME_MARKER.len()..]
                .split_whitespace()
                .next()
                .unwrap_or("");
            return match parse_clock(value) {
                Some(seconds) => {
                    self.current_s = seconds;
                    ParsedLine::Progress(seconds)
                }
                None => ParsedLine::Malformed(format!("bad progress time '{}'", value)),
            };
        }

        if let Some(idx) = trimmed.find(DURATION_MARKER) {
            if self.total_s.is_some() {
                return ParsedLine::Ignored;
            }
            let value = trimmed[idx + DURATION_MARKER.len()..]
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            return match parse_clock(value) {
                Some(seconds) => {
                    self.total_s = Some(seconds);
                    ParsedLine::Duration(seconds)
                }
                None => ParsedLine::Malformed(format!("bad duration '{}'", value)),
            };
        }

        ParsedLine::Other
    }

    /// Total duration, only once it is known and nonzero
    pub fn known_total(&self) -> Option<f64> {
        self.total_s.filter(|t| *t > 0.0)
    }

    /// Calculate progress percentage against the known total
    pub fn progress_pct(&self) -> f64 {
        match self.known_total() {
            Some(total) => (self.current_s / total * 100.0).min(100.0),
            None => 0.0,
        }
    }
}

/// Parse an ffmpeg clock value (`H:MM:SS.cc`) into seconds.
///
/// A leading minus (ffmpeg prints small negative times at the start of some
/// streams) clamps to zero.
pub fn parse_clock(value: &str) -> Option<f64> {
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let mut parts = body.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_str = parts.next()?;
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }
    // Reject "inf", "nan" and exponents that f64::parse would accept
    if !seconds_str.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let seconds: f64 = seconds_str.parse().ok()?;
    if seconds >= 60.0 {
        return None;
    }

    if negative {
        return Some(0.0);
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}
