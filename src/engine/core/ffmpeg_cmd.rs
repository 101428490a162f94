use super::profile::EncodingProfile;
use super::types::VideoFile;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Fixed audio bitrate used when audio is kept
pub const AUDIO_BITRATE: &str = "128k";

/// Audio handling for one encode. Re-encoding and stripping are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Reencode,
    Strip,
}

impl AudioMode {
    pub fn from_delete_audio(delete_audio: bool) -> Self {
        if delete_audio {
            AudioMode::Strip
        } else {
            AudioMode::Reencode
        }
    }
}

/// How to launch the encoder: the ffmpeg binary, optionally behind a launcher
/// such as `nice -n 10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderProgram {
    pub ffmpeg_path: PathBuf,
    #[serde(default)]
    pub launcher: Vec<String>,
}

impl Default for EncoderProgram {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            launcher: Vec::new(),
        }
    }
}

impl EncoderProgram {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            launcher: Vec::new(),
        }
    }

    pub fn with_launcher<I, S>(mut self, launcher: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launcher = launcher.into_iter().map(Into::into).collect();
        self
    }

    /// Base command with the launcher (if any) and the ffmpeg binary in place
    pub fn command(&self) -> Command {
        match self.launcher.split_first() {
            Some((program, rest)) => {
                let mut cmd = Command::new(program);
                cmd.args(rest).arg(&self.ffmpeg_path);
                cmd
            }
            None => Command::new(&self.ffmpeg_path),
        }
    }
}

/// Options the builder already sets. Each matches exactly or with a stream
/// specifier (`-b:a:0`, `-preset:v`).
const RESERVED_OPTIONS: &[&str] = &[
    "-y", "-i", "-hwaccel", "-an", "-c:v", "-c:a", "-codec:v", "-codec:a", "-vcodec", "-acodec",
    "-b:a", "-ab", "-crf", "-preset", "-map",
];

/// Reserved options that take no value
const RESERVED_SWITCHES: &[&str] = &["-y", "-an"];

fn is_reserved(token: &str) -> bool {
    // Bare -c / -codec set every stream, video and audio included
    token == "-c"
        || token == "-codec"
        || RESERVED_OPTIONS.iter().any(|opt| {
            token == *opt
                || token
                    .strip_prefix(opt)
                    .is_some_and(|rest| rest.starts_with(':'))
        })
}

fn split_additional(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    // If shlex fails to parse (unbalanced quotes), fall back to whitespace split
    shlex::split(raw).unwrap_or_else(|| raw.split_whitespace().map(str::to_string).collect())
}

/// Options in `raw` that would duplicate or contradict ones the builder sets
pub fn reserved_options(raw: &str) -> Vec<String> {
    split_additional(raw)
        .into_iter()
        .filter(|token| is_reserved(token))
        .collect()
}

/// Apply additional user-provided ffmpeg arguments.
/// Uses shell-style parsing so quoted strings with spaces are preserved.
/// Reserved options (and their values) are dropped with a warning.
fn additional_args(raw: &str) -> Vec<String> {
    let mut kept = Vec::new();
    let mut tokens = split_additional(raw).into_iter();
    while let Some(token) = tokens.next() {
        if !is_reserved(&token) {
            kept.push(token);
            continue;
        }
        let takes_value = !RESERVED_SWITCHES.iter().any(|s| token == *s);
        match takes_value.then(|| tokens.next()).flatten() {
            Some(value) => tracing::warn!("ignoring additional argument {} {}", token, value),
            None => tracing::warn!("ignoring additional argument {}", token),
        }
    }
    kept
}

/// ffmpeg arguments for compressing one file with libx264
pub fn encode_args(file: &VideoFile, profile: &EncodingProfile, audio: AudioMode) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];

    // -hwaccel is an input option: ffmpeg rejects it after -i
    if profile.hardware_acceleration {
        args.extend(["-hwaccel", "auto"].map(OsString::from));
    }

    args.push("-i".into());
    args.push(file.source_path().into());

    // Video
    args.extend(["-c:v", "libx264"].map(OsString::from));
    args.push("-crf".into());
    args.push(profile.crf.to_string().into());
    args.push("-preset".into());
    args.push(profile.preset.as_str().into());

    // GOP & reference frames
    let keyint = profile.keyint.to_string();
    args.extend(["-keyint_min", keyint.as_str(), "-g", keyint.as_str()].map(OsString::from));
    args.push("-refs".into());
    args.push(profile.refs.to_string().into());
    args.push("-bf".into());
    args.push(profile.bframes.to_string().into());

    // Fixed x264 tuning
    args.extend(
        [
            "-me_method", "umh", "-sc_threshold", "60", "-b_strategy", "1", "-qcomp", "0.5",
            "-psy-rd", "0.3:0", "-aq-mode", "2", "-aq-strength", "0.8",
        ]
        .map(OsString::from),
    );

    // Audio
    match audio {
        AudioMode::Reencode => {
            args.extend(["-c:a", "aac", "-b:a", AUDIO_BITRATE].map(OsString::from));
        }
        AudioMode::Strip => args.push("-an".into()),
    }

    args.extend(["-movflags", "faststart"].map(OsString::from));
    args.extend(additional_args(&profile.additional_args).into_iter().map(OsString::from));

    args.extend(["-map", "0"].map(OsString::from));
    args.push(file.output_path().into());

    args
}

/// Build the full encoder command for one file.
/// Returns the command but does not execute it.
pub fn build_encode_cmd(
    program: &EncoderProgram,
    file: &VideoFile,
    profile: &EncodingProfile,
    audio: AudioMode,
) -> Command {
    let mut cmd = program.command();
    cmd.args(encode_args(file, profile, audio));
    cmd
}

/// Format a command as a shell-safe string for display and logs
pub fn format_cmd(cmd: &Command) -> String {
    let words: Vec<String> = std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect();

    shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
}
