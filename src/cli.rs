use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use videoslim::engine::SpeedPreset;

#[derive(Parser)]
#[command(name = "videoslim")]
#[command(about = "Batch x264 video compressor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress files and directories
    Run(RunArgs),

    /// Show ffmpeg commands without executing (dry run)
    DryRun(RunArgs),

    /// List available profiles
    Profiles,

    /// Save a profile to the profiles directory
    SaveProfile(SaveProfileArgs),

    /// Check if ffmpeg is installed and which hardware decoders it offers
    CheckFfmpeg,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Video files or directories to compress
    #[arg(value_name = "PATHS", required = true)]
    pub paths: Vec<PathBuf>,

    /// Profile name (defaults to the config's default profile)
    #[arg(long)]
    pub profile: Option<String>,

    /// Strip audio instead of re-encoding it
    #[arg(long)]
    pub delete_audio: bool,

    /// Delete each source once its output exists
    #[arg(long)]
    pub delete_source: bool,

    /// Scan directories recursively
    #[arg(long)]
    pub recurse: bool,

    /// Override the profile's CRF
    #[arg(long)]
    pub crf: Option<f64>,

    /// Override the profile's x264 preset
    #[arg(long)]
    pub preset: Option<SpeedPreset>,

    /// Enable hardware decoding (overrides profile)
    #[arg(long, conflicts_with = "no_hwaccel")]
    pub hwaccel: bool,

    /// Disable hardware decoding (overrides profile)
    #[arg(long, conflicts_with = "hwaccel")]
    pub no_hwaccel: bool,
}

impl RunArgs {
    /// Hardware flag override, if any was given
    pub fn hwaccel_override(&self) -> Option<bool> {
        if self.hwaccel {
            Some(true)
        } else if self.no_hwaccel {
            Some(false)
        } else {
            None
        }
    }

    pub fn has_profile_overrides(&self) -> bool {
        self.crf.is_some() || self.preset.is_some() || self.hwaccel_override().is_some()
    }
}

#[derive(Args)]
pub struct SaveProfileArgs {
    /// Profile name
    pub name: String,

    #[arg(long, default_value_t = 23.5)]
    pub crf: f64,

    #[arg(long, default_value_t = SpeedPreset::Slow)]
    pub preset: SpeedPreset,

    /// Keyframe interval (also the minimum)
    #[arg(long, default_value_t = 600)]
    pub keyint: u32,

    #[arg(long, default_value_t = 4)]
    pub refs: u32,

    #[arg(long, default_value_t = 3)]
    pub bframes: u32,

    /// Enable `-hwaccel auto`
    #[arg(long)]
    pub hwaccel: bool,

    /// Extra ffmpeg arguments, shell-quoted
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub additional_args: String,
}

pub fn parse() -> Cli {
    Cli::parse()
}
