mod error;
mod ffmpeg_cmd;
mod ffmpeg_info;
mod log;
mod profile;
mod scan;
mod types;

pub use error::{CompressError, ModelError, ServiceError};
pub use ffmpeg_cmd::{
    AUDIO_BITRATE, AudioMode, EncoderProgram, build_encode_cmd, encode_args, format_cmd,
};
pub use ffmpeg_info::{
    ffmpeg_version, hardware_accelerations, has_gpu_acceleration, parse_hwaccels,
};
pub use log::init_file_logging;
pub use profile::{BuiltinProfiles, EncodingProfile, ProfileCatalog, ProfileStore, SpeedPreset};
pub use scan::{collect_sources, is_video_file, scan_streaming};
pub use types::{
    FileReport, OUTPUT_SUFFIX, ParsedLine, ProgressParser, Task, VideoFile, derive_output_path,
    parse_clock,
};
