use super::ffmpeg_cmd::EncoderProgram;
use anyhow::{Context, Result};

/// Hardware acceleration methods that indicate a usable GPU
const GPU_METHODS: &[&str] = &[
    "cuda",
    "qsv",
    "d3d11va",
    "dxva2",
    "opencl",
    "vulkan",
    "videotoolbox",
    "vaapi",
];

/// Check if ffmpeg is available and return its version
pub fn ffmpeg_version(program: &EncoderProgram) -> Result<String> {
    let output = program
        .command()
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is ffmpeg installed and in PATH?",
                program.ffmpeg_path.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!("ffmpeg command failed with status: {}", output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// List the hardware acceleration methods ffmpeg was built with
pub fn hardware_accelerations(program: &EncoderProgram) -> Result<Vec<String>> {
    let output = program
        .command()
        .arg("-hide_banner")
        .arg("-hwaccels")
        .output()
        .context("Failed to execute ffmpeg -hwaccels")?;

    if !output.status.success() {
        anyhow::bail!("ffmpeg -hwaccels failed with status: {}", output.status);
    }

    Ok(parse_hwaccels(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `ffmpeg -hwaccels` output (header line followed by one method per line)
pub fn parse_hwaccels(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Whether any listed method is a GPU decoder worth enabling `-hwaccel auto` for
pub fn has_gpu_acceleration(methods: &[String]) -> bool {
    methods
        .iter()
        .any(|m| GPU_METHODS.contains(&m.as_str()))
}
