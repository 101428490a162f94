use super::types::OUTPUT_SUFFIX;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Video file extensions accepted as sources
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi"];

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Whether a file looks like output from a previous run
fn is_previous_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with(OUTPUT_SUFFIX))
}

/// Scan a directory for video files and invoke a callback for each file found
pub fn scan_streaming<F>(root: &Path, recurse: bool, mut on_file: F)
where
    F: FnMut(PathBuf),
{
    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(if recurse { usize::MAX } else { 1 })
        .sort_by_file_name();

    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && is_video_file(path) && !is_previous_output(path) {
            on_file(path.to_path_buf());
        }
    }
}

/// Expand a list of dropped/selected paths into source video files.
///
/// Files are kept as given (if they are videos), directories are scanned.
/// Order is preserved and duplicates are dropped.
pub fn collect_sources(paths: &[PathBuf], recurse: bool) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    let mut push = |path: PathBuf| {
        if seen.insert(path.clone()) {
            sources.push(path);
        }
    };

    for path in paths {
        if path.is_dir() {
            scan_streaming(path, recurse, &mut push);
        } else if is_video_file(path) {
            push(path.clone());
        } else {
            tracing::debug!("ignoring non-video path {}", path.display());
        }
    }

    sources
}
