use std::fs;
use std::path::{Path, PathBuf};

pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "avi", "mov", "webm"];

pub enum DirEntryCategory {
    DoesNotExist,
    RegularFile,
    Directory,
    Unknown,
}

/// Follows symlinks, so a link to a video file converts like the file
/// itself; a dangling link classifies as missing.
pub fn classify_file(path: &Path) -> DirEntryCategory {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.is_file() {
                DirEntryCategory::RegularFile
            } else if metadata.is_dir() {
                DirEntryCategory::Directory
            } else {
                DirEntryCategory::Unknown
            }
        },
        Err(_) => DirEntryCategory::DoesNotExist,
    }
}

pub fn is_video_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Recursively walks `root` collecting files with a supported video
/// extension. Unreadable directories are skipped. Sorted for a stable
/// scheduling order.
pub fn collect_video_files(root: &Path) -> Vec<PathBuf> {
    let mut found = vec![];
    let mut dirpaths = vec![PathBuf::from(root)];
    while let Some(current_dir) = dirpaths.pop() {
        match fs::read_dir(&current_dir) {
            Ok(entries) => {
                for entry in entries.filter_map(|e| e.ok()) {
                    if let Ok(ft) = entry.file_type() {
                        if ft.is_file() {
                            let p = entry.path();
                            if is_video_file(&p) {
                                found.push(p);
                            }
                        } else if ft.is_dir() {
                            dirpaths.push(entry.path());
                        }
                    }
                }
            },
            Err(_) => (),
        };
    }
    found.sort();
    found
}

pub fn mp3_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let mut name = PathBuf::from(input.file_stem().unwrap_or(input.as_os_str()));
    name.set_extension("mp3");
    output_dir.join(name)
}
