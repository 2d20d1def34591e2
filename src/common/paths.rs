//! Configuration paths and feature file discovery

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "steptree";

/// File extensions recognized as feature files
const FEATURE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/steptree/`
/// - macOS: `~/Library/Application Support/steptree/`
/// - Windows: `%APPDATA%\steptree\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Whether a path looks like a feature file
pub fn is_feature_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FEATURE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Collect feature files below `path`
///
/// A file is returned as-is (whatever its extension, since the caller asked
/// for it explicitly). Directories are walked recursively and only feature
/// files are kept. The result is sorted so discovery order is stable.
pub fn collect_feature_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(files);
    }
    walk_dir(path, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else if is_feature_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}
