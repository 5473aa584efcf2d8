//! Small filesystem and naming helpers shared across tasks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Insert `.min` before the final extension: `style.css` -> `style.min.css`.
///
/// Paths without an extension are returned unchanged.
pub fn min_path(path: &Path) -> PathBuf {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return path.to_path_buf();
    };
    path.with_extension(format!("min.{ext}"))
}

/// Swap the final extension: `glyph.ttf` -> `glyph.woff2`.
pub fn with_ext(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext)
}

/// Write bytes, creating parent directories as needed.
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

/// Read a file into a string with path context on failure.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read a file into bytes with path context on failure.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_path() {
        assert_eq!(
            min_path(Path::new("build/css/style.css")),
            Path::new("build/css/style.min.css")
        );
        assert_eq!(
            min_path(Path::new("build/js/script.js")),
            Path::new("build/js/script.min.js")
        );
        // no extension: unchanged
        assert_eq!(min_path(Path::new("build/LICENSE")), Path::new("build/LICENSE"));
    }

    #[test]
    fn test_with_ext() {
        assert_eq!(
            with_ext(Path::new("fonts/Roboto.ttf"), "woff2"),
            Path::new("fonts/Roboto.woff2")
        );
    }
}
