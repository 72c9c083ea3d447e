//! C source file reader.
//!
//! Only `.c` and `.h` files are accepted. Invalid UTF-8 is replaced
//! rather than rejected, since vendor headers are often Latin-1.

use std::path::Path;

use creview_core::{Result, ReviewError};

const SUPPORTED_EXTENSIONS: &[&str] = &["c", "h"];

fn check_path(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(ReviewError::FileNotFound(path.to_path_buf()));
    }
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    if !supported {
        return Err(ReviewError::UnsupportedExtension(path.to_path_buf()));
    }
    Ok(())
}

/// Read a whole source file as text.
pub fn read_source(path: &Path) -> Result<String> {
    check_path(path)?;
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    tracing::info!(
        path = %path.display(),
        lines = text.lines().count(),
        "loaded source file"
    );
    Ok(text)
}

/// Read a source file as lines, without line terminators.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(read_source(path)?.lines().map(str::to_string).collect())
}
