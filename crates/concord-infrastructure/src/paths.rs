//! Unified path management for Concord data files.

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for Concord.
///
/// # Directory Structure
///
/// ```text
/// ~/.concord/
/// ├── sessions/                # One TOML file per session
/// └── attachments/
///     └── <session-id>/        # Metadata TOML + raw bytes per attachment
/// ```
pub struct ConcordPaths;

impl ConcordPaths {
    /// Returns the Concord data directory (`~/.concord`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::home_dir()
            .map(|home| home.join(".concord"))
            .ok_or(PathError::HomeDirNotFound)
    }
}
