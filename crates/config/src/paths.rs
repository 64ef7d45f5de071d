//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.taskpilot), falling back to a relative directory
/// when no home directory can be located
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".taskpilot"))
        .unwrap_or_else(|| PathBuf::from(".taskpilot"))
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
