//! Path resolution for file tools

use std::path::{Path, PathBuf};

use taskpilot_config::paths::expand_tilde;

/// Resolve a tool-supplied path.
///
/// `~/` expands to the home directory, absolute paths are kept, and
/// relative paths are joined onto `root` (the directory the agent was
/// started in), never the directory the binary lives in.
pub fn resolve_path(path: &str, root: &Path) -> PathBuf {
    let expanded = expand_tilde(path.trim());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}
