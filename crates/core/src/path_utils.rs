//! Path utilities for MirrorWatch
//!
//! Handles tilde expansion and resolution of configured directories.

use std::path::{Path, PathBuf};

const ROOT_ENV: &str = "MIRRORWATCH_ROOT";
const DEFAULT_ROOT_NAME: &str = ".mirrorwatch";

/// Expands a leading tilde (~) to the user's home directory.
/// Examples:
/// "~" -> "/home/alice"
/// "~/inbox" -> "/home/alice/inbox"
/// "/tmp/foo" -> "/tmp/foo" (no change)
pub fn expand_tilde(path: &str) -> String {
    if path == "~" {
        return home_dir();
    }

    if let Some(rest) = path.strip_prefix("~/") {
        return format!("{}/{}", home_dir(), rest);
    }

    path.to_string()
}

/// Helper to convert a potentially tilde-containing string into a PathBuf.
pub fn get_path(path: &str) -> PathBuf {
    PathBuf::from(expand_tilde(path))
}

/// Resolves the MirrorWatch root using the MIRRORWATCH_ROOT env var.
/// Accepts absolute paths, tilde paths, and bare names (placed under $HOME).
pub fn get_app_root() -> PathBuf {
    let root_name = std::env::var(ROOT_ENV).unwrap_or_else(|_| DEFAULT_ROOT_NAME.to_string());
    root_from(&root_name)
}

fn root_from(root_name: &str) -> PathBuf {
    if root_name.starts_with('/') {
        PathBuf::from(root_name)
    } else if root_name.starts_with('~') {
        get_path(root_name)
    } else {
        PathBuf::from(home_dir()).join(root_name)
    }
}

/// Resolves a configured path: tilde expansion first, then relative paths
/// are anchored at `root`.
pub fn resolve_against(root: &Path, path: &str) -> PathBuf {
    let p = get_path(path);
    if p.is_absolute() { p } else { root.join(p) }
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_untouched() {
        assert_eq!(expand_tilde("/tmp/foo"), "/tmp/foo");
        assert_eq!(expand_tilde("relative/dir"), "relative/dir");
    }

    #[test]
    fn tilde_prefix_expands_to_home() {
        let home = home_dir();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/inbox"), format!("{home}/inbox"));
        // only a leading tilde is special
        assert_eq!(expand_tilde("/data/~/x"), "/data/~/x");
    }

    #[test]
    fn relative_config_paths_resolve_under_root() {
        let root = Path::new("/srv/mirrorwatch");
        assert_eq!(resolve_against(root, "inbox"), root.join("inbox"));
        assert_eq!(resolve_against(root, "/var/drop"), PathBuf::from("/var/drop"));
    }

    #[test]
    fn bare_root_names_live_under_home() {
        assert_eq!(root_from("/opt/mw"), PathBuf::from("/opt/mw"));
        assert_eq!(root_from(".mw"), PathBuf::from(home_dir()).join(".mw"));
    }
}
