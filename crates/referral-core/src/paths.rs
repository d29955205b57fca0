use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PSYCHREF_DIR: &str = ".psychref";
pub const CONFIG_FILE: &str = ".psychref/config.yaml";

pub const DEFAULT_CACHE_FILE: &str = "SentClientList.txt";
pub const DEFAULT_OUTPUT_DIR: &str = "PDFs";
pub const DEFAULT_LOGO_FILE: &str = "Logo.jpg";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn psychref_dir(root: &Path) -> PathBuf {
    root.join(PSYCHREF_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Join `configured` onto `root` unless it is already absolute.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_absolute_paths() {
        let abs = std::env::temp_dir().join("letters");
        assert_eq!(resolve(Path::new("/project"), &abs), abs);
    }

    #[test]
    fn resolve_joins_relative_paths() {
        assert_eq!(
            resolve(Path::new("/project"), Path::new("PDFs")),
            Path::new("/project").join("PDFs")
        );
    }

    #[test]
    fn config_lives_under_psychref_dir() {
        let root = Path::new("/project");
        assert!(config_path(root).starts_with(psychref_dir(root)));
    }
}
