use referral_core::paths::PSYCHREF_DIR;
use std::path::{Path, PathBuf};

/// Resolve the working root.
///
/// Priority:
/// 1. `--root` flag / `PSYCHREF_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.psychref/`
/// 3. Fall back to `cwd`, where the cache file and letters land by default
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_marked_ancestor(&cwd).unwrap_or(cwd)
}

fn find_marked_ancestor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PSYCHREF_DIR).is_dir())
        .map(Path::to_path_buf)
}
