use std::path::{Path, PathBuf};

use warmup_core::paths;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `WARMUP_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `warmup.yaml`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_config_dir(&cwd).unwrap_or(cwd)
}

fn find_config_dir(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if paths::config_path(&dir).is_file() {
            return Some(dir);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}

/// `--config` wins; relative paths are taken from the root.
pub fn resolve_config(root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => paths::resolve(root, p),
        None => paths::config_path(root),
    }
}
