//! Lexical path helpers shared by the store, reconciler and projection.

use std::path::{Component, Path, PathBuf};

/// Normalize a path without touching the filesystem.
///
/// Resolves `.` and `..` components and drops trailing separators. A `..`
/// that would climb above the root is discarded.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when the directory of `file_path` is `folder` or nested under it.
///
/// Both arguments are expected to be normalized. Comparison is per component,
/// so `/ws2/a.proj` is not contained in `/ws`.
pub fn contains_file(folder: &Path, file_path: &Path) -> bool {
    match file_path.parent() {
        Some(dir) => dir.starts_with(folder),
        None => false,
    }
}
