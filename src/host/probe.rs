//! Filesystem file probe
//!
//! Walks an open folder looking for files with a registered project extension.
//! Skips the configured ignore directories and stops at MAX_CANDIDATES.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::{FileAccessError, FileProbe, WorkspaceFolderRef};
use crate::util::normalize;
use crate::workspace::config::ScanSection;

/// Maximum number of candidates returned per folder
pub const MAX_CANDIDATES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct FsFileProbe {
    extensions: Vec<String>,
    ignore_dirs: Vec<String>,
    max_depth: usize,
}

impl FsFileProbe {
    pub fn new(extensions: Vec<String>, scan: &ScanSection) -> Self {
        Self {
            extensions,
            ignore_dirs: scan.ignore_dirs.clone(),
            max_depth: scan.max_depth.max(1),
        }
    }

    fn scan_blocking(&self, root: &Path) -> Result<Vec<PathBuf>, FileAccessError> {
        let access_error = |message: String| FileAccessError {
            folder: root.to_path_buf(),
            message,
        };

        // Root failures are reported; failures below the root are skipped.
        let metadata = std::fs::metadata(root).map_err(|e| access_error(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(access_error("not a directory".to_string()));
        }
        std::fs::read_dir(root).map_err(|e| access_error(e.to_string()))?;

        let mut items = Vec::new();
        let walker = WalkDir::new(root)
            .max_depth(self.max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.should_ignore(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_project_file(entry.path()) {
                items.push(normalize(entry.path()));
                if items.len() >= MAX_CANDIDATES {
                    warn!(folder = %root.display(), "Project scan truncated at {} files", MAX_CANDIDATES);
                    break;
                }
            }
        }

        items.sort();
        debug!("Found {} project files under {:?}", items.len(), root);
        Ok(items)
    }

    fn should_ignore(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.ignore_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    fn is_project_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FileProbe for FsFileProbe {
    async fn scan_for_project_files(
        &self,
        folder: &WorkspaceFolderRef,
    ) -> Result<Vec<PathBuf>, FileAccessError> {
        let probe = self.clone();
        let root = folder.path.clone();
        tokio::task::spawn_blocking(move || probe.scan_blocking(&root))
            .await
            .map_err(|e| FileAccessError {
                folder: folder.path.clone(),
                message: format!("Scan task failed: {}", e),
            })?
    }
}
