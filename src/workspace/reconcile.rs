//! Workspace reconciliation - compare tracked projects with the open folders
//!
//! Detection only: nothing here mutates the store. Callers decide whether to
//! prompt, add folders, or register discovered projects.

use futures::future::join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::host::{FileAccessError, FileProbe, WorkspaceFolderRef};
use crate::util::{contains_file, normalize};
use crate::workspace::state::ProjectEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Committed entries not under any open folder, in store order.
    pub orphaned: Vec<ProjectEntry>,
    /// Project files found in open folders that the store does not track.
    pub missing_from_store: Vec<PathBuf>,
    /// Folders the probe could not read.
    pub folder_errors: Vec<FileAccessError>,
}

impl ReconciliationResult {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.missing_from_store.is_empty() && self.folder_errors.is_empty()
    }
}

/// Normalized, de-duplicated folder paths in their original order.
pub fn folder_paths(folders: &[WorkspaceFolderRef]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    folders
        .iter()
        .map(|f| normalize(&f.path))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Committed entries whose directory is not equal to or nested under a folder.
pub fn find_orphans(entries: &[ProjectEntry], folders: &[WorkspaceFolderRef]) -> Vec<ProjectEntry> {
    let folders = folder_paths(folders);
    entries
        .iter()
        .filter(|e| !e.is_temp)
        .filter(|e| !folders.iter().any(|f| contains_file(f, &e.file_path)))
        .cloned()
        .collect()
}

/// Reconcile a store snapshot against the open folders.
///
/// Every folder is scanned, concurrently. A folder whose scan fails lands in
/// `folder_errors` and the others are still reported.
pub async fn reconcile(
    entries: &[ProjectEntry],
    folders: &[WorkspaceFolderRef],
    probe: &dyn FileProbe,
) -> ReconciliationResult {
    let orphaned = find_orphans(entries, folders);

    let known: HashSet<PathBuf> = entries.iter().map(|e| normalize(&e.file_path)).collect();
    let refs: Vec<WorkspaceFolderRef> = folder_paths(folders)
        .into_iter()
        .map(|path| WorkspaceFolderRef { path })
        .collect();
    let scans = join_all(refs.iter().map(|folder| probe.scan_for_project_files(folder))).await;

    let mut missing_from_store = Vec::new();
    let mut seen = HashSet::new();
    let mut folder_errors = Vec::new();
    for (folder, scan) in refs.iter().zip(scans) {
        match scan {
            Ok(candidates) => {
                for candidate in candidates {
                    let candidate = normalize(&candidate);
                    if !known.contains(&candidate) && seen.insert(candidate.clone()) {
                        missing_from_store.push(candidate);
                    }
                }
            }
            Err(e) => {
                warn!(folder = %folder.path.display(), error = %e, "Folder scan failed");
                folder_errors.push(e);
            }
        }
    }

    debug!(
        folders = refs.len(),
        orphaned = orphaned.len(),
        missing = missing_from_store.len(),
        errors = folder_errors.len(),
        "Reconciliation complete"
    );

    ReconciliationResult {
        orphaned,
        missing_from_store,
        folder_errors,
    }
}
