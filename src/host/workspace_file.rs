//! Workspace file folder source
//!
//! Reads the open folder list from a JSON workspace file
//! (`{ "folders": [{ "path": "..." }] }`), writes it back on mutation, and
//! optionally watches it with a 500ms debounce so external edits raise
//! `FoldersChanged`.

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{FolderChange, FolderMutator, FolderSource, FoldersChanged, HostError, WorkspaceFolderRef};
use crate::util::normalize;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WorkspaceFileContent {
    #[serde(default)]
    folders: Vec<FolderEntry>,
    /// Unknown top-level keys are kept so rewriting the file does not drop them.
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FolderEntry {
    path: PathBuf,
}

struct Inner {
    path: PathBuf,
    content: RwLock<WorkspaceFileContent>,
    changed_tx: broadcast::Sender<FoldersChanged>,
}

#[derive(Clone)]
pub struct WorkspaceFile {
    inner: Arc<Inner>,
}

/// Keeps the watcher alive. Dropping it stops watching.
pub struct WatchHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl WorkspaceFile {
    /// Open a workspace file. A missing file is an empty workspace.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = normalize(path.as_ref());
        let content = read_content(&path)?;
        let (changed_tx, _) = broadcast::channel(16);
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                content: RwLock::new(content),
                changed_tx,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Re-read the file and notify subscribers if the folder list changed.
    pub fn reload(&self) -> Result<bool, HostError> {
        let fresh = read_content(&self.inner.path)?;
        let before = self.list_open_folders();
        {
            let mut content = self.write_content();
            *content = fresh;
        }
        let changed = before != self.list_open_folders();
        if changed {
            info!(path = %self.inner.path.display(), "Workspace file folders changed");
            let _ = self.inner.changed_tx.send(FoldersChanged);
        }
        Ok(changed)
    }

    /// Watch the workspace file for external edits.
    pub fn watch(&self) -> Result<WatchHandle, HostError> {
        let dir = self
            .inner
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(500), tx)
            .map_err(|e| HostError::WatchError(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| HostError::WatchError(e.to_string()))?;

        let this = self.clone();
        std::thread::spawn(move || this.event_loop(rx));

        info!(path = %self.inner.path.display(), "Watching workspace file");
        Ok(WatchHandle {
            _debouncer: debouncer,
        })
    }

    fn event_loop(
        &self,
        rx: std::sync::mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    ) {
        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    if events.iter().any(|e| normalize(&e.path) == self.inner.path) {
                        if let Err(e) = self.reload() {
                            warn!("Failed to reload workspace file: {}", e);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {}", e);
                }
                Err(_) => {
                    // debouncer dropped
                    debug!("Workspace file watch channel closed, exiting event loop");
                    break;
                }
            }
        }
    }

    fn write_content(&self) -> std::sync::RwLockWriteGuard<'_, WorkspaceFileContent> {
        match self.inner.content.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn base_dir(&self) -> &Path {
        self.inner.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.base_dir().join(path))
        }
    }
}

fn read_content(path: &Path) -> Result<WorkspaceFileContent, HostError> {
    if !path.exists() {
        return Ok(WorkspaceFileContent::default());
    }
    let content =
        std::fs::read_to_string(path).map_err(|e| HostError::ReadError(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| HostError::ParseError(e.to_string()))
}

impl FolderSource for WorkspaceFile {
    fn list_open_folders(&self) -> Vec<WorkspaceFolderRef> {
        let content = match self.inner.content.read() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut folders: Vec<WorkspaceFolderRef> = Vec::with_capacity(content.folders.len());
        for entry in &content.folders {
            let folder = WorkspaceFolderRef {
                path: self.resolve(&entry.path),
            };
            if !folders.contains(&folder) {
                folders.push(folder);
            }
        }
        folders
    }

    fn subscribe(&self) -> broadcast::Receiver<FoldersChanged> {
        self.inner.changed_tx.subscribe()
    }
}

#[async_trait]
impl FolderMutator for WorkspaceFile {
    async fn mutate_open_folders(&self, change: FolderChange) -> Result<(), HostError> {
        if change.is_empty() {
            return Ok(());
        }

        let snapshot = {
            let mut content = self.write_content();
            let removed: Vec<PathBuf> = change.remove.iter().map(|p| self.resolve(p)).collect();
            content
                .folders
                .retain(|f| !removed.contains(&self.resolve(&f.path)));
            for path in &change.add {
                let resolved = self.resolve(path);
                if !content.folders.iter().any(|f| self.resolve(&f.path) == resolved) {
                    content.folders.push(FolderEntry { path: resolved });
                }
            }
            content.clone()
        };

        let path = self.inner.path.clone();
        tokio::task::spawn_blocking(move || {
            let json = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| HostError::WriteError(e.to_string()))?;
            std::fs::write(&path, json).map_err(|e| HostError::WriteError(e.to_string()))
        })
        .await
        .map_err(|e| HostError::WriteError(format!("Write task failed: {}", e)))??;

        info!(
            add = change.add.len(),
            remove = change.remove.len(),
            "Workspace file folders updated"
        );
        let _ = self.inner.changed_tx.send(FoldersChanged);
        Ok(())
    }
}
