//! In-memory folder set, used when folders come from the command line and in tests

use async_trait::async_trait;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use super::{FolderChange, FolderMutator, FolderSource, FoldersChanged, HostError, WorkspaceFolderRef};
use crate::util::normalize;

pub struct MemoryFolders {
    folders: RwLock<Vec<WorkspaceFolderRef>>,
    changed_tx: broadcast::Sender<FoldersChanged>,
}

impl MemoryFolders {
    pub fn new<I, P>(folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<std::path::Path>,
    {
        let (changed_tx, _) = broadcast::channel(16);
        Self {
            folders: RwLock::new(folders.into_iter().map(WorkspaceFolderRef::new).collect()),
            changed_tx,
        }
    }

    /// Apply a change and notify subscribers. Returns whether the set changed.
    pub fn apply(&self, change: &FolderChange) -> bool {
        let changed = {
            let mut folders = match self.folders.write() {
                Ok(f) => f,
                Err(poisoned) => poisoned.into_inner(),
            };
            let before = folders.len();
            let removed: Vec<_> = change.remove.iter().map(|p| normalize(p)).collect();
            folders.retain(|f| !removed.contains(&f.path));
            let mut changed = folders.len() != before;

            for path in &change.add {
                let folder = WorkspaceFolderRef::new(path);
                if !folders.contains(&folder) {
                    folders.push(folder);
                    changed = true;
                }
            }
            changed
        };

        if changed {
            debug!(add = change.add.len(), remove = change.remove.len(), "Open folders changed");
            // no receivers is fine
            let _ = self.changed_tx.send(FoldersChanged);
        }
        changed
    }
}

impl FolderSource for MemoryFolders {
    fn list_open_folders(&self) -> Vec<WorkspaceFolderRef> {
        match self.folders.read() {
            Ok(f) => f.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<FoldersChanged> {
        self.changed_tx.subscribe()
    }
}

#[async_trait]
impl FolderMutator for MemoryFolders {
    async fn mutate_open_folders(&self, change: FolderChange) -> Result<(), HostError> {
        self.apply(&change);
        Ok(())
    }
}
