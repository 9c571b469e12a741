//! Host boundary - the collaborators the workspace core consumes
//!
//! The host (or the CLI) supplies:
//! - the list of open folders and a change feed (`FolderSource`)
//! - a way to add/remove open folders (`FolderMutator`)
//! - project-file discovery inside a folder (`FileProbe`)
//! - the scratch list of temp projects from a prior session (`ScratchStore`)

pub mod folders;
pub mod probe;
pub mod scratch;
pub mod workspace_file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::util::normalize;

pub use folders::MemoryFolders;
pub use probe::FsFileProbe;
pub use scratch::{JsonScratchStore, ScratchRecord};
pub use workspace_file::WorkspaceFile;

/// A folder failed to scan. Recorded per folder; never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot read folder {}: {message}", .folder.display())]
pub struct FileAccessError {
    pub folder: PathBuf,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read scratch list: {0}")]
    ReadError(String),
    #[error("Failed to write scratch list: {0}")]
    WriteError(String),
    #[error("Failed to parse scratch list: {0}")]
    ParseError(String),
    #[error("Invalid scratch entry {}: {reason}", .path.display())]
    InvalidEntry { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to read workspace file: {0}")]
    ReadError(String),
    #[error("Failed to write workspace file: {0}")]
    WriteError(String),
    #[error("Failed to parse workspace file: {0}")]
    ParseError(String),
    #[error("Failed to watch workspace file: {0}")]
    WatchError(String),
}

/// An open workspace folder, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceFolderRef {
    pub path: PathBuf,
}

impl WorkspaceFolderRef {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: normalize(path.as_ref()),
        }
    }
}

/// Signal that the open folder list changed. Receivers re-read the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldersChanged;

/// Folders to add to / remove from the open set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderChange {
    pub add: Vec<PathBuf>,
    pub remove: Vec<PathBuf>,
}

impl FolderChange {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

pub trait FolderSource: Send + Sync {
    fn list_open_folders(&self) -> Vec<WorkspaceFolderRef>;

    /// Register for folder-list changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<FoldersChanged>;
}

#[async_trait]
pub trait FolderMutator: Send + Sync {
    async fn mutate_open_folders(&self, change: FolderChange) -> Result<(), HostError>;
}

#[async_trait]
pub trait FileProbe: Send + Sync {
    /// Candidate project files under `folder`, as absolute paths.
    async fn scan_for_project_files(
        &self,
        folder: &WorkspaceFolderRef,
    ) -> Result<Vec<PathBuf>, FileAccessError>;
}

#[async_trait]
pub trait ScratchStore: Send + Sync {
    async fn load_scratch_project_list(&self) -> Result<Vec<ScratchRecord>, PersistenceError>;

    async fn save_scratch_project_list(
        &self,
        records: Vec<ScratchRecord>,
    ) -> Result<(), PersistenceError>;
}
