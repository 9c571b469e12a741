//! Project workspace reconciliation core for the data workspace extension.
//!
//! Tracks which project files are known, reconciles them against the folders
//! open in the host workspace, and serves the result as a tree and as
//! command targets.

pub mod commands;
pub mod extension;
pub mod host;
pub mod util;
pub mod workspace;

pub use commands::{Command, CommandError, CommandOutcome, CommandSurface};
pub use extension::{activate, Extension, Subscription};
pub use host::{FileProbe, FolderMutator, FolderSource, ScratchStore, WorkspaceFolderRef};
pub use workspace::{
    HostServices, ProjectEntry, ProjectStore, ReconciliationResult, TreeNode, WorkspaceConfig,
    WorkspaceError, WorkspaceNotice, WorkspaceService,
};
