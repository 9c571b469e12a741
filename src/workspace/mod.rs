//! Project workspace model
//!
//! This module provides:
//! - The project record store (committed and temp projects)
//! - Reconciliation of tracked projects against the open folders
//! - The tree projection served to the display layer
//! - Lifecycle operations tying them together

pub mod background;
pub mod config;
pub mod provider;
pub mod reconcile;
pub mod scratch_saver;
pub mod service;
pub mod state;
pub mod tree;

pub use background::BackgroundTask;
pub use config::WorkspaceConfig;
pub use provider::{ProjectType, ProjectTypeRegistry};
pub use reconcile::{reconcile, ReconciliationResult};
pub use service::{
    HostServices, LoadReport, WorkspaceError, WorkspaceEvent, WorkspaceNotice, WorkspaceService,
};
pub use state::{ProjectEntry, ProjectStore, StoreError};
pub use tree::{project, NodeKind, ProjectionInvalidated, TreeDataProvider, TreeNode};
