//! Command surface - the operations the host binds to its command palette
//!
//! Every command is a direct call-through to a workspace operation. Errors
//! carry a stable machine code for host-level messaging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::workspace::{
    ProjectEntry, StoreError, TreeDataProvider, TreeNode, WorkspaceError, WorkspaceService,
};

/// Commands as the host sends them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    NewProject {
        file_path: PathBuf,
        project_type: String,
    },
    OpenExisting {
        file_path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_type: Option<String>,
    },
    Refresh,
    RemoveProject { node: TreeNode },
    ManageProject { node: TreeNode },
    PromoteProject { node: TreeNode },
    AddToWorkspace { file_paths: Vec<PathBuf> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::NewProject { .. } => "projects.new",
            Command::OpenExisting { .. } => "projects.openExisting",
            Command::Refresh => "dataworkspace.refresh",
            Command::RemoveProject { .. } => "projects.removeProject",
            Command::ManageProject { .. } => "projects.manageProject",
            Command::PromoteProject { .. } => "projects.promoteProject",
            Command::AddToWorkspace { .. } => "projects.addToWorkspace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutcome {
    Opened { project: ProjectEntry },
    Refreshed,
    Removed { project: ProjectEntry },
    /// The host opens its dashboard for this project.
    Manage { project: ProjectEntry },
    Promoted { project: ProjectEntry },
    AddedToWorkspace { projects: Vec<ProjectEntry> },
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("No project provider is installed")]
    ProviderUnavailable,
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl CommandError {
    /// Protocol error code
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::ProviderUnavailable => "provider_unavailable",
            CommandError::Workspace(e) => match e {
                WorkspaceError::Store(StoreError::DuplicateProject { .. }) => "duplicate_project",
                WorkspaceError::Store(StoreError::NotFound(_)) => "project_not_found",
                WorkspaceError::UnknownProjectType(_) => "unknown_project_type",
                WorkspaceError::RelativePath(_) => "invalid_path",
                WorkspaceError::NotAProject(_) => "not_a_project",
                WorkspaceError::Host(_) => "host_error",
                WorkspaceError::Persistence(_) => "persistence_error",
            },
        }
    }
}

#[derive(Clone)]
pub struct CommandSurface {
    service: WorkspaceService,
    tree: Arc<TreeDataProvider>,
}

impl CommandSurface {
    pub fn new(service: WorkspaceService, tree: Arc<TreeDataProvider>) -> Self {
        Self { service, tree }
    }

    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, CommandError> {
        let name = command.name();
        let result = match command {
            Command::NewProject {
                file_path,
                project_type,
            } => self.new_project(file_path, &project_type).await,
            Command::OpenExisting {
                file_path,
                project_type,
            } => self.open_existing(file_path, project_type.as_deref()).await,
            Command::Refresh => {
                self.refresh();
                Ok(CommandOutcome::Refreshed)
            }
            Command::RemoveProject { node } => self.remove_project(&node).await,
            Command::ManageProject { node } => self.manage_project(&node).await,
            Command::PromoteProject { node } => self.promote_project(&node).await,
            Command::AddToWorkspace { file_paths } => self.add_to_workspace(&file_paths).await,
        };

        match &result {
            Ok(_) => info!(command = name, "Command completed"),
            Err(e) => warn!(command = name, code = e.code(), error = %e, "Command failed"),
        }
        result
    }

    /// Register a newly created project. Creating the file is the provider's job.
    pub async fn new_project(
        &self,
        file_path: PathBuf,
        project_type: &str,
    ) -> Result<CommandOutcome, CommandError> {
        if !self.service.is_project_provider_available() {
            return Err(CommandError::ProviderUnavailable);
        }
        let project = self
            .service
            .open_existing_or_new(&file_path, Some(project_type))
            .await?;
        Ok(CommandOutcome::Opened { project })
    }

    pub async fn open_existing(
        &self,
        file_path: PathBuf,
        project_type: Option<&str>,
    ) -> Result<CommandOutcome, CommandError> {
        let project = self
            .service
            .open_existing_or_new(&file_path, project_type)
            .await?;
        Ok(CommandOutcome::Opened { project })
    }

    pub fn refresh(&self) {
        self.tree.refresh();
    }

    pub async fn remove_project(&self, node: &TreeNode) -> Result<CommandOutcome, CommandError> {
        let entry = self.service.resolve_node(node).await?;
        let project = self.service.remove_project(&entry.file_path).await?;
        Ok(CommandOutcome::Removed { project })
    }

    pub async fn manage_project(&self, node: &TreeNode) -> Result<CommandOutcome, CommandError> {
        let project = self.service.resolve_node(node).await?;
        Ok(CommandOutcome::Manage { project })
    }

    pub async fn promote_project(&self, node: &TreeNode) -> Result<CommandOutcome, CommandError> {
        let entry = self.service.resolve_node(node).await?;
        let project = self.service.promote_project(&entry.file_path).await?;
        Ok(CommandOutcome::Promoted { project })
    }

    pub async fn add_to_workspace(
        &self,
        file_paths: &[PathBuf],
    ) -> Result<CommandOutcome, CommandError> {
        let projects = self.service.add_projects_to_workspace(file_paths).await?;
        Ok(CommandOutcome::AddedToWorkspace { projects })
    }
}
