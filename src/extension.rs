//! Extension activation - wires the workspace core to its host
//!
//! On activation:
//! - temp projects from the previous session are loaded in the background,
//!   followed by the not-in-workspace check (the caller does not wait)
//! - folder-list changes re-run the check
//! - store changes invalidate the tree
//!
//! Every listener is a `Subscription`; `deactivate` drops them all, which
//! aborts their tasks.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::CommandSurface;
use crate::workspace::{
    BackgroundTask, HostServices, TreeDataProvider, WorkspaceConfig, WorkspaceEvent,
    WorkspaceService,
};

/// A registered listener. Dropping it unsubscribes.
pub struct Subscription {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Subscription {
    fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(subscription = self.name, "Unsubscribing");
        self.handle.abort();
    }
}

pub struct Extension {
    pub service: WorkspaceService,
    pub tree: Arc<TreeDataProvider>,
    pub commands: CommandSurface,
    init: BackgroundTask,
    subscriptions: Vec<Subscription>,
}

/// Activate against the given host. Must be called inside a tokio runtime.
pub fn activate(host: HostServices, config: &WorkspaceConfig) -> Extension {
    let service = WorkspaceService::new(host, config);
    let tree = Arc::new(TreeDataProvider::new(service.clone()));
    let commands = CommandSurface::new(service.clone(), tree.clone());

    // not awaited: loading temp projects must not hold up the rest of activation
    let init = {
        let task_service = service.clone();
        service.spawn_background("load_temp_projects", async move {
            task_service.load_temp_projects().await;
            task_service.check_for_projects_not_added_to_workspace().await;
            Ok(())
        })
    };

    let subscriptions = vec![
        watch_folders(service.clone(), tree.clone()),
        watch_projects(service.clone(), tree.clone()),
    ];

    let project_types: Vec<String> = service.project_types().into_iter().map(|t| t.id).collect();
    info!(
        provider_available = service.is_project_provider_available(),
        project_types = ?project_types,
        "Data workspace activated"
    );

    Extension {
        service,
        tree,
        commands,
        init,
        subscriptions,
    }
}

fn watch_folders(service: WorkspaceService, tree: Arc<TreeDataProvider>) -> Subscription {
    let mut rx = service.folder_source().subscribe();
    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(_) => {
                    service.check_for_projects_not_added_to_workspace().await;
                    tree.refresh();
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Folder change events lagged by {} messages", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    Subscription::new("folders_changed", handle)
}

fn watch_projects(service: WorkspaceService, tree: Arc<TreeDataProvider>) -> Subscription {
    let mut rx = service.subscribe();
    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(WorkspaceEvent::ProjectsChanged) => tree.refresh(),
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => tree.refresh(),
                Err(RecvError::Closed) => break,
            }
        }
    });
    Subscription::new("projects_changed", handle)
}

impl Extension {
    /// Wait for the activation-time background work to finish.
    pub async fn wait_for_initialization(&mut self) {
        self.init.join().await;
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_finished()
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Tear down every subscription and stop pending background work.
    pub fn deactivate(mut self) {
        if !self.init.is_finished() {
            debug!(task = self.init.name(), "Aborting unfinished background task");
        }
        self.init.abort();
        let names: Vec<&'static str> = self.subscriptions.iter().map(Subscription::name).collect();
        self.subscriptions.clear();
        info!(subscriptions = ?names, "Data workspace deactivated");
    }
}
