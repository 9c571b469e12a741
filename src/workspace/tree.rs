//! Tree projection - the display model derived from the store
//!
//! Nodes are rebuilt wholesale on every projection. A project node carries the
//! entry's file path as a lookup key; commands resolve it against the store
//! at the time they run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::host::WorkspaceFolderRef;
use crate::util::contains_file;
use crate::workspace::reconcile::folder_paths;
use crate::workspace::service::WorkspaceService;
use crate::workspace::state::ProjectEntry;

pub const UNGROUPED_LABEL: &str = "Ungrouped";
pub const TEMP_GROUP_LABEL: &str = "Unsaved projects";
pub const EMPTY_LABEL: &str = "No projects";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Workspace,
    Project,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub label: String,
    pub kind: NodeKind,
    /// File path of the backing entry, for project nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn workspace(label: String, description: Option<String>, children: Vec<TreeNode>) -> Self {
        Self {
            label,
            kind: NodeKind::Workspace,
            key: None,
            description,
            children,
        }
    }

    fn placeholder(label: &str, children: Vec<TreeNode>) -> Self {
        Self {
            label: label.to_string(),
            kind: NodeKind::Placeholder,
            key: None,
            description: None,
            children,
        }
    }

    fn project(entry: &ProjectEntry) -> Self {
        Self {
            label: entry.label(),
            kind: NodeKind::Project,
            key: Some(entry.file_path.clone()),
            description: Some(entry.project_type.clone()),
            children: Vec::new(),
        }
    }

    /// Depth-first walk over this node and its descendants.
    pub fn walk(&self) -> Vec<&TreeNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

fn folder_label(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.display().to_string())
}

fn project_nodes(mut entries: Vec<&ProjectEntry>) -> Vec<TreeNode> {
    entries.sort_by(|a, b| {
        a.label()
            .to_lowercase()
            .cmp(&b.label().to_lowercase())
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    entries.into_iter().map(TreeNode::project).collect()
}

/// Project the store into display nodes.
///
/// One workspace node per open folder holding committed projects (deepest
/// folder wins for nested folders), then "Ungrouped" for committed projects
/// outside every folder, then the temp group.
pub fn project(entries: &[ProjectEntry], folders: &[WorkspaceFolderRef]) -> Vec<TreeNode> {
    if entries.is_empty() {
        return vec![TreeNode::placeholder(EMPTY_LABEL, Vec::new())];
    }

    let folders = folder_paths(folders);
    let mut groups: Vec<Vec<&ProjectEntry>> = vec![Vec::new(); folders.len()];
    let mut ungrouped = Vec::new();
    let mut temp = Vec::new();

    for entry in entries {
        if entry.is_temp {
            temp.push(entry);
            continue;
        }
        let deepest = folders
            .iter()
            .enumerate()
            .filter(|(_, f)| contains_file(f, &entry.file_path))
            .max_by_key(|(_, f)| f.components().count())
            .map(|(i, _)| i);
        match deepest {
            Some(i) => groups[i].push(entry),
            None => ungrouped.push(entry),
        }
    }

    let mut nodes = Vec::new();
    for (folder, children) in folders.iter().zip(groups) {
        if !children.is_empty() {
            nodes.push(TreeNode::workspace(
                folder_label(folder),
                Some(folder.display().to_string()),
                project_nodes(children),
            ));
        }
    }
    if !ungrouped.is_empty() {
        nodes.push(TreeNode::workspace(
            UNGROUPED_LABEL.to_string(),
            None,
            project_nodes(ungrouped),
        ));
    }
    if !temp.is_empty() {
        nodes.push(TreeNode::placeholder(TEMP_GROUP_LABEL, project_nodes(temp)));
    }
    nodes
}

/// Signal to the display layer that it should re-pull the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionInvalidated;

struct CachedProjection {
    revision: u64,
    folders: Vec<WorkspaceFolderRef>,
    nodes: Vec<TreeNode>,
}

/// Serves the projection to the display layer.
///
/// The cached projection is only reused while both the store revision and the
/// open folder list are unchanged.
pub struct TreeDataProvider {
    service: WorkspaceService,
    cache: Mutex<Option<CachedProjection>>,
    invalidated_tx: broadcast::Sender<ProjectionInvalidated>,
}

impl TreeDataProvider {
    pub fn new(service: WorkspaceService) -> Self {
        let (invalidated_tx, _) = broadcast::channel(16);
        Self {
            service,
            cache: Mutex::new(None),
            invalidated_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectionInvalidated> {
        self.invalidated_tx.subscribe()
    }

    /// Top-level nodes for `None`, otherwise the node's children.
    pub async fn get_children(&self, node: Option<&TreeNode>) -> Vec<TreeNode> {
        match node {
            Some(node) => node.children.clone(),
            None => self.roots().await,
        }
    }

    /// Drop the cached projection and tell observers to re-pull.
    pub fn refresh(&self) {
        self.lock_cache().take();
        debug!("Projection invalidated");
        let _ = self.invalidated_tx.send(ProjectionInvalidated);
    }

    async fn roots(&self) -> Vec<TreeNode> {
        let (revision, entries) = self.service.snapshot().await;
        let folders = self.service.open_folders();

        let mut cache = self.lock_cache();
        if let Some(cached) = cache.as_ref() {
            if cached.revision == revision && cached.folders == folders {
                return cached.nodes.clone();
            }
        }

        let nodes = project(&entries, &folders);
        *cache = Some(CachedProjection {
            revision,
            folders,
            nodes: nodes.clone(),
        });
        nodes
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<CachedProjection>> {
        match self.cache.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(path: &str) -> ProjectEntry {
        ProjectEntry::new(path, "sqlproj")
    }

    fn folders(paths: &[&str]) -> Vec<WorkspaceFolderRef> {
        paths.iter().map(WorkspaceFolderRef::new).collect()
    }

    fn labels(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.label.as_str()).collect()
    }

    #[test]
    fn test_empty_store_projects_placeholder() {
        let nodes = project(&[], &folders(&["/ws"]));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, NodeKind::Placeholder);
        assert_eq!(nodes[0].label, EMPTY_LABEL);
    }

    #[test]
    fn test_groups_by_folder_and_sorts_children() {
        let mut scratch = committed("/tmp/Scratch.sqlproj");
        scratch.is_temp = true;
        let entries = vec![
            committed("/ws/zeta.sqlproj"),
            committed("/other/lonely.sqlproj"),
            committed("/ws/db/Alpha.sqlproj"),
            committed("/ws2/beta.sqlproj"),
            scratch,
        ];

        let nodes = project(&entries, &folders(&["/ws2", "/ws"]));
        assert_eq!(labels(&nodes), vec!["ws2", "ws", UNGROUPED_LABEL, TEMP_GROUP_LABEL]);
        assert_eq!(labels(&nodes[1].children), vec!["Alpha", "zeta"]);
        assert_eq!(nodes[1].description.as_deref(), Some("/ws"));
        assert_eq!(nodes[3].kind, NodeKind::Placeholder);
        assert_eq!(
            nodes[3].children[0].key.as_deref(),
            Some(Path::new("/tmp/Scratch.sqlproj"))
        );
    }

    #[test]
    fn test_no_folders_gives_single_ungrouped_node() {
        let entries = vec![committed("/a/x.sqlproj"), committed("/b/y.sqlproj")];
        let nodes = project(&entries, &[]);
        assert_eq!(labels(&nodes), vec![UNGROUPED_LABEL]);
        assert_eq!(nodes[0].children.len(), 2);
    }

    #[test]
    fn test_nested_folder_takes_entry() {
        let entries = vec![committed("/ws/sub/x.sqlproj"), committed("/ws/y.sqlproj")];
        let nodes = project(&entries, &folders(&["/ws/sub", "/ws"]));
        assert_eq!(labels(&nodes), vec!["sub", "ws"]);
        assert_eq!(labels(&nodes[0].children), vec!["x"]);
        assert_eq!(labels(&nodes[1].children), vec!["y"]);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let entries = vec![committed("/ws/b.sqlproj"), committed("/ws/a.sqlproj")];
        let open = folders(&["/ws"]);
        assert_eq!(project(&entries, &open), project(&entries, &open));
    }

    #[test]
    fn test_project_nodes_reference_store_entries() {
        let entries = vec![committed("/ws/a.sqlproj"), committed("/elsewhere/b.sqlproj")];
        let nodes = project(&entries, &folders(&["/ws"]));
        for node in nodes.iter().flat_map(|n| n.walk()) {
            if node.kind == NodeKind::Project {
                let key = node.key.as_ref().unwrap();
                assert!(entries.iter().any(|e| &e.file_path == key));
            }
        }
    }
}
