//! End-to-end checks of the workspace core against real folders on disk

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dataworkspace_core::host::{
    FolderChange, FsFileProbe, JsonScratchStore, MemoryFolders, ScratchRecord, WorkspaceFile,
};
use dataworkspace_core::workspace::{project, NodeKind};
use dataworkspace_core::{
    activate, Command, CommandOutcome, Extension, HostServices, ScratchStore, WorkspaceConfig,
};
use tempfile::TempDir;

struct Env {
    _dir: TempDir,
    root: PathBuf,
    scratch: Arc<JsonScratchStore>,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let scratch = Arc::new(JsonScratchStore::new(root.join("state").join("scratch.json")));
        Self {
            _dir: dir,
            root,
            scratch,
        }
    }

    fn touch(&self, rel: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "<Project />").unwrap();
        path
    }

    fn dir(&self, rel: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    fn activate(&self, folders: Arc<MemoryFolders>) -> Extension {
        let config = WorkspaceConfig::default();
        let host = HostServices {
            folders: folders.clone(),
            mutator: folders,
            probe: Arc::new(FsFileProbe::new(
                config.registry().extensions(),
                &config.scan,
            )),
            scratch: self.scratch.clone(),
        };
        activate(host, &config)
    }
}

fn paths(entries: &[dataworkspace_core::ProjectEntry]) -> Vec<&Path> {
    entries.iter().map(|e| e.file_path.as_path()).collect()
}

#[tokio::test]
async fn test_orphan_lifecycle() {
    let env = Env::new();
    let ws = env.dir("ws");
    let ws2 = env.dir("ws2");
    let a = env.touch("ws/a.sqlproj");
    let b = env.touch("ws2/b.sqlproj");
    env.scratch
        .save_scratch_project_list(vec![ScratchRecord {
            file_path: b.clone(),
            project_type: "sqlproj".to_string(),
        }])
        .await
        .unwrap();

    let folders = Arc::new(MemoryFolders::new([&ws]));
    let mut ext = env.activate(folders.clone());
    ext.wait_for_initialization().await;
    assert_eq!(paths(&ext.service.list_temp().await), vec![b.as_path()]);

    ext.service.open_existing_or_new(&a, None).await.unwrap();
    let result = ext.service.reconcile().await;
    assert!(result.orphaned.is_empty());
    assert!(result.missing_from_store.is_empty());

    folders.apply(&FolderChange {
        add: vec![],
        remove: vec![ws.clone()],
    });
    let result = ext.service.reconcile().await;
    assert_eq!(paths(&result.orphaned), vec![a.as_path()]);

    ext.service.promote_project(&b).await.unwrap();
    folders.apply(&FolderChange {
        add: vec![ws2.clone()],
        remove: vec![],
    });
    let result = ext.service.reconcile().await;
    assert_eq!(paths(&result.orphaned), vec![a.as_path()]);
    assert!(result.missing_from_store.is_empty());

    // the promoted project no longer belongs in the scratch list
    ext.service.save_scratch_now().await.unwrap();
    assert!(env.scratch.load_scratch_project_list().await.unwrap().is_empty());
    ext.deactivate();
}

#[tokio::test]
async fn test_unreadable_folder_does_not_hide_others() {
    let env = Env::new();
    let ws = env.dir("ws");
    let found = env.touch("ws/nested/found.sqlproj");
    let gone = env.root.join("gone");

    let folders = Arc::new(MemoryFolders::new([&gone, &ws]));
    let mut ext = env.activate(folders);
    ext.wait_for_initialization().await;

    let result = ext.service.reconcile().await;
    assert_eq!(result.missing_from_store, vec![found]);
    assert_eq!(result.folder_errors.len(), 1);
    assert_eq!(result.folder_errors[0].folder, gone);
    ext.deactivate();
}

#[tokio::test]
async fn test_remove_unknown_leaves_store_unchanged() {
    let env = Env::new();
    let ws = env.dir("ws");
    let a = env.touch("ws/a.sqlproj");

    let mut ext = env.activate(Arc::new(MemoryFolders::new([&ws])));
    ext.wait_for_initialization().await;
    ext.service.open_existing_or_new(&a, None).await.unwrap();

    let before = ext.service.snapshot().await;
    let err = ext
        .service
        .remove_project(&ws.join("other.sqlproj"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(ext.service.snapshot().await, before);
    ext.deactivate();
}

#[tokio::test]
async fn test_projection_is_stable() {
    let env = Env::new();
    let ws = env.dir("ws");
    let a = env.touch("ws/a.sqlproj");
    let outside = env.touch("elsewhere/z.sqlproj");

    let folders = Arc::new(MemoryFolders::new([&ws]));
    let mut ext = env.activate(folders);
    ext.wait_for_initialization().await;
    ext.service.open_existing_or_new(&a, None).await.unwrap();
    ext.service.open_existing_or_new(&outside, None).await.unwrap();

    let (_, entries) = ext.service.snapshot().await;
    let open = ext.service.open_folders();
    assert_eq!(project(&entries, &open), project(&entries, &open));

    let roots = ext.tree.get_children(None).await;
    assert_eq!(roots, ext.tree.get_children(None).await);
    assert_eq!(roots.len(), 2);
    assert!(roots.iter().all(|n| n.kind == NodeKind::Workspace));
    ext.deactivate();
}

#[tokio::test]
async fn test_add_to_workspace_updates_workspace_file() {
    let env = Env::new();
    let ws = env.dir("ws");
    let other = env.touch("other/o.sqlproj");
    let file_path = env.root.join("project.dataworkspace.json");
    fs::write(
        &file_path,
        serde_json::json!({ "folders": [{ "path": "ws" }] }).to_string(),
    )
    .unwrap();

    let file = Arc::new(WorkspaceFile::open(&file_path).unwrap());
    let config = WorkspaceConfig::default();
    let host = HostServices {
        folders: file.clone(),
        mutator: file.clone(),
        probe: Arc::new(FsFileProbe::new(config.registry().extensions(), &config.scan)),
        scratch: env.scratch.clone(),
    };
    let mut ext = activate(host, &config);
    ext.wait_for_initialization().await;

    let outcome = ext
        .commands
        .execute(Command::AddToWorkspace {
            file_paths: vec![other.clone()],
        })
        .await
        .unwrap();
    assert!(matches!(outcome, CommandOutcome::AddedToWorkspace { .. }));
    assert!(ext.service.reconcile().await.orphaned.is_empty());

    let reopened = WorkspaceFile::open(&file_path).unwrap();
    let folders: Vec<PathBuf> = dataworkspace_core::FolderSource::list_open_folders(&reopened)
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(folders, vec![ws, other.parent().unwrap().to_path_buf()]);
    ext.deactivate();
}
