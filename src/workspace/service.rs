//! Workspace service - project lifecycle operations over the shared store
//!
//! All mutations hold the service-wide `ops` lock for their whole duration, so
//! validation, store update and any folder mutation form one unit. Reads clone
//! the entry list under a short read lock and work on the copy.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::host::{
    FileAccessError, FileProbe, FolderChange, FolderMutator, FolderSource, HostError,
    PersistenceError, ScratchRecord, ScratchStore, WorkspaceFolderRef,
};
use crate::util::{contains_file, normalize};
use crate::workspace::background::BackgroundTask;
use crate::workspace::config::WorkspaceConfig;
use crate::workspace::provider::{ProjectType, ProjectTypeRegistry};
use crate::workspace::reconcile::{folder_paths, reconcile, ReconciliationResult};
use crate::workspace::scratch_saver::spawn_scratch_saver;
use crate::workspace::state::{ProjectEntry, ProjectStore, StoreError};
use crate::workspace::tree::TreeNode;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Unknown project type: {0}")]
    UnknownProjectType(String),
    #[error("Project path must be absolute: {}", .0.display())]
    RelativePath(PathBuf),
    #[error("Tree item '{0}' is not a project")]
    NotAProject(String),
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl WorkspaceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkspaceError::Store(StoreError::NotFound(_)))
    }
}

/// Something the user may want to act on. Emitted by the not-in-workspace check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceNotice {
    /// A committed project outside every open folder.
    NotInWorkspace(ProjectEntry),
    /// A project file in an open folder that is not tracked yet.
    Discovered {
        file_path: PathBuf,
        project_type: Option<String>,
    },
    FolderUnreadable(FileAccessError),
}

#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    ProjectsChanged,
    Notice(WorkspaceNotice),
    BackgroundFailed { task: String, message: String },
}

/// Outcome of loading the previous session's temp projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<ProjectEntry>,
    pub skipped: usize,
}

/// The collaborators the service consumes.
#[derive(Clone)]
pub struct HostServices {
    pub folders: Arc<dyn FolderSource>,
    pub mutator: Arc<dyn FolderMutator>,
    pub probe: Arc<dyn FileProbe>,
    pub scratch: Arc<dyn ScratchStore>,
}

struct ServiceInner {
    store: Arc<RwLock<ProjectStore>>,
    ops: Mutex<()>,
    registry: std::sync::RwLock<ProjectTypeRegistry>,
    host: HostServices,
    events_tx: broadcast::Sender<WorkspaceEvent>,
    save_tx: mpsc::Sender<()>,
    /// Saves are held back until the previous session's list has been read,
    /// otherwise an early mutation would overwrite it.
    scratch_ready: AtomicBool,
    /// A save was requested while held back; flushed once ready.
    save_pending: AtomicBool,
}

#[derive(Clone)]
pub struct WorkspaceService {
    inner: Arc<ServiceInner>,
}

impl WorkspaceService {
    /// Create the service. Must be called inside a tokio runtime: it starts
    /// the scratch saver.
    pub fn new(host: HostServices, config: &WorkspaceConfig) -> Self {
        let store = Arc::new(RwLock::new(ProjectStore::new()));
        let save_tx = spawn_scratch_saver(
            store.clone(),
            host.scratch.clone(),
            Duration::from_millis(config.scratch.debounce_ms),
        );
        let (events_tx, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(ServiceInner {
                store,
                ops: Mutex::new(()),
                registry: std::sync::RwLock::new(config.registry()),
                host,
                events_tx,
                save_tx,
                scratch_ready: AtomicBool::new(false),
                save_pending: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn folder_source(&self) -> &Arc<dyn FolderSource> {
        &self.inner.host.folders
    }

    pub fn open_folders(&self) -> Vec<WorkspaceFolderRef> {
        self.inner.host.folders.list_open_folders()
    }

    /// Store revision plus a copy of every entry, taken under one read lock.
    pub async fn snapshot(&self) -> (u64, Vec<ProjectEntry>) {
        let store = self.inner.store.read().await;
        (store.revision(), store.list_all())
    }

    pub async fn list_committed(&self) -> Vec<ProjectEntry> {
        self.inner.store.read().await.list_committed()
    }

    pub async fn list_temp(&self) -> Vec<ProjectEntry> {
        self.inner.store.read().await.list_temp()
    }

    /// Every registered project type, in registration order.
    pub fn project_types(&self) -> Vec<ProjectType> {
        self.registry().types().to_vec()
    }

    pub fn is_project_provider_available(&self) -> bool {
        self.registry().is_provider_available()
    }

    /// Providers can register after activation.
    pub fn register_project_type(&self, ty: ProjectType) {
        let mut registry = match self.inner.registry.write() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.register(ty);
    }

    /// Spawn work whose failure is logged and broadcast, never propagated.
    pub fn spawn_background<F>(&self, name: &'static str, future: F) -> BackgroundTask
    where
        F: Future<Output = Result<(), WorkspaceError>> + Send + 'static,
    {
        BackgroundTask::spawn(name, self.inner.events_tx.clone(), future)
    }

    /// Track a project file as committed and re-run reconciliation.
    ///
    /// Without an explicit type the type is inferred from the extension.
    pub async fn open_existing_or_new(
        &self,
        file_path: &Path,
        project_type: Option<&str>,
    ) -> Result<ProjectEntry, WorkspaceError> {
        let entry = {
            let _ops = self.inner.ops.lock().await;
            let entry = self.validate(file_path, project_type)?;
            let was_temp = self.is_temp(&entry.file_path).await;
            let entry = self.inner.store.write().await.add(entry, false)?;
            if was_temp {
                self.request_scratch_save();
            }
            entry
        };

        info!(path = %entry.file_path.display(), project_type = %entry.project_type, "Project opened");
        self.emit(WorkspaceEvent::ProjectsChanged);
        self.check_for_projects_not_added_to_workspace().await;
        Ok(entry)
    }

    /// Track a project as temp until it is promoted or discarded. Used for
    /// projects created while no workspace is open.
    pub async fn add_temp_project(
        &self,
        file_path: &Path,
        project_type: Option<&str>,
    ) -> Result<ProjectEntry, WorkspaceError> {
        let entry = {
            let _ops = self.inner.ops.lock().await;
            let entry = self.validate(file_path, project_type)?;
            self.inner.store.write().await.add(entry, true)?
        };

        if entry.is_temp {
            self.request_scratch_save();
        }
        info!(path = %entry.file_path.display(), "Temp project added");
        self.emit(WorkspaceEvent::ProjectsChanged);
        Ok(entry)
    }

    /// Stop tracking a project. The file itself is left alone.
    pub async fn remove_project(&self, file_path: &Path) -> Result<ProjectEntry, WorkspaceError> {
        let removed = {
            let _ops = self.inner.ops.lock().await;
            self.inner.store.write().await.remove(file_path)?
        };

        if removed.is_temp {
            self.request_scratch_save();
        }
        info!(path = %removed.file_path.display(), "Project removed from workspace");
        self.emit(WorkspaceEvent::ProjectsChanged);
        Ok(removed)
    }

    pub async fn promote_project(&self, file_path: &Path) -> Result<ProjectEntry, WorkspaceError> {
        let (entry, changed) = {
            let _ops = self.inner.ops.lock().await;
            let was_temp = self.is_temp(file_path).await;
            let entry = self.inner.store.write().await.promote(file_path)?;
            (entry, was_temp)
        };

        if changed {
            self.request_scratch_save();
            info!(path = %entry.file_path.display(), "Temp project promoted");
            self.emit(WorkspaceEvent::ProjectsChanged);
        }
        Ok(entry)
    }

    /// Load temp projects left over from the previous session.
    ///
    /// Never fails as a whole: a bad record is logged and skipped, an
    /// unreadable list is logged and treated as empty.
    pub async fn load_temp_projects(&self) -> LoadReport {
        let records = match self.inner.host.scratch.load_scratch_project_list().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not load scratch project list");
                self.mark_scratch_ready();
                return LoadReport::default();
            }
        };

        let mut report = LoadReport::default();
        {
            let _ops = self.inner.ops.lock().await;
            for record in records {
                match self.load_record(&record).await {
                    Ok(entry) => report.loaded.push(entry),
                    Err(e) => {
                        warn!(path = %record.file_path.display(), error = %e, "Skipping temp project");
                        report.skipped += 1;
                    }
                }
            }
        }
        self.mark_scratch_ready();

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped,
            "Temp projects loaded"
        );
        if !report.loaded.is_empty() {
            self.emit(WorkspaceEvent::ProjectsChanged);
        }
        report
    }

    async fn load_record(&self, record: &ScratchRecord) -> Result<ProjectEntry, WorkspaceError> {
        let entry = self
            .validate(&record.file_path, Some(&record.project_type))
            .map_err(|e| PersistenceError::InvalidEntry {
                path: record.file_path.clone(),
                reason: e.to_string(),
            })?;
        Ok(self.inner.store.write().await.add(entry, true)?)
    }

    /// Reconcile the store with the open folders without mutating anything.
    pub async fn reconcile(&self) -> ReconciliationResult {
        let (_, entries) = self.snapshot().await;
        let folders = self.open_folders();
        reconcile(&entries, &folders, self.inner.host.probe.as_ref()).await
    }

    /// Report projects that are tracked but not in the workspace, and project
    /// files in the workspace that are not tracked. Report-only.
    pub async fn check_for_projects_not_added_to_workspace(&self) -> Vec<WorkspaceNotice> {
        let result = self.reconcile().await;
        let registry = self.registry();

        let mut notices = Vec::with_capacity(
            result.orphaned.len() + result.missing_from_store.len() + result.folder_errors.len(),
        );
        for entry in result.orphaned {
            info!(path = %entry.file_path.display(), "Project is not in the workspace");
            notices.push(WorkspaceNotice::NotInWorkspace(entry));
        }
        for file_path in result.missing_from_store {
            debug!(path = %file_path.display(), "Untracked project file found");
            let project_type = registry.type_for_path(&file_path).map(|t| t.id.clone());
            notices.push(WorkspaceNotice::Discovered {
                file_path,
                project_type,
            });
        }
        for error in result.folder_errors {
            notices.push(WorkspaceNotice::FolderUnreadable(error));
        }

        for notice in &notices {
            self.emit(WorkspaceEvent::Notice(notice.clone()));
        }
        notices
    }

    /// Commit the given projects and open their folders where needed.
    ///
    /// Untracked paths are added with their inferred type. All-or-nothing:
    /// changes are staged on a copy of the store and only installed once every
    /// path validated and the folder mutation succeeded.
    pub async fn add_projects_to_workspace(
        &self,
        file_paths: &[PathBuf],
    ) -> Result<Vec<ProjectEntry>, WorkspaceError> {
        let _ops = self.inner.ops.lock().await;

        let mut staged = self.inner.store.read().await.clone();
        let base_revision = staged.revision();
        let mut entries = Vec::with_capacity(file_paths.len());
        let mut temp_changed = false;
        for file_path in file_paths {
            let entry = match staged.get(file_path).map(|e| e.is_temp) {
                Some(was_temp) => {
                    temp_changed |= was_temp;
                    staged.promote(file_path)?
                }
                None => {
                    let entry = self.validate(file_path, None)?;
                    staged.add(entry, false)?
                }
            };
            entries.push(entry);
        }

        let open = folder_paths(&self.open_folders());
        let mut add: Vec<PathBuf> = Vec::new();
        for entry in &entries {
            let contained = open.iter().chain(add.iter()).any(|f| contains_file(f, &entry.file_path));
            if !contained {
                if let Some(parent) = entry.file_path.parent() {
                    add.push(parent.to_path_buf());
                }
            }
        }
        if !add.is_empty() {
            info!(folders = add.len(), "Adding project folders to workspace");
            self.inner
                .host
                .mutator
                .mutate_open_folders(FolderChange {
                    add,
                    remove: Vec::new(),
                })
                .await?;
        }

        let changed = staged.revision() != base_revision;
        if changed {
            *self.inner.store.write().await = staged;
        }
        if temp_changed {
            self.request_scratch_save();
        }
        if changed {
            self.emit(WorkspaceEvent::ProjectsChanged);
        }
        Ok(entries)
    }

    /// Write the scratch list now instead of waiting for the debounce window.
    pub async fn save_scratch_now(&self) -> Result<(), WorkspaceError> {
        let records: Vec<ScratchRecord> = self
            .list_temp()
            .await
            .into_iter()
            .map(|e| ScratchRecord {
                file_path: e.file_path,
                project_type: e.project_type,
            })
            .collect();
        self.inner.host.scratch.save_scratch_project_list(records).await?;
        Ok(())
    }

    /// Resolve a tree node's lookup key against the current store.
    pub async fn resolve_node(&self, node: &TreeNode) -> Result<ProjectEntry, WorkspaceError> {
        let key = node
            .key
            .as_ref()
            .ok_or_else(|| WorkspaceError::NotAProject(node.label.clone()))?;
        self.inner
            .store
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(normalize(key)).into())
    }

    fn validate(
        &self,
        file_path: &Path,
        project_type: Option<&str>,
    ) -> Result<ProjectEntry, WorkspaceError> {
        if !file_path.is_absolute() {
            return Err(WorkspaceError::RelativePath(file_path.to_path_buf()));
        }

        let registry = self.registry();
        let project_type = match project_type {
            Some(ty) => {
                if registry.is_provider_available() && registry.get(ty).is_none() {
                    return Err(WorkspaceError::UnknownProjectType(ty.to_string()));
                }
                ty.to_string()
            }
            None => registry
                .type_for_path(file_path)
                .map(|t| t.id.clone())
                .ok_or_else(|| {
                    WorkspaceError::UnknownProjectType(file_path.display().to_string())
                })?,
        };
        Ok(ProjectEntry::new(file_path, project_type))
    }

    async fn is_temp(&self, file_path: &Path) -> bool {
        self.inner
            .store
            .read()
            .await
            .get(file_path)
            .map(|e| e.is_temp)
            .unwrap_or(false)
    }

    fn registry(&self) -> ProjectTypeRegistry {
        match self.inner.registry.read() {
            Ok(r) => r.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Open the scratch list for writing and flush any save requested while
    /// it was held back.
    fn mark_scratch_ready(&self) {
        self.inner.scratch_ready.store(true, Ordering::SeqCst);
        if self.inner.save_pending.swap(false, Ordering::SeqCst) {
            debug!("Flushing scratch save requested during load");
            self.queue_scratch_save();
        }
    }

    fn request_scratch_save(&self) {
        if !self.inner.scratch_ready.load(Ordering::SeqCst) {
            self.inner.save_pending.store(true, Ordering::SeqCst);
            // the load may have finished between the check and the store
            if !self.inner.scratch_ready.load(Ordering::SeqCst)
                || !self.inner.save_pending.swap(false, Ordering::SeqCst)
            {
                return;
            }
        }
        self.queue_scratch_save();
    }

    fn queue_scratch_save(&self) {
        if let Err(e) = self.inner.save_tx.try_send(()) {
            // a full channel already has a save pending
            debug!("Scratch save not queued: {}", e);
        }
    }

    fn emit(&self, event: WorkspaceEvent) {
        // no subscribers is fine
        let _ = self.inner.events_tx.send(event);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{fixture, record, MemoryScratch};
    use super::*;
    use crate::workspace::reconcile::testing::StaticProbe;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_open_infers_type_and_rejects_unknown() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        let entry = fx
            .service
            .open_existing_or_new(Path::new("/ws/Orders.sqlproj"), None)
            .await
            .unwrap();
        assert_eq!(entry.project_type, "sqlproj");
        assert!(!entry.is_temp);

        let err = fx
            .service
            .open_existing_or_new(Path::new("/ws/notes.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::UnknownProjectType(_)));

        let err = fx
            .service
            .open_existing_or_new(Path::new("relative.sqlproj"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::RelativePath(_)));
    }

    #[tokio::test]
    async fn test_open_reports_project_outside_workspace() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        let mut events = fx.service.subscribe();

        fx.service
            .open_existing_or_new(Path::new("/elsewhere/a.sqlproj"), Some("sqlproj"))
            .await
            .unwrap();

        assert!(matches!(events.recv().await.unwrap(), WorkspaceEvent::ProjectsChanged));
        match events.recv().await.unwrap() {
            WorkspaceEvent::Notice(WorkspaceNotice::NotInWorkspace(entry)) => {
                assert_eq!(entry.file_path, PathBuf::from("/elsewhere/a.sqlproj"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found_and_store_unchanged() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        fx.service
            .open_existing_or_new(Path::new("/ws/a.sqlproj"), None)
            .await
            .unwrap();
        let before = fx.service.snapshot().await;

        let err = fx
            .service
            .remove_project(Path::new("/ws/missing.sqlproj"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fx.service.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_load_temp_projects_skips_bad_records() {
        let scratch = MemoryScratch {
            records: StdMutex::new(vec![
                record("/tmp/a.sqlproj"),
                record("relative/b.sqlproj"),
                ScratchRecord {
                    file_path: PathBuf::from("/tmp/c.proj"),
                    project_type: "no-such-type".to_string(),
                },
                record("/tmp/d.sqlproj"),
            ]),
            fail_load: false,
        };
        let fx = fixture(&[], StaticProbe::default(), scratch);

        let report = fx.service.load_temp_projects().await;
        assert_eq!(report.loaded.len(), 2);
        assert_eq!(report.skipped, 2);
        assert!(report.loaded.iter().all(|e| e.is_temp));
        assert_eq!(fx.service.list_temp().await.len(), 2);
        assert!(fx.service.list_committed().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_temp_projects_tolerates_unreadable_list() {
        let scratch = MemoryScratch {
            fail_load: true,
            ..Default::default()
        };
        let fx = fixture(&[], StaticProbe::default(), scratch);
        assert_eq!(fx.service.load_temp_projects().await, LoadReport::default());
    }

    #[tokio::test]
    async fn test_check_is_report_only() {
        let probe = StaticProbe::default()
            .with("/ws", &["/ws/new.sqlproj"])
            .failing("/locked", "permission denied");
        let fx = fixture(&["/ws", "/locked"], probe, MemoryScratch::default());
        fx.service
            .open_existing_or_new(Path::new("/away/old.sqlproj"), None)
            .await
            .unwrap();
        let before = fx.service.snapshot().await;

        let notices = fx.service.check_for_projects_not_added_to_workspace().await;
        assert_eq!(notices.len(), 3);
        assert!(notices.contains(&WorkspaceNotice::Discovered {
            file_path: PathBuf::from("/ws/new.sqlproj"),
            project_type: Some("sqlproj".to_string()),
        }));
        assert!(notices
            .iter()
            .any(|n| matches!(n, WorkspaceNotice::FolderUnreadable(_))));
        assert_eq!(fx.service.snapshot().await, before);
        assert_eq!(fx.folders.list_open_folders().len(), 2);
    }

    #[tokio::test]
    async fn test_add_projects_to_workspace_opens_parent_folder() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        fx.service
            .open_existing_or_new(Path::new("/away/a.sqlproj"), None)
            .await
            .unwrap();

        let entries = fx
            .service
            .add_projects_to_workspace(&[
                PathBuf::from("/away/a.sqlproj"),
                PathBuf::from("/away/b.sqlproj"),
                PathBuf::from("/ws/c.sqlproj"),
            ])
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            fx.folders.list_open_folders(),
            vec![WorkspaceFolderRef::new("/ws"), WorkspaceFolderRef::new("/away")]
        );
        assert!(fx.service.reconcile().await.orphaned.is_empty());
    }

    #[tokio::test]
    async fn test_add_projects_to_workspace_is_all_or_nothing() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        let mut events = fx.service.subscribe();
        let before = fx.service.snapshot().await;

        let err = fx
            .service
            .add_projects_to_workspace(&[
                PathBuf::from("/away/a.sqlproj"),
                PathBuf::from("/away/notes.txt"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::UnknownProjectType(_)));
        assert_eq!(fx.service.snapshot().await, before);
        assert_eq!(fx.folders.list_open_folders(), vec![WorkspaceFolderRef::new("/ws")]);
        assert!(events.try_recv().is_err());
    }

    struct RejectingMutator;

    #[async_trait::async_trait]
    impl FolderMutator for RejectingMutator {
        async fn mutate_open_folders(&self, _change: FolderChange) -> Result<(), HostError> {
            Err(HostError::WriteError("read-only workspace".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_folder_mutation_leaves_store_unchanged() {
        let folders = Arc::new(crate::host::MemoryFolders::new(["/ws"]));
        let host = HostServices {
            folders,
            mutator: Arc::new(RejectingMutator),
            probe: Arc::new(StaticProbe::default()),
            scratch: Arc::new(MemoryScratch::default()),
        };
        let service = WorkspaceService::new(host, &WorkspaceConfig::default());
        service.load_temp_projects().await;
        service
            .add_temp_project(Path::new("/away/t.sqlproj"), None)
            .await
            .unwrap();
        let before = service.snapshot().await;

        let err = service
            .add_projects_to_workspace(&[
                PathBuf::from("/away/t.sqlproj"),
                PathBuf::from("/away/u.sqlproj"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Host(_)));
        assert_eq!(service.snapshot().await, before);
        assert_eq!(service.list_temp().await.len(), 1);
    }

    #[tokio::test]
    async fn test_temp_project_added_before_load_is_saved() {
        let fx = fixture(&[], StaticProbe::default(), MemoryScratch::default());
        fx.service
            .add_temp_project(Path::new("/scratch/early.sqlproj"), None)
            .await
            .unwrap();
        // held back: the previous session's list has not been read yet
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fx.scratch.records.lock().unwrap().is_empty());

        fx.service.load_temp_projects().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            fx.scratch.records.lock().unwrap().clone(),
            vec![record("/scratch/early.sqlproj")]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_are_serialized() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| PathBuf::from(format!("/ws/p{}.sqlproj", i)))
            .collect();

        let mut handles = Vec::new();
        for i in 0..48 {
            let service = fx.service.clone();
            let path = paths[i % paths.len()].clone();
            handles.push(tokio::spawn(async move {
                match i % 3 {
                    0 => service.open_existing_or_new(&path, None).await.map(|_| false),
                    1 => service.remove_project(&path).await.map(|_| true),
                    _ => service.promote_project(&path).await.map(|_| false),
                }
            }));
        }

        let mut removed = 0u64;
        for result in futures::future::join_all(handles).await {
            match result.unwrap() {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => assert!(e.is_not_found(), "unexpected error: {}", e),
            }
        }

        let (revision, entries) = fx.service.snapshot().await;
        let unique: std::collections::HashSet<_> = entries.iter().map(|e| &e.file_path).collect();
        assert_eq!(unique.len(), entries.len());
        // only committed entries are involved: each insert and each removal
        // bumps the revision once, and every insert not removed is still there
        assert_eq!(revision, entries.len() as u64 + 2 * removed);
    }

    #[tokio::test]
    async fn test_temp_changes_are_persisted_after_load() {
        let scratch = MemoryScratch {
            records: StdMutex::new(vec![record("/tmp/a.sqlproj"), record("/tmp/b.sqlproj")]),
            fail_load: false,
        };
        let fx = fixture(&[], StaticProbe::default(), scratch);
        fx.service.load_temp_projects().await;

        fx.service
            .promote_project(Path::new("/tmp/a.sqlproj"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let saved = fx.scratch.records.lock().unwrap().clone();
        assert_eq!(saved, vec![record("/tmp/b.sqlproj")]);
    }

    #[tokio::test]
    async fn test_temp_project_lifecycle() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        fx.service.load_temp_projects().await;

        let entry = fx
            .service
            .add_temp_project(Path::new("/scratch/b.sqlproj"), None)
            .await
            .unwrap();
        assert!(entry.is_temp);
        // temp entries are never reported as outside the workspace
        assert!(fx.service.reconcile().await.orphaned.is_empty());

        fx.service.save_scratch_now().await.unwrap();
        assert_eq!(
            fx.scratch.records.lock().unwrap().clone(),
            vec![record("/scratch/b.sqlproj")]
        );

        fx.service
            .promote_project(Path::new("/scratch/b.sqlproj"))
            .await
            .unwrap();
        assert_eq!(fx.service.reconcile().await.orphaned.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_node_uses_current_store() {
        let fx = fixture(&["/ws"], StaticProbe::default(), MemoryScratch::default());
        fx.service
            .open_existing_or_new(Path::new("/ws/a.sqlproj"), None)
            .await
            .unwrap();
        let (_, entries) = fx.service.snapshot().await;
        let nodes = crate::workspace::tree::project(&entries, &fx.service.open_folders());
        let node = nodes[0].children[0].clone();

        assert_eq!(fx.service.resolve_node(&node).await.unwrap().label(), "a");
        fx.service
            .remove_project(Path::new("/ws/a.sqlproj"))
            .await
            .unwrap();
        assert!(fx.service.resolve_node(&node).await.unwrap_err().is_not_found());
        assert!(matches!(
            fx.service.resolve_node(&nodes[0]).await,
            Err(WorkspaceError::NotAProject(_))
        ));
    }
}
