//! Project record store - the set of known project files

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::normalize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Project already tracked as '{existing}', cannot re-add as '{requested}': {}", .path.display())]
    DuplicateProject {
        path: PathBuf,
        existing: String,
        requested: String,
    },
    #[error("Project not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// A project file known to the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub file_path: PathBuf,
    pub project_type: String,
    #[serde(default)]
    pub is_temp: bool,
}

impl ProjectEntry {
    pub fn new(file_path: impl AsRef<Path>, project_type: impl Into<String>) -> Self {
        Self {
            file_path: normalize(file_path.as_ref()),
            project_type: project_type.into(),
            is_temp: false,
        }
    }

    /// Display label used by the tree: the file stem, or the full path when
    /// there is none.
    pub fn label(&self) -> String {
        self.file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

/// Insertion-ordered store of project entries, unique by file path.
#[derive(Debug, Clone, Default)]
pub struct ProjectStore {
    entries: Vec<ProjectEntry>,
    revision: u64,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update an entry by file path.
    ///
    /// A committed entry keeps its project type: re-adding it with another
    /// type fails. Adding a committed entry over a temp one commits it; adding
    /// a temp entry over a committed one does not demote it.
    pub fn add(&mut self, entry: ProjectEntry, temp: bool) -> Result<ProjectEntry, StoreError> {
        let file_path = normalize(&entry.file_path);

        if let Some(existing) = self.entries.iter_mut().find(|e| e.file_path == file_path) {
            if !existing.is_temp && existing.project_type != entry.project_type {
                return Err(StoreError::DuplicateProject {
                    path: file_path,
                    existing: existing.project_type.clone(),
                    requested: entry.project_type,
                });
            }

            let is_temp = existing.is_temp && temp;
            if existing.project_type != entry.project_type || existing.is_temp != is_temp {
                existing.project_type = entry.project_type;
                existing.is_temp = is_temp;
                let updated = existing.clone();
                self.revision += 1;
                return Ok(updated);
            }
            return Ok(existing.clone());
        }

        let entry = ProjectEntry {
            file_path,
            project_type: entry.project_type,
            is_temp: temp,
        };
        self.entries.push(entry.clone());
        self.revision += 1;
        Ok(entry)
    }

    /// Remove an entry, returning it for notification.
    pub fn remove(&mut self, file_path: &Path) -> Result<ProjectEntry, StoreError> {
        let file_path = normalize(file_path);
        let index = self
            .entries
            .iter()
            .position(|e| e.file_path == file_path)
            .ok_or(StoreError::NotFound(file_path))?;
        self.revision += 1;
        Ok(self.entries.remove(index))
    }

    /// Clear the temp flag. No-op for committed entries.
    pub fn promote(&mut self, file_path: &Path) -> Result<ProjectEntry, StoreError> {
        let file_path = normalize(file_path);
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.file_path == file_path)
            .ok_or(StoreError::NotFound(file_path))?;
        if entry.is_temp {
            entry.is_temp = false;
            self.revision += 1;
        }
        Ok(entry.clone())
    }

    pub fn get(&self, file_path: &Path) -> Option<&ProjectEntry> {
        let file_path = normalize(file_path);
        self.entries.iter().find(|e| e.file_path == file_path)
    }

    pub fn contains(&self, file_path: &Path) -> bool {
        self.get(file_path).is_some()
    }

    pub fn list_all(&self) -> Vec<ProjectEntry> {
        self.entries.clone()
    }

    pub fn list_temp(&self) -> Vec<ProjectEntry> {
        self.entries.iter().filter(|e| e.is_temp).cloned().collect()
    }

    pub fn list_committed(&self) -> Vec<ProjectEntry> {
        self.entries.iter().filter(|e| !e.is_temp).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter bumped on every effective mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
