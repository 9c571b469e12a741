//! Scratch list persistence - temp projects carried over between sessions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{PersistenceError, ScratchStore};

/// One temp project as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchRecord {
    pub file_path: PathBuf,
    pub project_type: String,
}

/// On-disk layout. Entries stay raw JSON so one malformed record does not
/// invalidate the rest.
#[derive(Debug, Serialize, Deserialize)]
struct ScratchFile {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    projects: Vec<serde_json::Value>,
}

pub struct JsonScratchStore {
    path: PathBuf,
}

impl JsonScratchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_blocking(path: &Path) -> Result<Vec<ScratchRecord>, PersistenceError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PersistenceError::ReadError(e.to_string()))?;
        let file: ScratchFile = serde_json::from_str(&content)
            .map_err(|e| PersistenceError::ParseError(e.to_string()))?;

        let mut records = Vec::with_capacity(file.projects.len());
        for (index, value) in file.projects.into_iter().enumerate() {
            match serde_json::from_value::<ScratchRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(index, error = %e, "Skipping malformed scratch entry"),
            }
        }
        Ok(records)
    }

    fn save_blocking(path: &Path, records: Vec<ScratchRecord>) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::WriteError(e.to_string()))?;
        }

        let projects = records
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PersistenceError::WriteError(e.to_string()))?;
        let file = ScratchFile {
            version: 1,
            saved_at: Some(Utc::now()),
            projects,
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| PersistenceError::WriteError(e.to_string()))?;

        // replace via a sibling file so readers never see a partial write
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| PersistenceError::WriteError(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| PersistenceError::WriteError(e.to_string()))
    }
}

#[async_trait]
impl ScratchStore for JsonScratchStore {
    async fn load_scratch_project_list(&self) -> Result<Vec<ScratchRecord>, PersistenceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_blocking(&path))
            .await
            .map_err(|e| PersistenceError::ReadError(format!("Load task failed: {}", e)))?
    }

    async fn save_scratch_project_list(
        &self,
        records: Vec<ScratchRecord>,
    ) -> Result<(), PersistenceError> {
        let path = self.path.clone();
        let count = records.len();
        tokio::task::spawn_blocking(move || Self::save_blocking(&path, records))
            .await
            .map_err(|e| PersistenceError::WriteError(format!("Save task failed: {}", e)))??;
        info!(count, path = %self.path.display(), "Scratch list saved");
        Ok(())
    }
}
