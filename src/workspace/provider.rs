//! Project types contributed by project providers

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A project type a provider knows how to open, identified by file extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectType {
    pub id: String,
    /// File extension without the leading dot, e.g. `sqlproj`.
    pub extension: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ProjectType {
    pub fn new(id: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extension: normalize_extension(&extension.into()),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct ProjectTypeRegistry {
    types: Vec<ProjectType>,
}

impl ProjectTypeRegistry {
    pub fn new(types: impl IntoIterator<Item = ProjectType>) -> Self {
        let mut registry = Self::default();
        for ty in types {
            registry.register(ty);
        }
        registry
    }

    /// Register a type, replacing any previous registration with the same id.
    pub fn register(&mut self, mut ty: ProjectType) {
        ty.extension = normalize_extension(&ty.extension);
        debug!(id = %ty.id, extension = %ty.extension, "Project type registered");
        match self.types.iter_mut().find(|t| t.id == ty.id) {
            Some(existing) => *existing = ty,
            None => self.types.push(ty),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ProjectType> {
        self.types.iter().find(|t| t.id == id)
    }

    /// The first registered type whose extension matches `path`.
    pub fn type_for_path(&self, path: &Path) -> Option<&ProjectType> {
        self.types.iter().find(|t| t.matches(path))
    }

    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.types.iter().map(|t| t.extension.clone()).collect();
        exts.dedup();
        exts
    }

    pub fn types(&self) -> &[ProjectType] {
        &self.types
    }

    /// Whether any provider is installed. Drives the host's "new project" UI.
    pub fn is_provider_available(&self) -> bool {
        !self.types.is_empty()
    }
}
