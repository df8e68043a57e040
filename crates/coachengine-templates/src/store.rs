use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PromptStoreError;

/// Identifies a stored template body. Topics reference templates by this
/// opaque key, never by their literal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateReference {
    pub key: String,
    pub version: u32,
}

impl TemplateReference {
    pub fn new(key: impl Into<String>, version: u32) -> Self {
        Self { key: key.into(), version }
    }
}

/// Read-only source of template bodies. Content is data, not code — loading
/// it is an I/O concern kept behind this port so the renderer stays
/// storage-agnostic.
#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn load(&self, reference: &TemplateReference) -> Result<String, PromptStoreError>;
}

/// In-memory adapter, primarily for tests and for topics whose templates
/// are small enough to embed at startup.
#[derive(Default, Clone)]
pub struct StaticPromptStore {
    bodies: HashMap<(String, u32), String>,
}

impl StaticPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, version: u32, body: impl Into<String>) -> Self {
        self.bodies.insert((key.into(), version), body.into());
        self
    }
}

#[async_trait]
impl PromptStore for StaticPromptStore {
    async fn load(&self, reference: &TemplateReference) -> Result<String, PromptStoreError> {
        self.bodies
            .get(&(reference.key.clone(), reference.version))
            .cloned()
            .ok_or_else(|| PromptStoreError::NotFound(format!("{}@{}", reference.key, reference.version)))
    }
}

/// Filesystem adapter. Bodies live under `root/<key>/v<version>.txt`, one
/// file per version so old versions stay addressable for sessions already
/// mid-flight on them.
pub struct FilePromptStore {
    root: PathBuf,
}

impl FilePromptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &TemplateReference) -> PathBuf {
        self.root.join(&reference.key).join(format!("v{}.txt", reference.version))
    }
}

#[async_trait]
impl PromptStore for FilePromptStore {
    async fn load(&self, reference: &TemplateReference) -> Result<String, PromptStoreError> {
        let path = self.path_for(reference);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PromptStoreError::Io(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_store_round_trips() {
        let store = StaticPromptStore::new().with("sys/core_values", 1, "Hello {{name}}");
        let body = store.load(&TemplateReference::new("sys/core_values", 1)).await.unwrap();
        assert_eq!(body, "Hello {{name}}");
    }

    #[tokio::test]
    async fn static_store_missing_reference_errors() {
        let store = StaticPromptStore::new();
        let err = store.load(&TemplateReference::new("missing", 1)).await.unwrap_err();
        assert!(matches!(err, PromptStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn file_store_reads_versioned_path() {
        let dir = tempfile_dir();
        let key_dir = dir.join("sys_core_values");
        tokio::fs::create_dir_all(&key_dir).await.unwrap();
        tokio::fs::write(key_dir.join("v2.txt"), "Hi {{name}}").await.unwrap();

        let store = FilePromptStore::new(&dir);
        let body = store
            .load(&TemplateReference::new("sys_core_values", 2))
            .await
            .unwrap();
        assert_eq!(body, "Hi {{name}}");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    fn tempfile_dir() -> PathBuf {
        std::env::temp_dir().join(format!("coachengine-templates-test-{}", std::process::id()))
    }
}
