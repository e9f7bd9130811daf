//! Directory assembly: producing a fresh [`Directory`] from the upstream
//! registry before it is published.
//!
//! Talking to the registry itself is out of scope for this crate. Callers
//! plug in their own [`DirectoryAssembler`]; [`JsonFileAssembler`] covers the
//! common case of a registry export already on disk.

use std::path::PathBuf;

use async_trait::async_trait;

use dirsync_core::Directory;

use crate::error::AssembleError;

/// Builds the directory to publish.
#[async_trait]
pub trait DirectoryAssembler: Send + Sync + std::fmt::Debug {
    async fn assemble(&self) -> Result<Directory, AssembleError>;
}

/// Reads a directory document from a JSON file on every `assemble` call.
#[derive(Debug, Clone)]
pub struct JsonFileAssembler {
    path: PathBuf,
}

impl JsonFileAssembler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DirectoryAssembler for JsonFileAssembler {
    async fn assemble(&self) -> Result<Directory, AssembleError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| AssembleError::Io {
                path: self.path.clone(),
                source,
            })?;
        let directory = Directory::from_slice(&bytes).map_err(|source| AssembleError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(
            path = %self.path.display(),
            records = directory.record_count(),
            "assembled directory from file"
        );
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_core::CollectionName;

    #[tokio::test]
    async fn reads_partial_export() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hub.json");
        std::fs::write(&path, r#"{"agents": [{"name": "a1"}], "tools": []}"#).unwrap();

        let dir = JsonFileAssembler::new(&path).assemble().await.unwrap();
        assert_eq!(dir.get(CollectionName::Agents).len(), 1);
        assert!(dir.get(CollectionName::Servers).is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = JsonFileAssembler::new(tmp.path().join("absent.json"))
            .assemble()
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::Io { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_file_is_reported_with_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hub.json");
        std::fs::write(&path, r#"{"servers": "not a list"}"#).unwrap();

        let err = JsonFileAssembler::new(&path).assemble().await.unwrap_err();
        assert!(matches!(err, AssembleError::Malformed { .. }));
        assert!(err.to_string().contains("hub.json"));
    }
}
