//! # Local Snapshot Cache
//!
//! Directory documents on disk, one file per content address:
//! `{cache_dir}/{address}`, holding the directory's canonical JSON.
//!
//! ## Integrity Invariant
//!
//! An entry is either fully written or absent. Writes go to a `.tmp` file in
//! the cache directory, are fsynced, and are then renamed over the final
//! name, so a crash mid-write leaves at most a stray temp file that is never
//! reported as an entry. Overwriting an existing entry is tolerated; content
//! addressing makes the new bytes equivalent to the old.
//!
//! The cache never repairs a corrupt entry. [`SnapshotCache::load`] reports
//! it and leaves the file in place for an operator to inspect.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use dirsync_core::{ContentAddress, Directory};

use crate::error::CacheError;

const TMP_PREFIX: &str = ".tmp";

/// Filesystem-backed cache of directory snapshots keyed by address.
#[derive(Debug)]
pub struct SnapshotCache {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl SnapshotCache {
    /// Open the cache rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|source| CacheError::Io {
            op: "create",
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, address: &ContentAddress) -> PathBuf {
        // ContentAddress guarantees a single path segment.
        self.dir.join(address.as_str())
    }

    pub async fn has(&self, address: &ContentAddress) -> bool {
        fs::metadata(self.entry_path(address))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Load and parse the entry for `address`.
    pub async fn load(&self, address: &ContentAddress) -> Result<Directory, CacheError> {
        let path = self.entry_path(address);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::Missing {
                    address: address.clone(),
                })
            }
            Err(source) => {
                return Err(CacheError::Io {
                    op: "read",
                    path,
                    source,
                })
            }
        };

        Directory::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            address: address.clone(),
            source,
        })
    }

    /// Write `directory` under `address` atomically.
    pub async fn store(
        &self,
        address: &ContentAddress,
        directory: &Directory,
    ) -> Result<(), CacheError> {
        let bytes = directory
            .canonical_bytes()
            .map_err(|source| CacheError::Serialization {
                address: address.clone(),
                source,
            })?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self
            .dir
            .join(format!("{TMP_PREFIX}-{}-{}-{seq}", address, std::process::id()));
        let final_path = self.entry_path(address);

        let result = write_synced(&tmp_path, bytes.as_bytes()).await;
        let result = match result {
            Ok(()) => fs::rename(&tmp_path, &final_path)
                .await
                .map_err(|source| CacheError::Io {
                    op: "rename",
                    path: final_path.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        } else {
            tracing::debug!(%address, size = bytes.len(), "cached snapshot");
        }
        result
    }

    /// Addresses of all stored entries, sorted.
    pub async fn entries(&self) -> Result<Vec<ContentAddress>, CacheError> {
        let io = |source| CacheError::Io {
            op: "list",
            path: self.dir.clone(),
            source,
        };
        let mut read_dir = fs::read_dir(&self.dir).await.map_err(io)?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await.map_err(io)? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(TMP_PREFIX) {
                continue;
            }
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            match ContentAddress::new(name) {
                Ok(address) => entries.push(address),
                Err(e) => tracing::debug!(error = %e, "skipping foreign file in cache directory"),
            }
        }

        entries.sort();
        Ok(entries)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let io = |op: &'static str| {
        move |source| CacheError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    };
    let mut file = fs::File::create(path).await.map_err(io("create"))?;
    file.write_all(bytes).await.map_err(io("write"))?;
    file.sync_all().await.map_err(io("sync"))?;
    Ok(())
}
