//! The snapshot/rollback facility is delegated to external storage (§9);
//! the core only ever calls `snapshot`, `rollback`, and `destroy`, and must
//! tolerate the facility being unavailable by refusing reorg and
//! surfacing `RecoveryFailed` rather than guessing at a recovery.
//!
//! `FsSnapshotFacility` is the default, directory-copy-based
//! implementation used outside of a real graph-store deployment; it is
//! swappable behind the `SnapshotFacility` trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StoreError;

#[async_trait]
pub trait SnapshotFacility: Send + Sync {
    async fn snapshot(&self, name: &str) -> Result<(), StoreError>;
    async fn rollback(&self, name: &str) -> Result<(), StoreError>;
    async fn destroy(&self, prefix: &str) -> Result<(), StoreError>;
}

pub struct FsSnapshotFacility {
    data_dir: PathBuf,
    snapshot_dir: PathBuf,
}

impl FsSnapshotFacility {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let snapshot_dir = data_dir.join(".snapshots");
        FsSnapshotFacility {
            data_dir,
            snapshot_dir,
        }
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.snapshot_dir.join(name)
    }
}

#[async_trait]
impl SnapshotFacility for FsSnapshotFacility {
    async fn snapshot(&self, name: &str) -> Result<(), StoreError> {
        let dest = self.snapshot_path(name);
        tokio::fs::create_dir_all(&self.snapshot_dir)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))?;
        copy_dir_recursive(&self.data_dir, &dest)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))
    }

    async fn rollback(&self, name: &str) -> Result<(), StoreError> {
        let src = self.snapshot_path(name);
        if !src.exists() {
            return Err(StoreError::StorageError(anyhow::anyhow!(
                "no snapshot named '{}'",
                name
            )));
        }
        if self.data_dir.exists() {
            tokio::fs::remove_dir_all(&self.data_dir)
                .await
                .map_err(|e| StoreError::StorageError(e.into()))?;
        }
        copy_dir_recursive(&src, &self.data_dir)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))
    }

    async fn destroy(&self, prefix: &str) -> Result<(), StoreError> {
        let target = self.data_dir.join("networks").join(prefix);
        if target.exists() {
            tokio::fs::remove_dir_all(&target)
                .await
                .map_err(|e| StoreError::StorageError(e.into()))?;
        }
        Ok(())
    }
}

fn copy_dir_recursive<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        if !src.exists() {
            return Ok(());
        }
        tokio::fs::create_dir_all(dst).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let dest_path = dst.join(entry.file_name());
            if file_type.is_dir() {
                copy_dir_recursive(&entry.path(), &dest_path).await?;
            } else {
                tokio::fs::copy(entry.path(), dest_path).await?;
            }
        }
        Ok(())
    })
}
