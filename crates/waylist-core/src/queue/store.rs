//! On-disk persistence for the outbound queue.
//!
//! Layout under the data directory:
//!
//! ```text
//! outbound-queue.json          versioned envelope of flat operation records
//! outbound-photos/<sha256>.ext content-addressed photo bytes
//! ```

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::operation::OutboundOperation;
use crate::error::{Error, Result};

const QUEUE_FILE: &str = "outbound-queue.json";
const PHOTO_DIR: &str = "outbound-photos";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct QueueEnvelope {
    version: u32,
    next_order: u64,
    operations: Vec<OutboundOperation>,
}

/// Persisted queue contents.
#[derive(Debug, Default)]
pub struct StoredQueue {
    pub operations: Vec<OutboundOperation>,
    pub next_order: u64,
}

#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn queue_path(&self) -> PathBuf {
        self.dir.join(QUEUE_FILE)
    }

    pub fn photo_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(PHOTO_DIR).join(file_name)
    }

    /// Read the queue file, sorted by creation order. A missing file is an
    /// empty queue.
    pub async fn load(&self) -> Result<StoredQueue> {
        let raw = match tokio::fs::read(self.queue_path()).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(StoredQueue::default());
            }
            Err(error) => return Err(error.into()),
        };

        let envelope: QueueEnvelope = serde_json::from_slice(&raw)?;
        if envelope.version != FORMAT_VERSION {
            return Err(Error::Queue(format!(
                "Unsupported queue format version {} in {}",
                envelope.version,
                self.queue_path().display()
            )));
        }

        let mut operations = envelope.operations;
        operations.sort_by_key(|operation| operation.creation_order);
        let next_order = operations
            .last()
            .map_or(0, |operation| operation.creation_order + 1)
            .max(envelope.next_order);

        Ok(StoredQueue {
            operations,
            next_order,
        })
    }

    /// Replace the queue file atomically (write to a temp file, then rename).
    pub async fn save<'a>(
        &self,
        operations: impl IntoIterator<Item = &'a OutboundOperation>,
        next_order: u64,
    ) -> Result<()> {
        let envelope = QueueEnvelope {
            version: FORMAT_VERSION,
            next_order,
            operations: operations.into_iter().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.queue_path();
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    /// Store photo bytes under their content hash and return the file name.
    pub async fn write_photo(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        let digest = hex::encode(Sha256::digest(bytes));
        let file_name = format!("{digest}.{}", extension_for(mime_type));
        let path = self.photo_path(&file_name);

        if tokio::fs::try_exists(&path).await? {
            return Ok(file_name);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(file_name)
    }

    pub async fn read_photo(&self, file_name: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.photo_path(file_name))
            .await
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound => Error::NotFound(format!("Photo file {file_name}")),
                _ => error.into(),
            })
    }

    pub async fn remove_photo(&self, file_name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.photo_path(file_name)).await {
            Err(error) if error.kind() != ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }

    /// Delete photo files no queued operation references. Returns the count.
    pub async fn prune_photos(&self, referenced: &HashSet<&str>) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(self.dir.join(PHOTO_DIR)).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(error.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !referenced.contains(name) {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/heic" => "heic",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Checklist;
    use crate::queue::OperationPayload;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn checkin(order: u64) -> OutboundOperation {
        OutboundOperation::new(
            order,
            None,
            OperationPayload::CheckinToggle {
                list: Checklist::Beaches,
                item_id: i64::try_from(order).unwrap(),
                visited: true,
            },
        )
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_queue() {
        let dir = TempDir::new().unwrap();
        let stored = QueueStore::new(dir.path()).load().await.unwrap();
        assert!(stored.operations.is_empty());
        assert_eq!(stored.next_order, 0);
    }

    #[tokio::test]
    async fn save_then_load_sorts_by_creation_order() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path());
        let first = checkin(4);
        let second = checkin(9);

        store.save([&second, &first], 10).await.unwrap();
        let stored = store.load().await.unwrap();

        assert_eq!(stored.operations, vec![first, second]);
        assert_eq!(stored.next_order, 10);
        assert!(!store.queue_path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path());
        std::fs::write(
            store.queue_path(),
            r#"{"version": 99, "next_order": 0, "operations": []}"#,
        )
        .unwrap();

        assert!(matches!(store.load().await, Err(Error::Queue(_))));
    }

    #[tokio::test]
    async fn photos_are_content_addressed() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path());

        let first = store.write_photo(b"pixels", "image/jpeg").await.unwrap();
        let again = store.write_photo(b"pixels", "image/jpeg").await.unwrap();
        let other = store.write_photo(b"other", "image/png").await.unwrap();

        assert_eq!(first, again);
        assert!(first.ends_with(".jpg"));
        assert_eq!(first.len(), 64 + 4);
        assert!(other.ends_with(".png"));
        assert_eq!(store.read_photo(&first).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn prune_keeps_referenced_photos() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path());
        let kept = store.write_photo(b"keep", "image/jpeg").await.unwrap();
        let dropped = store.write_photo(b"drop", "image/jpeg").await.unwrap();

        let removed = store
            .prune_photos(&HashSet::from([kept.as_str()]))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.photo_path(&kept).exists());
        assert!(matches!(
            store.read_photo(&dropped).await,
            Err(Error::NotFound(_))
        ));
    }
}
