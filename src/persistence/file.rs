use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{QueueStore, StoreKey};
use crate::error::{HandpayError, Result};
use crate::models::HandpayRecord;

/// One JSON snapshot file per store key.
///
/// Snapshots are written to a temporary sibling, synced, then renamed over the
/// previous file so a power loss leaves either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    directory: PathBuf,
}

impl FileQueueStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn snapshot_path(&self, key: StoreKey) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }

    fn temp_path(&self, key: StoreKey) -> PathBuf {
        self.directory.join(format!("{key}.json.tmp"))
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self, key: StoreKey) -> Result<Option<Vec<HandpayRecord>>> {
        let path = self.snapshot_path(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "Loaded queue snapshot");
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HandpayError::persistence(
                key.client_id,
                format!("failed to read {}: {e}", path.display()),
            )),
        }
    }

    async fn save(&self, key: StoreKey, records: &[HandpayRecord]) -> Result<()> {
        let bytes = serde_json::to_vec(records)?;
        let temp_path = self.temp_path(key);
        let path = self.snapshot_path(key);

        let write = async {
            fs::create_dir_all(&self.directory).await?;
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &path).await
        };

        write.await.map_err(|e| {
            HandpayError::persistence(
                key.client_id,
                format!("failed to write {}: {e}", path.display()),
            )
        })
    }
}
