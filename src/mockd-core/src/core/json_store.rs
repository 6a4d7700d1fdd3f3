use async_trait::async_trait;
use mockd_errors::StoreError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Store;
use crate::models::{Environment, RawEnvironment};

/// One pretty-printed JSON file per key inside `dir`.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never see a half-written file.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<RawEnvironment>>, StoreError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }

    async fn set(&self, key: &str, environments: &[Environment]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(environments)?;
        let dir = self.dir.clone();
        let target = self.path_for(key);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            debug!("wrote {} bytes to {}", bytes.len(), target.display());
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::environment_template;

    #[tokio::test]
    async fn writes_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.get("environments").await.unwrap().is_none());

        let env = environment_template();
        store.set("environments", &[env.clone()]).await.unwrap();
        assert!(store.path_for("environments").exists());

        let raw = store.get("environments").await.unwrap().unwrap();
        assert_eq!(raw[0].clone().finalize(), env);
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .set("environments", &[environment_template(), environment_template()])
            .await
            .unwrap();
        store.set("environments", &[]).await.unwrap();
        assert_eq!(store.get("environments").await.unwrap().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(store.path_for("environments"), b"{not json").unwrap();
        let err = store.get("environments").await.unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }
}
