use crate::domain_port::*;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Credentials kept as a flat JSON object in a single file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous contents intact.
pub struct FileCredentialStore {
    path: PathBuf,
    prefix: String,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        FileCredentialStore {
            path: path.into(),
            prefix: prefix.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, CredentialStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CredentialStoreError::Corrupt(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| CredentialStoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        Ok(entries.get(&self.key(key)).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(self.key(key), value.to_owned());
        self.persist(&entries).await
    }

    async fn set_many(&self, batch: &[(&str, &str)]) -> Result<(), CredentialStoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        for &(key, value) in batch {
            entries.insert(self.key(key), value.to_owned());
        }
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), CredentialStoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(&self.key(key)).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}
