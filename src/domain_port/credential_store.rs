use tracing::warn;

/// Durable key-value storage that survives process restarts.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialStoreError>;
    async fn remove(&self, key: &str) -> Result<(), CredentialStoreError>;

    /// Writes every entry or none of them.
    ///
    /// The fallback writes one key at a time and restores the earlier keys
    /// when a later write fails. Backends that can persist a batch in one
    /// step override it.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), CredentialStoreError> {
        let mut previous = Vec::with_capacity(entries.len());
        for &(key, _) in entries {
            previous.push((key, self.get(key).await?));
        }

        for (written, &(key, value)) in entries.iter().enumerate() {
            let Err(e) = self.set(key, value).await else {
                continue;
            };
            for (key, old) in &previous[..written] {
                let restored = match old {
                    Some(old) => self.set(key, old).await,
                    None => self.remove(key).await,
                };
                if let Err(e) = restored {
                    warn!(key, error = %e, "failed to roll back credential write");
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage is corrupt: {0}")]
    Corrupt(String),
}
