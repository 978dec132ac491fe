use crate::domain_port::*;
use dashmap::DashMap;

/// Process-lifetime credential storage. Nothing is written to disk.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn set_many(&self, batch: &[(&str, &str)]) -> Result<(), CredentialStoreError> {
        for &(key, value) in batch {
            self.entries.insert(key.to_owned(), value.to_owned());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CredentialStoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
