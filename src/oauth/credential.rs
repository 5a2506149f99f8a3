//! Installation credential
//!
//! The client id/secret pair registered for this installation lives in the
//! `General` section of the record store.

use crate::config::settings::GENERAL_SECTION;
use crate::config::{ConfigStore, Credential, StorageError};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    store: ConfigStore,
}

impl CredentialStore {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Option<Credential>, StorageError> {
        self.store.load_record(GENERAL_SECTION).await
    }

    pub async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.store.save_record(GENERAL_SECTION, credential).await
    }

    /// Display name used when registering, e.g. `OAuth SSH Client [alice@laptop]`
    pub fn client_name() -> String {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        format!("OAuth SSH Client [{}@{}]", whoami::username(), host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let store = ConfigStore::with_path(temp.path().join("store.json"));
        let credentials = CredentialStore::new(store.clone());

        assert!(credentials.load().await.unwrap().is_none());

        let cred = Credential {
            client: "client-id".into(),
            secret: "secret".into(),
        };
        credentials.save(&cred).await.unwrap();
        assert_eq!(credentials.load().await.unwrap(), Some(cred));

        // Host sections are unaffected
        assert!(store.load_section("ssh.example.org").await.unwrap().is_empty());
    }

    #[test]
    fn test_client_name() {
        let name = CredentialStore::client_name();
        assert!(name.starts_with("OAuth SSH Client ["));
        assert!(name.ends_with(']'));
        assert!(name.contains('@'));
    }
}
