//! File-backed Wi-Fi credentials store.
//!
//! The credentials are a two-key TOML file:
//!
//! ```toml
//! ssid = "home"
//! password = "secret1"
//! ```
//!
//! A missing file means "nothing stored" and loads as empty credentials,
//! which sends the device into provisioning mode.  `clear` deletes the file.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::ports::{CredentialStore, CredentialStoreError};
use crate::domain::Credentials;

/// [`CredentialStore`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct TomlCredentialStore {
    path: PathBuf,
}

impl TomlCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialStoreError {
        CredentialStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for TomlCredentialStore {
    fn load(&self) -> Result<Credentials, CredentialStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Credentials::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let content = toml::to_string(credentials)?;
        std::fs::write(&self.path, content).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "Credentials written");
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials erased");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (TomlCredentialStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("modbus_bridge_creds_{}", uuid::Uuid::new_v4()));
        (TomlCredentialStore::new(dir.join("credentials.toml")), dir)
    }

    #[test]
    fn test_missing_file_loads_empty_credentials() {
        let (store, _dir) = temp_store();
        let creds = store.load().expect("load");
        assert!(!creds.is_complete());
    }

    #[test]
    fn test_save_then_load_returns_same_credentials() {
        // Arrange
        let (store, dir) = temp_store();
        let creds = Credentials::new("home", "secret1");

        // Act
        store.save(&creds).expect("save");
        let loaded = store.load().expect("load");

        // Assert
        assert_eq!(loaded, creds);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_clear_erases_and_is_idempotent() {
        // Arrange
        let (store, dir) = temp_store();
        store.save(&Credentials::new("home", "secret1")).expect("save");

        // Act
        tokio_test::assert_ok!(store.clear());
        tokio_test::assert_ok!(store.clear());

        // Assert
        assert_eq!(store.load().expect("load"), Credentials::default());
        assert!(!store.path().exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_garbage_file_is_a_parse_error() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "ssid = [unterminated").unwrap();

        let err = tokio_test::assert_err!(store.load());

        assert!(matches!(err, CredentialStoreError::Parse(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_with_only_ssid_loads_incomplete() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "ssid = \"home\"\n").unwrap();

        let creds = store.load().expect("load");

        assert_eq!(creds.ssid, "home");
        assert!(!creds.is_complete());
        std::fs::remove_dir_all(&dir).ok();
    }
}
