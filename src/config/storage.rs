//! Record Storage
//!
//! One JSON document holding a section per target host. Each section maps a
//! record tag (`Token`, `Policy`, `AccountMap`, `Credential`) to that record's
//! fields, so a host carries at most one record of each type.
//!
//! The file is rewritten wholesale on every save and must stay private to the
//! user (mode 0600).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::types::{Record, RecordError};

/// Current store format version
pub const STORE_VERSION: u32 = 1;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine home directory")]
    NoConfigDir,

    #[error("{0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error parsing store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error(transparent)]
    InvalidRecord(#[from] RecordError),
}

/// Records of one section, keyed by record tag
pub type Section = BTreeMap<String, serde_json::Value>;

/// On-disk document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            sections: BTreeMap::new(),
        }
    }
}

/// Per-host record store
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document; a missing file is an empty store
    pub async fn load(&self) -> Result<StoreFile, StorageError> {
        check_permissions(&self.path).await?;

        match fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(StoreFile::default()),
            Ok(contents) => {
                let file: StoreFile = serde_json::from_str(&contents).map_err(|e| {
                    StorageError::ConfigError(format!(
                        "Error parsing {}: {}",
                        self.path.display(),
                        e
                    ))
                })?;
                if file.version > STORE_VERSION {
                    return Err(StorageError::VersionTooNew {
                        found: file.version,
                        supported: STORE_VERSION,
                    });
                }
                Ok(file)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Replace the document on disk
    pub async fn save(&self, file: &StoreFile) -> Result<(), StorageError> {
        check_permissions(&self.path).await?;

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(file)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut out = options.open(&temp_path).await.map_err(|e| {
            StorageError::ConfigError(format!("Could not open {}: {}", temp_path.display(), e))
        })?;
        out.write_all(json.as_bytes()).await?;
        out.sync_all().await?;
        drop(out);

        // A leftover temp file keeps its old mode through truncate
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&temp_path, &self.path).await?;
        debug!("Saved store to {:?}", self.path);

        Ok(())
    }

    pub async fn load_section(&self, section: &str) -> Result<Section, StorageError> {
        let mut file = self.load().await?;
        Ok(file.sections.remove(section).unwrap_or_default())
    }

    /// Load and validate the record of type `R` in `section`
    pub async fn load_record<R: Record>(&self, section: &str) -> Result<Option<R>, StorageError> {
        let mut values = self.load_section(section).await?;
        match values.remove(R::TAG) {
            Some(value) => Ok(Some(R::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Validate and store `record`, replacing any record of the same type
    pub async fn save_record<R: Record>(&self, section: &str, record: &R) -> Result<(), StorageError> {
        record.validate()?;
        let value = serde_json::to_value(record)?;

        let mut file = self.load().await?;
        file.sections
            .entry(section.to_string())
            .or_default()
            .insert(R::TAG.to_string(), value);
        self.save(&file).await
    }

    pub async fn delete_record<R: Record>(&self, section: &str) -> Result<(), StorageError> {
        let mut file = self.load().await?;
        let removed = file
            .sections
            .get_mut(section)
            .and_then(|values| values.remove(R::TAG))
            .is_some();
        if removed {
            self.save(&file).await?;
        }
        Ok(())
    }

    pub async fn delete_section(&self, section: &str) -> Result<(), StorageError> {
        let mut file = self.load().await?;
        if file.sections.remove(section).is_some() {
            self.save(&file).await?;
        }
        Ok(())
    }
}

/// Refuse files other users could read and paths we could not create
async fn check_permissions(path: &Path) -> Result<(), StorageError> {
    match fs::metadata(path).await {
        Ok(meta) => {
            if !meta.is_file() {
                return Err(StorageError::ConfigError(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }
            #[cfg(unix)]
            {
                use nix::unistd::{access, AccessFlags};
                use std::os::unix::fs::PermissionsExt;

                if access(path, AccessFlags::R_OK | AccessFlags::W_OK).is_err() {
                    return Err(StorageError::ConfigError(format!(
                        "{} has bad permissions, should be 0600",
                        path.display()
                    )));
                }
                // No group/other bits
                if meta.permissions().mode() & 0o077 != 0 {
                    return Err(StorageError::ConfigError(format!(
                        "{} is too permissive, should be 0600",
                        path.display()
                    )));
                }
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            if !fs::metadata(parent).await.map(|m| m.is_dir()).unwrap_or(false) {
                return Err(StorageError::ConfigError(format!(
                    "{} is not a valid path: parent is not a directory",
                    path.display()
                )));
            }
            #[cfg(unix)]
            {
                use nix::unistd::{access, AccessFlags};

                if access(parent, AccessFlags::W_OK | AccessFlags::X_OK).is_err() {
                    return Err(StorageError::ConfigError(format!(
                        "Can not create the store in {}: parent directory permissions are too restrictive",
                        parent.display()
                    )));
                }
            }
            Ok(())
        }
        Err(e) => Err(StorageError::Io(e)),
    }
}
