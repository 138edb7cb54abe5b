//! Settings persistence
//!
//! One JSON document at `~/.sshtabs/settings.json`. A missing file means
//! defaults; an unreadable one is moved aside so the next save starts clean.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::types::{Settings, CONFIG_VERSION};

const CONFIG_DIR_NAME: &str = ".sshtabs";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("No home directory to keep settings in")]
    NoHomeDir,

    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings were written by a newer sshtabs (version {found}, this build reads up to {supported})")]
    VersionTooNew { found: u32, supported: u32 },
}

/// `~/.sshtabs`
pub fn config_dir() -> Result<PathBuf, StorageError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(StorageError::NoHomeDir)
}

pub fn settings_file() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// Refuse documents written by a newer build.
fn check_version(settings: &Settings) -> Result<(), StorageError> {
    if settings.version > CONFIG_VERSION {
        return Err(StorageError::VersionTooNew {
            found: settings.version,
            supported: CONFIG_VERSION,
        });
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| SETTINGS_FILE_NAME.into());
    name.push(suffix);
    path.with_file_name(name)
}

pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self::with_path(settings_file()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings, falling back to defaults.
    ///
    /// Only I/O errors other than "not found" and a too-new version fail.
    pub async fn load(&self) -> Result<Settings, StorageError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {:?}, using defaults", self.path);
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        let settings = match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => settings,
            Err(parse_err) => {
                tracing::warn!("Unreadable settings at {:?}: {}", self.path, parse_err);
                match self.quarantine().await {
                    Ok(moved_to) => tracing::warn!("Moved them to {:?}", moved_to),
                    Err(e) => tracing::error!("Could not move unreadable settings aside: {}", e),
                }
                return Ok(Settings::default());
            }
        };
        check_version(&settings)?;
        Ok(settings)
    }

    /// Write the settings through a temp file so a crash never truncates them.
    pub async fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_vec_pretty(settings)?;
        let staging = sibling(&self.path, ".tmp");
        {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
        }
        fs::rename(&staging, &self.path).await?;

        tracing::debug!("Settings saved to {:?}", self.path);
        Ok(())
    }

    /// Rename the current file to `settings.json.corrupt-<timestamp>`.
    async fn quarantine(&self) -> Result<PathBuf, StorageError> {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let target = sibling(&self.path, &format!(".corrupt-{}", stamp));
        fs::rename(&self.path, &target).await?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("settings.json"));

        assert_eq!(storage.load().await.unwrap(), Settings::default());
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn test_save_creates_dir_and_reloads() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("nested").join("settings.json"));

        let settings = Settings {
            history_limit: 5,
            default_path: "/srv".to_string(),
            ..Settings::default()
        };
        storage.save(&settings).await.unwrap();

        assert_eq!(storage.load().await.unwrap(), settings);
        assert!(!temp.path().join("nested").join("settings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_moved_aside() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let storage = ConfigStorage::with_path(path.clone());

        assert_eq!(storage.load().await.unwrap(), Settings::default());
        assert!(!path.exists());

        let moved: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(moved.len(), 1);
        assert!(moved[0].starts_with("settings.json.corrupt-"));
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{ "version": 99 }"#).unwrap();
        let storage = ConfigStorage::with_path(path.clone());

        assert!(matches!(
            storage.load().await,
            Err(StorageError::VersionTooNew { found: 99, .. })
        ));
        // Left alone for the newer build
        assert!(path.exists());
    }
}
