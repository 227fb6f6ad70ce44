use crate::core::error::StoreError;
use crate::core::model::HistoryRecord;
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_HISTORY_FILE: &str = "history.json";

/// `~/Downloads/youtube_downloads`, or relative to the working directory when
/// there is no home directory.
pub fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join("youtube_downloads")
}

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
    };
    serde_json::from_slice(&raw).map_err(|source| StoreError::Json { path: path.to_path_buf(), source })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let body = serde_json::to_vec_pretty(value)
        .map_err(|source| StoreError::Json { path: path.to_path_buf(), source })?;
    tokio::fs::write(path, body).await.map_err(io_err)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    /// Keys this program does not know about survive a load/save cycle.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Config, StoreError> {
        read_json(&self.path).await
    }

    pub async fn save(&self, config: &Config) -> Result<(), StoreError> {
        write_json(&self.path, config).await
    }

    pub async fn set_download_dir(&self, dir: &Path) -> Result<(), StoreError> {
        let mut config = self.load().await?;
        config.download_dir = Some(dir.to_path_buf());
        self.save(&config).await
    }
}

/// Append-only log of finished downloads, one JSON array on disk.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        read_json(&self.path).await
    }

    pub async fn save(&self, records: &[HistoryRecord]) -> Result<(), StoreError> {
        write_json(&self.path, records).await
    }

    pub async fn add_record(
        &self,
        title: &str,
        format: &str,
        path: &Path,
        url: &str,
    ) -> Result<HistoryRecord, StoreError> {
        let record = HistoryRecord {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            title: title.to_string(),
            format: format.to_string(),
            path: path.to_string_lossy().to_string(),
            url: url.to_string(),
        };
        let mut records = self.load().await?;
        records.push(record.clone());
        self.save(&records).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::open(dir.path().join("config.json")).load().await.unwrap();
        assert_eq!(config, Config::default());
        let history = HistoryStore::open(dir.path().join("history.json")).load().await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn history_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("nested").join("history.json"));
        store.add_record("First", "mp4", Path::new("/tmp/a.mp4"), "https://youtu.be/a").await.unwrap();
        let second = store.add_record("Second", "mp3", Path::new("/tmp/b.mp3"), "https://youtu.be/b").await.unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "First");
        assert_eq!(records[1], second);
        assert_eq!(second.timestamp.len(), "2024-01-01 00:00:00".len());
    }

    #[tokio::test]
    async fn config_keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, br#"{"theme":"dark","download_dir":"/old"}"#).await.unwrap();

        let store = ConfigStore::open(&path);
        store.set_download_dir(Path::new("/new/place")).await.unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.download_dir.as_deref(), Some(Path::new("/new/place")));
        assert_eq!(config.extra.get("theme"), Some(&serde_json::json!("dark")));
    }

    #[tokio::test]
    async fn malformed_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(matches!(HistoryStore::open(&path).load().await, Err(StoreError::Json { .. })));
    }
}
