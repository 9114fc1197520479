//! 本地 JSON 文件存储
//!
//! 目录下的两个文件：
//! - `config.json`：上传接口配置 `{"apiUrl": "..."}`
//! - `history.json`：历史记录 `{"records": [...]}`

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use crate::core::{ApiConfig, ConfigStore, RecordStore, Result, UploadError, UploadRecord};

const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryData {
    records: Vec<UploadRecord>,
}

pub struct JsonFileStore {
    dir: PathBuf,
    /// 串行化历史文件的读-改-写
    history_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            history_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    async fn read_history(&self) -> Result<Vec<UploadRecord>> {
        let path = self.history_path();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }

        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| UploadError::store(format!("failed to read history: {}", err)))?;
        let history: HistoryData = serde_json::from_str(&data)
            .map_err(|err| UploadError::store(format!("failed to parse history: {}", err)))?;

        Ok(history.records)
    }

    async fn write_history(&self, records: Vec<UploadRecord>) -> Result<()> {
        let data = serde_json::to_string_pretty(&HistoryData { records })
            .map_err(|err| UploadError::store(format!("failed to serialize history: {}", err)))?;
        self.write_file(&self.history_path(), data).await
    }

    async fn write_file(&self, path: &Path, data: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| UploadError::store(format!("failed to create directory: {}", err)))?;
        tokio::fs::write(path, data)
            .await
            .map_err(|err| UploadError::store(format!("failed to write {}: {}", path.display(), err)))
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load_config(&self) -> Result<ApiConfig> {
        let path = self.config_path();
        if !tokio::fs::try_exists(&path).await? {
            return Err(UploadError::ConfigNotFound);
        }

        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| UploadError::store(format!("failed to read config: {}", err)))?;

        serde_json::from_str(&data)
            .map_err(|err| UploadError::store(format!("failed to parse config: {}", err)))
    }

    async fn save_config(&self, config: &ApiConfig) -> Result<()> {
        let data = serde_json::to_string_pretty(config)
            .map_err(|err| UploadError::store(format!("failed to serialize config: {}", err)))?;
        self.write_file(&self.config_path(), data).await
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn save_record(&self, record: &UploadRecord) -> Result<()> {
        let _guard = self.history_lock.lock().await;
        let mut records = self.read_history().await?;
        records.push(record.clone());
        debug!(id = %record.id, total = records.len(), "appending upload record");
        self.write_history(records).await
    }

    async fn load_history(&self) -> Result<Vec<UploadRecord>> {
        let _guard = self.history_lock.lock().await;
        self.read_history().await
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        let _guard = self.history_lock.lock().await;
        if !tokio::fs::try_exists(self.history_path()).await? {
            return Ok(());
        }

        let mut records = self.read_history().await?;
        records.retain(|record| record.id != id);
        self.write_history(records).await
    }

    async fn clear_history(&self) -> Result<()> {
        let _guard = self.history_lock.lock().await;
        let path = self.history_path();
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|err| UploadError::store(format!("failed to delete history: {}", err)))?;
        }

        Ok(())
    }
}
