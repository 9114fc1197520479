use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use super::errors::Result;
use super::traits::RecordStore;
use super::types::UploadRecord;

/// 历史记录视图，独立于上传队列和结果列表
pub struct HistoryReconciler {
    records: Arc<dyn RecordStore>,
    view: RwLock<Vec<UploadRecord>>,
}

impl HistoryReconciler {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            view: RwLock::new(Vec::new()),
        }
    }

    /// 从存储重新加载，保持存储返回的顺序
    pub async fn list(&self) -> Result<Vec<UploadRecord>> {
        let records = self.records.load_history().await.inspect_err(|err| {
            error!(error = %err, "failed to load upload history");
        })?;

        *self.view.write().await = records.clone();
        Ok(records)
    }

    /// 先删除远端，成功后再从本地视图移除
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.records.delete_record(id).await.inspect_err(|err| {
            error!(id, error = %err, "failed to delete upload record");
        })?;

        self.view.write().await.retain(|record| record.id != id);
        Ok(())
    }

    /// 清空远端和本地视图
    pub async fn clear(&self) -> Result<()> {
        self.records.clear_history().await.inspect_err(|err| {
            error!(error = %err, "failed to clear upload history");
        })?;

        self.view.write().await.clear();
        Ok(())
    }

    pub async fn records(&self) -> Vec<UploadRecord> {
        self.view.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.view.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.view.read().await.is_empty()
    }

    /// 当前视图序列化为 JSON
    pub async fn export_json(&self) -> Result<String> {
        let view = self.view.read().await;
        Ok(serde_json::to_string_pretty(&*view)?)
    }

    /// 导出到目录，文件名 `upload-history-<毫秒时间戳>.json`
    pub async fn export_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let data = self.export_json().await?;
        let file_name = format!("upload-history-{}.json", chrono::Utc::now().timestamp_millis());
        let path = dir.as_ref().join(file_name);

        tokio::fs::write(&path, data).await?;
        info!(path = %path.display(), "upload history exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use crate::core::errors::UploadError;
    use crate::core::types::ResultStatus;

    #[derive(Default)]
    struct MemoryRecordStore {
        records: Mutex<Vec<UploadRecord>>,
        fail_delete: bool,
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn save_record(&self, record: &UploadRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn load_history(&self) -> Result<Vec<UploadRecord>> {
            Ok(self.records.lock().unwrap().clone())
        }

        async fn delete_record(&self, id: &str) -> Result<()> {
            if self.fail_delete {
                return Err(UploadError::store("write failed"));
            }
            self.records.lock().unwrap().retain(|record| record.id != id);
            Ok(())
        }

        async fn clear_history(&self) -> Result<()> {
            self.records.lock().unwrap().clear();
            Ok(())
        }
    }

    fn record(id: &str) -> UploadRecord {
        UploadRecord {
            id: id.to_string(),
            file_name: format!("{}.png", id),
            file_size: 42,
            local_path: String::new(),
            upload_url: format!("https://img.example.com/{}.png", id),
            uploaded_at: chrono::Utc::now(),
            status: ResultStatus::Success,
        }
    }

    fn seeded(fail_delete: bool) -> Arc<MemoryRecordStore> {
        Arc::new(MemoryRecordStore {
            records: Mutex::new(vec![record("b"), record("a"), record("c")]),
            fail_delete,
        })
    }

    #[tokio::test]
    async fn test_list_keeps_store_order() {
        let history = HistoryReconciler::new(seeded(false));
        let ids: Vec<_> = history.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(history.len().await, 3);
    }

    #[tokio::test]
    async fn test_delete_removes_locally_on_success() {
        let history = HistoryReconciler::new(seeded(false));
        history.list().await.unwrap();
        history.delete("a").await.unwrap();

        let ids: Vec<_> = history.records().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_view_unchanged() {
        let history = HistoryReconciler::new(seeded(true));
        history.list().await.unwrap();

        assert!(history.delete("a").await.is_err());
        assert!(history.records().await.iter().any(|r| r.id == "a"));
    }

    #[tokio::test]
    async fn test_export_is_passthrough() {
        let history = HistoryReconciler::new(seeded(false));
        history.list().await.unwrap();

        let exported: Vec<UploadRecord> = serde_json::from_str(&history.export_json().await.unwrap()).unwrap();
        assert_eq!(exported, history.records().await);

        let dir = tempfile::tempdir().unwrap();
        let path = history.export_to(dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("upload-history-") && name.ends_with(".json"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_clear_empties_view() {
        let history = HistoryReconciler::new(seeded(false));
        history.list().await.unwrap();
        history.clear().await.unwrap();
        assert!(history.is_empty().await);
        assert!(history.list().await.unwrap().is_empty());
    }
}
