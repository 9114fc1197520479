use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::errors::{Result, UploadError};

/// 队列中文件的唯一标识（每次入队生成）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 生成上传结果 / 历史记录的 id
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 文件内容来源
#[derive(Debug, Clone)]
pub enum FileSource {
    /// 本地文件路径
    Path(PathBuf),
    /// 内存中的内容（没有文件系统路径，例如拖拽进来的数据）
    Memory(Bytes),
}

/// 待上传文件
#[derive(Debug, Clone)]
pub struct QueuedFile {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub source: FileSource,
}

impl QueuedFile {
    /// 从本地路径创建，MIME 类型按扩展名推断
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::NotFound(format!("{} is not a file", path.display())));
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| UploadError::internal(format!("Invalid file name: {}", path.display())))?
            .to_string();

        let mime = crate::selector::guess_mime(path)
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

        Ok(Self {
            id: FileId::new(),
            name,
            size: metadata.len(),
            mime,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            id: FileId::new(),
            name: name.into(),
            size: content.len() as u64,
            mime: mime.into(),
            source: FileSource::Memory(content),
        }
    }

    /// 本地路径，内存来源时为空字符串
    pub fn local_path(&self) -> String {
        match &self.source {
            FileSource::Path(path) => path.display().to_string(),
            FileSource::Memory(_) => String::new(),
        }
    }

    /// 读取完整文件内容
    pub async fn read(&self) -> Result<Bytes> {
        match &self.source {
            FileSource::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            FileSource::Memory(content) => Ok(content.clone()),
        }
    }
}

/// 单个文件的上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// 等待中（在队列中）
    Pending,
    /// 上传中
    Uploading,
    /// 已完成
    Success,
    /// 失败
    Error,
    /// 已取消
    Cancelled,
}

/// 进度记录，与队列中的文件一一对应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub file_id: FileId,
    pub file_name: String,
    pub percent: u8,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    pub fn pending(file: &QueuedFile) -> Self {
        Self {
            file_id: file.id,
            file_name: file.name.clone(),
            percent: 0,
            status: ProgressStatus::Pending,
            error: None,
        }
    }

    /// 合并部分更新
    ///
    /// 同一次尝试内百分比只增不减；进入 `Uploading` 视为新一次尝试，百分比重置
    pub fn apply(&mut self, update: &ProgressUpdate) {
        let new_attempt = update.status == Some(ProgressStatus::Uploading)
            && self.status != ProgressStatus::Uploading;

        if let Some(status) = update.status {
            self.status = status;
        }

        if new_attempt {
            self.percent = update.percent.unwrap_or(0).min(100);
            self.error = None;
        } else if let Some(percent) = update.percent {
            self.percent = self.percent.max(percent.min(100));
        }

        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }
    }
}

/// 进度记录的部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub status: Option<ProgressStatus>,
    pub error: Option<String>,
}

impl ProgressUpdate {
    pub fn percent(percent: u8) -> Self {
        Self { percent: Some(percent), ..Default::default() }
    }

    pub fn status(status: ProgressStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
}

/// 上传结果（内存中，camelCase）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub local_path: String,
    pub upload_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: ResultStatus,
}

impl UploadResult {
    pub fn success(file: &QueuedFile, upload_url: String) -> Self {
        Self {
            id: generate_id(),
            file_name: file.name.clone(),
            file_size: file.size,
            local_path: file.local_path(),
            upload_url,
            uploaded_at: Utc::now(),
            status: ResultStatus::Success,
        }
    }
}

/// 历史记录（外部存储，snake_case）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub local_path: String,
    pub upload_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: ResultStatus,
}

impl From<UploadResult> for UploadRecord {
    fn from(result: UploadResult) -> Self {
        Self {
            id: result.id,
            file_name: result.file_name,
            file_size: result.file_size,
            local_path: result.local_path,
            upload_url: result.upload_url,
            uploaded_at: result.uploaded_at,
            status: result.status,
        }
    }
}

impl From<UploadRecord> for UploadResult {
    fn from(record: UploadRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name,
            file_size: record.file_size,
            local_path: record.local_path,
            upload_url: record.upload_url,
            uploaded_at: record.uploaded_at,
            status: record.status,
        }
    }
}

/// 上传接口配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "apiUrl")]
    pub api_url: String,
}

impl ApiConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self { api_url: api_url.into() }
    }
}

/// 上传成功后结果列表的写入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// 不论历史记录是否写入成功都加入结果列表
    Optimistic,
    /// 历史记录写入成功后才加入结果列表
    #[default]
    PersistedConfirmed,
}

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 一轮上传结束后清空队列前的等待时间
    pub auto_clear_delay: Duration,
    /// 批量模式的并发宽度
    pub batch_concurrency: usize,
    pub insert_mode: InsertMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_clear_delay: Duration::from_secs(2),
            batch_concurrency: 3,
            insert_mode: InsertMode::default(),
        }
    }
}

/// 上传事件
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 文件入队
    Enqueued {
        file_id: FileId,
    },

    /// 状态变更
    StateChanged {
        file_id: FileId,
        old_state: ProgressStatus,
        new_state: ProgressStatus,
    },

    /// 进度检查点
    Progress {
        file_id: FileId,
        percent: u8,
    },

    /// 上传完成
    Completed {
        file_id: FileId,
        result: UploadResult,
    },

    /// 上传失败
    Failed {
        file_id: FileId,
        error: String,
    },

    /// 历史记录写入失败
    PersistFailed {
        result_id: String,
        error: String,
    },

    /// 一轮上传结束
    RunFinished {
        succeeded: usize,
        failed: usize,
    },

    /// 队列已清空
    QueueCleared,
}

/// 一轮顺序上传的汇总
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// 已加入结果列表的上传结果
    pub succeeded: Vec<UploadResult>,
    pub failed: Vec<(FileId, String)>,
    pub cancelled: Vec<FileId>,
    /// 传输成功但历史记录写入失败
    pub persist_failures: Vec<(UploadResult, String)>,
}

/// 批量并发上传的汇总
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// 文件名 -> 远程 URL
    pub urls: HashMap<String, String>,
    pub failures: Vec<(QueuedFile, UploadError)>,
}
