use thiserror::Error;

/// 配置校验错误（本地校验，不会触达存储）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("API URL must not be empty")]
    EmptyUrl,

    #[error("API URL is not a valid absolute URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("please configure the upload endpoint first")]
    NotConfigured,

    #[error("please select files to upload first")]
    EmptyQueue,

    #[error("an upload run is already in progress")]
    Busy,

    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    #[error("config file does not exist")]
    ConfigNotFound,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File '{0}' is already uploading and cannot be removed")]
    NotRemovable(String),

    #[error("Upload was cancelled")]
    Cancelled,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP Request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::UploadFailed(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 错误的原始描述，不带分类前缀
    ///
    /// 进度记录里只保存外部返回的消息，例如 `network error`
    pub fn message(&self) -> String {
        match self {
            Self::Store(message)
            | Self::UploadFailed(message)
            | Self::NotFound(message)
            | Self::Internal(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
