use async_trait::async_trait;
use super::types::{ApiConfig, UploadRecord};
use super::errors::Result;

/// 接口配置存储
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// 读取配置，配置不存在时返回 `UploadError::ConfigNotFound`
    async fn load_config(&self) -> Result<ApiConfig>;

    /// 保存配置
    async fn save_config(&self, config: &ApiConfig) -> Result<()>;
}

/// 历史记录存储
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 追加一条记录
    async fn save_record(&self, record: &UploadRecord) -> Result<()>;

    /// 读取全部记录，顺序由存储决定
    async fn load_history(&self) -> Result<Vec<UploadRecord>>;

    /// 按 id 删除记录
    async fn delete_record(&self, id: &str) -> Result<()>;

    /// 清空全部记录
    async fn clear_history(&self) -> Result<()>;
}

/// 外部传输命令
#[async_trait]
pub trait TransferCommand: Send + Sync {
    /// 上传 base64 编码的文件内容，返回远程 URL
    async fn upload_file_base64(
        &self,
        file_name: &str,
        file_content_base64: String,
        api_url: &str,
    ) -> Result<String>;
}
