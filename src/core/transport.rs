use std::sync::Arc;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use tokio::sync::mpsc;
use tracing::debug;
use super::errors::{Result, UploadError};
use super::traits::TransferCommand;
use super::types::{ApiConfig, QueuedFile};

/// 开始读取文件
pub const PROGRESS_READ_STARTED: u8 = 10;
/// 编码完成
pub const PROGRESS_ENCODED: u8 = 30;
/// 开始传输
pub const PROGRESS_TRANSFER_STARTED: u8 = 50;
/// 传输完成
pub const PROGRESS_COMPLETE: u8 = 100;

/// 进度检查点的数量，进度通道按此容量创建
pub const PROGRESS_CHECKPOINTS: usize = 4;

/// 把一个文件转成一个远程 URL
///
/// 进度只有 10 / 30 / 50 / 100 四个检查点，不是按字节的连续进度
#[derive(Clone)]
pub struct Transport {
    command: Arc<dyn TransferCommand>,
}

impl Transport {
    pub fn new(command: Arc<dyn TransferCommand>) -> Self {
        Self { command }
    }

    /// 上传单个文件，不做重试
    ///
    /// 任何阶段的失败都转换为 `UploadError::UploadFailed`，保留外部消息
    pub async fn upload(
        &self,
        file: &QueuedFile,
        config: &ApiConfig,
        progress_tx: mpsc::Sender<u8>,
    ) -> Result<String> {
        self.run(file, config, &progress_tx)
            .await
            .map_err(|err| match err {
                UploadError::UploadFailed(_) | UploadError::Cancelled => err,
                other => UploadError::UploadFailed(other.message()),
            })
    }

    async fn run(&self, file: &QueuedFile, config: &ApiConfig, progress_tx: &mpsc::Sender<u8>) -> Result<String> {
        report(progress_tx, PROGRESS_READ_STARTED).await;
        let content = file.read().await?;

        // 大文件编码耗时较长，放到阻塞线程池
        let encoded = tokio::task::spawn_blocking(move || BASE64_STANDARD.encode(&content))
            .await
            .map_err(|err| UploadError::internal(format!("Encoder panic: {}", err)))?;
        report(progress_tx, PROGRESS_ENCODED).await;

        report(progress_tx, PROGRESS_TRANSFER_STARTED).await;
        debug!(file = %file.name, encoded_len = encoded.len(), "submitting file to transfer command");
        let url = self.command
            .upload_file_base64(&file.name, encoded, &config.api_url)
            .await?;
        report(progress_tx, PROGRESS_COMPLETE).await;

        Ok(url)
    }
}

async fn report(progress_tx: &mpsc::Sender<u8>, percent: u8) {
    // 接收方已经不关心进度时忽略
    let _ = progress_tx.send(percent).await;
}
