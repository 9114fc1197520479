use std::time::Duration;
use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use crate::core::{Result, TransferCommand, UploadError};

/// 图床接口响应
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub code: i32,
    pub msg: String,
    pub result: String,
}

/// multipart 表单上传器
///
/// 表单字段：`file`（文件内容）和 `expireTime=-1`
#[derive(Debug, Clone)]
pub struct MultipartUploader {
    client: Client,
}

impl MultipartUploader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

/// 解析接口响应，`code == 0` 时 `result` 即远程 URL
pub fn parse_response(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        return Err(UploadError::upload_failed(format!("HTTP {}: {}", status.as_u16(), body)));
    }

    let response: UploadResponse = serde_json::from_str(body).map_err(|err| {
        UploadError::upload_failed(format!("failed to parse response: {} - body: {}", err, body))
    })?;

    if response.code == 0 {
        Ok(response.result)
    } else {
        Err(UploadError::upload_failed(format!("{}: {}", response.code, response.msg)))
    }
}

#[async_trait]
impl TransferCommand for MultipartUploader {
    async fn upload_file_base64(
        &self,
        file_name: &str,
        file_content_base64: String,
        api_url: &str,
    ) -> Result<String> {
        let content = BASE64_STANDARD.decode(file_content_base64)?;
        debug!(file = file_name, bytes = content.len(), "posting multipart upload");

        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())?;

        let form = Form::new()
            .part("file", part)
            .text("expireTime", "-1");

        let response = self.client
            .post(api_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        parse_response(status, &body)
    }
}
