use std::sync::Arc;
use tracing::debug;
use crate::core::{
    ConfigProvider, ConfigStore, HistoryReconciler, OrchestratorConfig, RecordStore, Result,
    TransferCommand, Transport, UploadOrchestrator, UploadStore,
};
use crate::settings::Settings;
use crate::storage::JsonFileStore;
use crate::uploaders::MultipartUploader;

/// 组装好的应用：配置、编排器和历史记录共用同一套外部后端
pub struct UploadApp {
    pub config: Arc<ConfigProvider>,
    pub orchestrator: UploadOrchestrator,
    pub history: HistoryReconciler,
}

impl UploadApp {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        records: Arc<dyn RecordStore>,
        transfer: Arc<dyn TransferCommand>,
        settings: OrchestratorConfig,
    ) -> Self {
        let config = Arc::new(ConfigProvider::new(config_store));
        let orchestrator = UploadOrchestrator::new(
            config.clone(),
            Transport::new(transfer),
            records.clone(),
            UploadStore::shared(),
            settings,
        );

        Self {
            config,
            orchestrator,
            history: HistoryReconciler::new(records),
        }
    }

    /// 使用本地 JSON 存储和 multipart 上传器
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let data_dir = settings.data_dir()?;
        debug!(data_dir = %data_dir.display(), "using local data directory");

        let store = Arc::new(JsonFileStore::new(data_dir));
        let uploader = Arc::new(MultipartUploader::new(settings.request_timeout())?);

        Ok(Self::new(store.clone(), store, uploader, settings.orchestrator()))
    }

    /// 启动时加载一次接口配置
    pub async fn init(&self) -> Result<bool> {
        self.config.load().await?;
        Ok(self.config.is_configured().await)
    }
}
