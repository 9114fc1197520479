use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use super::errors::{ConfigValidationError, Result, UploadError};
use super::traits::ConfigStore;
use super::types::ApiConfig;

/// 校验 API URL：非空且是合法的绝对 URL
pub fn validate_api_url(api_url: &str) -> Result<Url, ConfigValidationError> {
    let trimmed = api_url.trim();
    if trimmed.is_empty() {
        return Err(ConfigValidationError::EmptyUrl);
    }

    Url::parse(trimmed).map_err(|err| ConfigValidationError::InvalidUrl(format!("{}: {}", trimmed, err)))
}

/// 配置状态快照
#[derive(Debug, Clone, Default)]
pub struct ConfigState {
    pub config: Option<ApiConfig>,
    pub configured: bool,
    pub loading: bool,
    /// 最近一次加载 / 保存的错误
    pub error: Option<String>,
}

/// 接口配置提供者
pub struct ConfigProvider {
    store: Arc<dyn ConfigStore>,
    state: RwLock<ConfigState>,
}

impl ConfigProvider {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            state: RwLock::new(ConfigState::default()),
        }
    }

    /// 从外部存储加载配置
    ///
    /// 配置不存在时进入未配置状态，不算错误
    pub async fn load(&self) -> Result<()> {
        self.begin().await;

        let loaded = self.store.load_config().await;
        let mut state = self.state.write().await;
        state.loading = false;

        match loaded {
            Ok(config) => {
                info!(api_url = %config.api_url, "upload endpoint loaded");
                state.config = Some(config);
                state.configured = true;
                Ok(())
            }
            Err(UploadError::ConfigNotFound) => {
                debug!("no upload endpoint configured yet");
                state.config = None;
                state.configured = false;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to load upload endpoint");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// 校验并保存配置，校验失败不会调用存储
    pub async fn save(&self, config: ApiConfig) -> Result<()> {
        let url = validate_api_url(&config.api_url)?;
        let config = ApiConfig::new(config.api_url.trim());

        self.begin().await;
        let saved = self.store.save_config(&config).await;
        let mut state = self.state.write().await;
        state.loading = false;

        match saved {
            Ok(()) => {
                info!(api_url = %url, "upload endpoint saved");
                state.config = Some(config);
                state.configured = true;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to save upload endpoint");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn current(&self) -> Option<ApiConfig> {
        self.state.read().await.config.clone()
    }

    pub async fn is_configured(&self) -> bool {
        self.state.read().await.configured
    }

    pub async fn snapshot(&self) -> ConfigState {
        self.state.read().await.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.loading = true;
        state.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryConfigStore {
        config: Mutex<Option<ApiConfig>>,
        fail_with: Mutex<Option<String>>,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl ConfigStore for MemoryConfigStore {
        async fn load_config(&self) -> Result<ApiConfig> {
            if let Some(message) = self.fail_with.lock().unwrap().clone() {
                return Err(UploadError::store(message));
            }
            self.config.lock().unwrap().clone().ok_or(UploadError::ConfigNotFound)
        }

        async fn save_config(&self, config: &ApiConfig) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = self.fail_with.lock().unwrap().clone() {
                return Err(UploadError::store(message));
            }
            *self.config.lock().unwrap() = Some(config.clone());
            Ok(())
        }
    }

    #[test]
    fn test_validate_api_url() {
        assert!(validate_api_url("https://img.example.com/upload").is_ok());
        assert_eq!(validate_api_url("   "), Err(ConfigValidationError::EmptyUrl));
        assert!(matches!(validate_api_url("not-a-url"), Err(ConfigValidationError::InvalidUrl(_))));
        assert!(matches!(validate_api_url("/relative/path"), Err(ConfigValidationError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_load_not_found_is_unconfigured() {
        let provider = ConfigProvider::new(Arc::new(MemoryConfigStore::default()));
        provider.load().await.unwrap();

        let state = provider.snapshot().await;
        assert!(!state.configured);
        assert!(state.config.is_none());
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_reload_after_config_removed_drops_cached_endpoint() {
        let store = Arc::new(MemoryConfigStore::default());
        let provider = ConfigProvider::new(store.clone());
        provider.save(ApiConfig::new("https://img.example.com/upload")).await.unwrap();
        assert!(provider.is_configured().await);

        *store.config.lock().unwrap() = None;
        provider.load().await.unwrap();

        assert!(!provider.is_configured().await);
        assert!(provider.current().await.is_none());
    }

    #[tokio::test]
    async fn test_load_other_failure_sets_error() {
        let store = Arc::new(MemoryConfigStore::default());
        *store.fail_with.lock().unwrap() = Some("disk unreadable".to_string());
        let provider = ConfigProvider::new(store);

        assert!(provider.load().await.is_err());
        let state = provider.snapshot().await;
        assert!(state.error.unwrap().contains("disk unreadable"));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_url_without_store_call() {
        let store = Arc::new(MemoryConfigStore::default());
        let provider = ConfigProvider::new(store.clone());

        let err = provider.save(ApiConfig::new("not-a-url")).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidConfig(ConfigValidationError::InvalidUrl(_))));
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert!(!provider.is_configured().await);
    }

    #[tokio::test]
    async fn test_save_success_then_store_failure_keeps_prior_config() {
        let store = Arc::new(MemoryConfigStore::default());
        let provider = ConfigProvider::new(store.clone());

        provider.save(ApiConfig::new("https://a.example.com/up")).await.unwrap();
        assert!(provider.is_configured().await);

        *store.fail_with.lock().unwrap() = Some("read-only".to_string());
        assert!(provider.save(ApiConfig::new("https://b.example.com/up")).await.is_err());

        let state = provider.snapshot().await;
        assert_eq!(state.config.unwrap().api_url, "https://a.example.com/up");
        assert!(state.error.is_some());

        // 新的操作开始时清除上一次的错误
        *store.fail_with.lock().unwrap() = None;
        provider.save(ApiConfig::new("https://b.example.com/up")).await.unwrap();
        assert!(provider.snapshot().await.error.is_none());
    }
}
