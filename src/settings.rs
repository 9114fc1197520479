//! 应用设置
//!
//! 从 TOML 文件读取，所有字段都有默认值：
//!
//! ```toml
//! data_dir = "/home/me/.config/com.upload-img.app"
//! auto_clear_delay_secs = 2
//! batch_concurrency = 3
//! insert_mode = "persisted_confirmed"   # 或 "optimistic"
//! request_timeout_secs = 300
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use crate::core::{InsertMode, OrchestratorConfig, Result, UploadError};

/// 默认设置文件名
pub const SETTINGS_FILE: &str = "upload-img.toml";
/// 指定设置文件路径的环境变量
pub const SETTINGS_ENV: &str = "UPLOAD_IMG_CONFIG";
/// 应用数据目录名
pub const APP_DIR_NAME: &str = "com.upload-img.app";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub auto_clear_delay_secs: u64,
    pub batch_concurrency: usize,
    pub insert_mode: InsertMode,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            auto_clear_delay_secs: 2,
            batch_concurrency: 3,
            insert_mode: InsertMode::PersistedConfirmed,
            request_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// 读取 `$UPLOAD_IMG_CONFIG` 或当前目录下的 `upload-img.toml`，文件不存在时使用默认值
    pub fn load() -> Result<Settings> {
        let path = env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Settings> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Settings> {
        Ok(toml::from_str(content)?)
    }

    /// 数据目录，未配置时使用平台默认目录
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => app_data_dir(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            auto_clear_delay: Duration::from_secs(self.auto_clear_delay_secs),
            batch_concurrency: self.batch_concurrency.max(1),
            insert_mode: self.insert_mode,
        }
    }
}

/// 平台默认的应用数据目录，即 `dirs::config_dir()` 下的 `com.upload-img.app`
///
/// - macOS: `~/Library/Application Support/com.upload-img.app`
/// - Windows: `%APPDATA%\com.upload-img.app`
/// - 其他: `$XDG_CONFIG_HOME/com.upload-img.app`，未设置时为 `~/.config/com.upload-img.app`
pub fn app_data_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base_dir| base_dir.join(APP_DIR_NAME))
        .ok_or_else(|| UploadError::internal("could not determine the config directory"))
}
