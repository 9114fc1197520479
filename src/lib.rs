pub mod app;
pub mod core;
pub mod selector;
pub mod settings;
pub mod storage;
pub mod uploaders;
pub mod utils;

// 重新导出核心类型
pub use core::{
    ApiConfig,
    ConfigProvider,
    FileId,
    HistoryReconciler,
    InsertMode,
    OrchestratorConfig,
    ProgressRecord,
    ProgressStatus,
    QueuedFile,
    Result,
    RunReport,
    UploadError,
    UploadEvent,
    UploadOrchestrator,
    UploadRecord,
    UploadResult,
    UploadStore,
};

pub use app::UploadApp;
pub use settings::Settings;
pub use storage::JsonFileStore;
pub use uploaders::MultipartUploader;
