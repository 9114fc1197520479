mod config;
mod errors;
mod history;
mod orchestrator;
mod store;
mod traits;
mod transport;
mod types;

pub use config::{validate_api_url, ConfigProvider, ConfigState};
pub use errors::{ConfigValidationError, Result, UploadError};
pub use history::HistoryReconciler;
pub use orchestrator::UploadOrchestrator;
pub use store::{SharedStore, UploadStore};
pub use traits::{ConfigStore, RecordStore, TransferCommand};
pub use transport::{
    Transport,
    PROGRESS_CHECKPOINTS,
    PROGRESS_COMPLETE,
    PROGRESS_ENCODED,
    PROGRESS_READ_STARTED,
    PROGRESS_TRANSFER_STARTED,
};
pub use types::{
    generate_id,
    ApiConfig,
    BatchOutcome,
    FileId,
    FileSource,
    InsertMode,
    OrchestratorConfig,
    ProgressRecord,
    ProgressStatus,
    ProgressUpdate,
    QueuedFile,
    ResultStatus,
    RunReport,
    UploadEvent,
    UploadRecord,
    UploadResult,
};
