use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::selector::{select_files, SelectionNotice};
use super::config::ConfigProvider;
use super::errors::{Result, UploadError};
use super::store::SharedStore;
use super::traits::RecordStore;
use super::transport::{Transport, PROGRESS_CHECKPOINTS};
use super::types::{
    ApiConfig, BatchOutcome, FileId, InsertMode, OrchestratorConfig, ProgressStatus,
    ProgressUpdate, QueuedFile, RunReport, UploadEvent, UploadRecord, UploadResult,
};

/// 上传期间持有的忙碌标记，释放时自动复位
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 上传编排器
///
/// 按入队顺序逐个上传队列中的文件，更新进度和结果，并把成功的上传写入历史记录
pub struct UploadOrchestrator {
    config: Arc<ConfigProvider>,
    transport: Transport,
    records: Arc<dyn RecordStore>,
    store: SharedStore,
    settings: OrchestratorConfig,
    busy: Arc<AtomicBool>,
    in_flight: Mutex<HashMap<FileId, CancellationToken>>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl UploadOrchestrator {
    pub fn new(
        config: Arc<ConfigProvider>,
        transport: Transport,
        records: Arc<dyn RecordStore>,
        store: SharedStore,
        settings: OrchestratorConfig,
    ) -> Self {
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);

        Self {
            config,
            transport,
            records,
            store,
            settings,
            busy: Arc::new(AtomicBool::new(false)),
            in_flight: Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 订阅事件
    ///
    /// 接收速度跟不上时会丢失事件（lagged error）
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    /// 过滤非图片文件后入队，一个有效文件都没有时不改动队列
    pub async fn add_files(&self, candidates: Vec<QueuedFile>) -> (Vec<FileId>, Option<SelectionNotice>) {
        let selection = select_files(candidates);
        let notice = selection.notice();
        if let Some(notice) = notice {
            info!(%notice, "file selection filtered");
        }

        if selection.accepted.is_empty() {
            return (Vec::new(), notice);
        }

        (self.enqueue(selection.accepted).await, notice)
    }

    /// 加入队列
    pub async fn enqueue(&self, files: Vec<QueuedFile>) -> Vec<FileId> {
        let ids = self.store.write().await.enqueue(files);
        for file_id in &ids {
            self.emit(UploadEvent::Enqueued { file_id: *file_id });
        }
        ids
    }

    /// 顺序上传当前队列
    ///
    /// 单个文件失败不会中断整轮上传，结束后延迟清空参与本轮的文件
    pub async fn start(&self) -> Result<RunReport> {
        let config = self.config.current().await.ok_or(UploadError::NotConfigured)?;

        let snapshot: Vec<QueuedFile> = self.store.read().await.queue().to_vec();
        if snapshot.is_empty() {
            return Err(UploadError::EmptyQueue);
        }

        let _guard = BusyGuard::acquire(&self.busy).ok_or(UploadError::Busy)?;
        info!(files = snapshot.len(), api_url = %config.api_url, "upload run started");

        let mut report = RunReport::default();
        let mut run_ids = Vec::with_capacity(snapshot.len());

        for file in snapshot {
            let Some(token) = self.begin_attempt(&file).await else {
                if self.status_of(&file.id).await == Some(ProgressStatus::Cancelled) {
                    report.cancelled.push(file.id);
                    run_ids.push(file.id);
                }
                continue;
            };

            run_ids.push(file.id);
            self.upload_one(&file, &config, token, &mut report).await;
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            persist_failures = report.persist_failures.len(),
            "upload run finished"
        );
        self.emit(UploadEvent::RunFinished {
            succeeded: report.succeeded.len() + report.persist_failures.len(),
            failed: report.failed.len(),
        });

        self.schedule_clear(run_ids).await;
        Ok(report)
    }

    /// 取消一个文件
    ///
    /// 等待中的文件直接标记为取消，上传中的文件通过取消令牌中断
    pub async fn cancel(&self, file_id: &FileId) -> Result<()> {
        let mut store = self.store.write().await;
        let status = store
            .progress_of(file_id)
            .map(|record| record.status)
            .ok_or_else(|| UploadError::NotFound(file_id.to_string()))?;

        match status {
            ProgressStatus::Uploading => match self.lock_in_flight().get(file_id) {
                Some(token) => {
                    token.cancel();
                    Ok(())
                }
                None => Err(UploadError::InvalidState(format!("File {} is not being uploaded by this orchestrator", file_id))),
            },
            ProgressStatus::Pending | ProgressStatus::Error => {
                store.set_progress(file_id, &ProgressUpdate::status(ProgressStatus::Cancelled));
                self.emit_state_change(*file_id, status, ProgressStatus::Cancelled);
                Ok(())
            }
            _ => Err(UploadError::InvalidState(format!("Cannot cancel file in state {:?}", status))),
        }
    }

    /// 分组并发上传，每组完成后才开始下一组
    ///
    /// 不修改队列状态，失败的文件汇总到 `failures` 中
    pub async fn upload_batch(&self, files: Vec<QueuedFile>) -> Result<BatchOutcome> {
        let config = self.config.current().await.ok_or(UploadError::NotConfigured)?;
        let width = self.settings.batch_concurrency.max(1);
        let mut outcome = BatchOutcome::default();

        let mut files = files.into_iter().peekable();
        while files.peek().is_some() {
            let group: Vec<QueuedFile> = files.by_ref().take(width).collect();
            debug!(size = group.len(), "uploading batch group");

            let uploads = group.iter().map(|file| self.transfer(file, &config, false));
            let results = join_all(uploads).await;

            for (file, result) in group.into_iter().zip(results) {
                match result {
                    Ok(url) => {
                        outcome.urls.insert(file.name.clone(), url);
                    }
                    Err(err) => outcome.failures.push((file, err)),
                }
            }
        }

        if !outcome.failures.is_empty() {
            let names: Vec<&str> = outcome.failures.iter().map(|(file, _)| file.name.as_str()).collect();
            error!(failed = outcome.failures.len(), files = ?names, "some files failed to upload");
        }

        Ok(outcome)
    }

    /// 把文件标记为上传中并登记取消令牌，文件已不在队列或不可上传时返回 None
    async fn begin_attempt(&self, file: &QueuedFile) -> Option<CancellationToken> {
        let mut store = self.store.write().await;
        let old_state = store.progress_of(&file.id)?.status;
        if !matches!(old_state, ProgressStatus::Pending | ProgressStatus::Error) {
            return None;
        }

        store.set_progress(&file.id, &ProgressUpdate::status(ProgressStatus::Uploading).with_percent(0));
        let token = CancellationToken::new();
        self.lock_in_flight().insert(file.id, token.clone());
        self.emit_state_change(file.id, old_state, ProgressStatus::Uploading);

        Some(token)
    }

    async fn upload_one(&self, file: &QueuedFile, config: &ApiConfig, token: CancellationToken, report: &mut RunReport) {
        let outcome = tokio::select! {
            result = self.transfer(file, config, true) => result,
            _ = token.cancelled() => Err(UploadError::Cancelled),
        };

        // 令牌移除和状态落定在同一个写锁内完成，`cancel` 看不到没有令牌的上传中状态
        let (outcome, update) = {
            let mut store = self.store.write().await;
            self.lock_in_flight().remove(&file.id);

            let outcome = settle(outcome, &token);
            let update = match &outcome {
                Ok(_) => ProgressUpdate::status(ProgressStatus::Success).with_percent(100),
                Err(UploadError::Cancelled) => ProgressUpdate::status(ProgressStatus::Cancelled),
                Err(err) => ProgressUpdate::status(ProgressStatus::Error).with_error(err.message()),
            };
            store.set_progress(&file.id, &update);
            (outcome, update)
        };
        if let Some(new_state) = update.status {
            self.emit_state_change(file.id, ProgressStatus::Uploading, new_state);
        }

        match outcome {
            Ok(url) => {
                let result = UploadResult::success(file, url);
                self.emit(UploadEvent::Completed { file_id: file.id, result: result.clone() });
                self.persist(result, report).await;
            }
            Err(UploadError::Cancelled) => {
                info!(file = %file.name, "upload cancelled");
                report.cancelled.push(file.id);
            }
            Err(err) => {
                let message = err.message();
                warn!(file = %file.name, error = %message, "upload failed");
                self.emit(UploadEvent::Failed { file_id: file.id, error: message.clone() });
                report.failed.push((file.id, message));
            }
        }
    }

    /// 写入历史记录，按写入策略决定是否加入结果列表
    async fn persist(&self, result: UploadResult, report: &mut RunReport) {
        let record = UploadRecord::from(result.clone());

        match self.records.save_record(&record).await {
            Ok(()) => {
                self.store.write().await.add_result(result.clone());
                report.succeeded.push(result);
            }
            Err(err) => {
                let message = err.message();
                warn!(file = %result.file_name, error = %message, "failed to save upload record");
                self.emit(UploadEvent::PersistFailed { result_id: result.id.clone(), error: message.clone() });

                if self.settings.insert_mode == InsertMode::Optimistic {
                    self.store.write().await.add_result(result.clone());
                }
                report.persist_failures.push((result, message));
            }
        }
    }

    /// 执行一次传输，同时把进度检查点转发出去
    async fn transfer(&self, file: &QueuedFile, config: &ApiConfig, track: bool) -> Result<String> {
        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CHECKPOINTS);

        let relay = async {
            while let Some(percent) = progress_rx.recv().await {
                if track {
                    self.update(&file.id, ProgressUpdate::percent(percent)).await;
                }
                self.emit(UploadEvent::Progress { file_id: file.id, percent });
            }
        };

        let (result, ()) = tokio::join!(self.transport.upload(file, config, progress_tx), relay);
        result
    }

    async fn schedule_clear(&self, ids: Vec<FileId>) {
        let delay = self.settings.auto_clear_delay;
        if delay.is_zero() {
            self.store.write().await.remove_files(&ids);
            self.emit(UploadEvent::QueueCleared);
            return;
        }

        let store = self.store.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let removed = store.write().await.remove_files(&ids);
            debug!(removed, "queue cleared after upload run");
            let _ = event_tx.send(UploadEvent::QueueCleared);
        });
    }

    async fn update(&self, file_id: &FileId, update: ProgressUpdate) {
        self.store.write().await.set_progress(file_id, &update);
    }

    async fn status_of(&self, file_id: &FileId) -> Option<ProgressStatus> {
        self.store.read().await.progress_of(file_id).map(|record| record.status)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<FileId, CancellationToken>> {
        // 锁内不会 panic，中毒时直接取回数据
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_state_change(&self, file_id: FileId, old_state: ProgressStatus, new_state: ProgressStatus) {
        self.emit(UploadEvent::StateChanged { file_id, old_state, new_state });
    }
}

/// 取消请求先于状态落定到达时，即使传输已经成功也按取消处理
fn settle(outcome: Result<String>, token: &CancellationToken) -> Result<String> {
    match outcome {
        Ok(_) if token.is_cancelled() => Err(UploadError::Cancelled),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_prefers_cancellation_over_late_success() {
        let token = CancellationToken::new();
        assert_eq!(settle(Ok("https://img.example.com/a.png".to_string()), &token).unwrap(), "https://img.example.com/a.png");

        token.cancel();
        assert!(matches!(settle(Ok("https://img.example.com/a.png".to_string()), &token), Err(UploadError::Cancelled)));
        assert!(matches!(
            settle(Err(UploadError::upload_failed("network error")), &token),
            Err(UploadError::UploadFailed(_))
        ));
    }
}
