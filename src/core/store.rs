use std::sync::Arc;
use tokio::sync::RwLock;
use super::errors::{Result, UploadError};
use super::types::{FileId, ProgressRecord, ProgressStatus, ProgressUpdate, QueuedFile, UploadResult};

/// 多任务共享的状态容器，所有修改都经过写锁串行化
pub type SharedStore = Arc<RwLock<UploadStore>>;

/// 队列 / 进度 / 结果状态
///
/// `queue` 与 `progress` 按位置一一对应
#[derive(Debug, Default)]
pub struct UploadStore {
    queue: Vec<QueuedFile>,
    progress: Vec<ProgressRecord>,
    results: Vec<UploadResult>,
}

impl UploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// 入队并为每个文件创建 `pending` 进度记录
    pub fn enqueue(&mut self, files: Vec<QueuedFile>) -> Vec<FileId> {
        let ids = files.iter().map(|file| file.id).collect();
        self.progress.extend(files.iter().map(ProgressRecord::pending));
        self.queue.extend(files);
        ids
    }

    /// 按位置移除文件及其进度记录，之后的位置整体前移
    pub fn dequeue(&mut self, index: usize) -> Result<QueuedFile> {
        let record = self.progress
            .get(index)
            .ok_or_else(|| UploadError::NotFound(format!("queue index {}", index)))?;

        if record.status == ProgressStatus::Uploading {
            return Err(UploadError::NotRemovable(record.file_name.clone()));
        }

        self.progress.remove(index);
        Ok(self.queue.remove(index))
    }

    /// 按 id 移除文件
    pub fn remove_file(&mut self, file_id: &FileId) -> Result<QueuedFile> {
        let index = self.position(file_id)
            .ok_or_else(|| UploadError::NotFound(file_id.to_string()))?;
        self.dequeue(index)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.progress.clear();
    }

    /// 移除给定的一组文件，上传中的文件保留
    pub fn remove_files(&mut self, ids: &[FileId]) -> usize {
        let before = self.queue.len();
        let mut index = 0;
        while index < self.queue.len() {
            let file_id = self.queue[index].id;
            if ids.contains(&file_id) && self.progress[index].status != ProgressStatus::Uploading {
                self.queue.remove(index);
                self.progress.remove(index);
            } else {
                index += 1;
            }
        }

        before - self.queue.len()
    }

    /// 合并进度更新，记录不存在时不做任何事
    pub fn set_progress(&mut self, file_id: &FileId, update: &ProgressUpdate) -> bool {
        match self.progress.iter_mut().find(|record| record.file_id == *file_id) {
            Some(record) => {
                record.apply(update);
                true
            }
            None => false,
        }
    }

    /// 按文件名更新，同名的记录全部更新，返回更新的数量
    pub fn set_progress_by_name(&mut self, file_name: &str, update: &ProgressUpdate) -> usize {
        self.progress
            .iter_mut()
            .filter(|record| record.file_name == file_name)
            .map(|record| record.apply(update))
            .count()
    }

    /// 新结果放在最前
    pub fn add_result(&mut self, result: UploadResult) {
        self.results.insert(0, result);
    }

    pub fn remove_result(&mut self, id: &str) -> Option<UploadResult> {
        let index = self.results.iter().position(|result| result.id == id)?;
        Some(self.results.remove(index))
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn queue(&self) -> &[QueuedFile] {
        &self.queue
    }

    pub fn progress(&self) -> &[ProgressRecord] {
        &self.progress
    }

    pub fn results(&self) -> &[UploadResult] {
        &self.results
    }

    pub fn progress_of(&self, file_id: &FileId) -> Option<&ProgressRecord> {
        self.progress.iter().find(|record| record.file_id == *file_id)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn uploading_count(&self) -> usize {
        self.progress
            .iter()
            .filter(|record| record.status == ProgressStatus::Uploading)
            .count()
    }

    fn position(&self, file_id: &FileId) -> Option<usize> {
        self.queue.iter().position(|file| file.id == *file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResultStatus;

    fn file(name: &str, size: usize) -> QueuedFile {
        QueuedFile::from_bytes(name, "image/png", vec![0u8; size])
    }

    fn result(id: &str) -> UploadResult {
        UploadResult {
            id: id.to_string(),
            file_name: format!("{}.png", id),
            file_size: 1,
            local_path: String::new(),
            upload_url: format!("https://img.example.com/{}", id),
            uploaded_at: chrono::Utc::now(),
            status: ResultStatus::Success,
        }
    }

    #[test]
    fn test_enqueue_creates_pending_progress_in_order() {
        let mut store = UploadStore::new();
        store.enqueue(vec![file("a.jpg", 100), file("b.png", 200)]);
        store.enqueue(vec![file("c.gif", 300)]);

        assert_eq!(store.queue().len(), store.progress().len());
        let names: Vec<_> = store.progress().iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.gif"]);
        for (file, record) in store.queue().iter().zip(store.progress()) {
            assert_eq!(file.id, record.file_id);
            assert_eq!(record.status, ProgressStatus::Pending);
            assert_eq!(record.percent, 0);
        }
    }

    #[test]
    fn test_dequeue_shifts_later_entries() {
        let mut store = UploadStore::new();
        store.enqueue(vec![file("a.jpg", 1), file("b.png", 1), file("c.gif", 1)]);

        let removed = store.dequeue(1).unwrap();
        assert_eq!(removed.name, "b.png");
        assert_eq!(store.queue()[1].name, "c.gif");
        assert_eq!(store.progress()[1].file_name, "c.gif");
        assert!(store.dequeue(5).is_err());
    }

    #[test]
    fn test_dequeue_refuses_uploading_file() {
        let mut store = UploadStore::new();
        let ids = store.enqueue(vec![file("a.jpg", 1)]);
        store.set_progress(&ids[0], &ProgressUpdate::status(ProgressStatus::Uploading));

        assert!(matches!(store.dequeue(0), Err(UploadError::NotRemovable(_))));
        assert_eq!(store.queue().len(), 1);
    }

    #[test]
    fn test_set_progress_unknown_id_is_noop() {
        let mut store = UploadStore::new();
        store.enqueue(vec![file("a.jpg", 1)]);

        assert!(!store.set_progress(&FileId::new(), &ProgressUpdate::percent(50)));
        assert_eq!(store.progress().len(), 1);
        assert_eq!(store.progress()[0].percent, 0);
    }

    #[test]
    fn test_percent_is_monotonic_within_attempt() {
        let mut store = UploadStore::new();
        let ids = store.enqueue(vec![file("a.jpg", 1)]);
        let id = ids[0];

        store.set_progress(&id, &ProgressUpdate::status(ProgressStatus::Uploading).with_percent(0));
        store.set_progress(&id, &ProgressUpdate::percent(50));
        store.set_progress(&id, &ProgressUpdate::percent(30));
        assert_eq!(store.progress_of(&id).unwrap().percent, 50);

        store.set_progress(&id, &ProgressUpdate::status(ProgressStatus::Error).with_error("boom"));
        store.set_progress(&id, &ProgressUpdate::status(ProgressStatus::Uploading).with_percent(0));
        let record = store.progress_of(&id).unwrap();
        assert_eq!(record.percent, 0);
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_set_progress_by_name_updates_duplicates() {
        let mut store = UploadStore::new();
        store.enqueue(vec![file("a.jpg", 1), file("a.jpg", 2), file("b.png", 3)]);

        let updated = store.set_progress_by_name("a.jpg", &ProgressUpdate::percent(30));
        assert_eq!(updated, 2);
        assert_eq!(store.progress()[2].percent, 0);
    }

    #[test]
    fn test_results_are_most_recent_first() {
        let mut store = UploadStore::new();
        store.add_result(result("first"));
        store.add_result(result("second"));

        assert_eq!(store.results()[0].id, "second");
        assert_eq!(store.remove_result("first").unwrap().id, "first");
        assert!(store.remove_result("first").is_none());
    }

    #[test]
    fn test_clear_results_is_idempotent() {
        let mut store = UploadStore::new();
        store.add_result(result("x"));
        store.clear_results();
        assert!(store.results().is_empty());
        store.clear_results();
        assert!(store.results().is_empty());
    }

    #[test]
    fn test_clear_queue_keeps_results() {
        let mut store = UploadStore::new();
        store.enqueue(vec![file("a.jpg", 1)]);
        store.add_result(result("x"));
        store.clear_queue();

        assert!(store.is_empty());
        assert!(store.progress().is_empty());
        assert_eq!(store.results().len(), 1);
    }

    #[test]
    fn test_remove_files_only_touches_given_ids() {
        let mut store = UploadStore::new();
        let ids = store.enqueue(vec![file("a.jpg", 1), file("b.png", 1)]);
        store.enqueue(vec![file("late.png", 1)]);

        assert_eq!(store.remove_files(&ids), 2);
        assert_eq!(store.queue().len(), 1);
        assert_eq!(store.queue()[0].name, "late.png");
    }
}
