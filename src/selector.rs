//! 文件选择过滤：只接受图片类型

use std::path::Path;
use mime::Mime;
use tracing::warn;
use crate::core::QueuedFile;

/// 允许上传的 MIME 类型
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

pub fn is_allowed(mime: &str) -> bool {
    mime.to_ascii_lowercase()
        .parse::<Mime>()
        .map(|mime| ALLOWED_MIME_TYPES.contains(&mime.essence_str()))
        .unwrap_or(false)
}

/// 按扩展名推断 MIME 类型
pub fn guess_mime(path: &Path) -> Option<Mime> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some(mime::IMAGE_JPEG),
        "png" => Some(mime::IMAGE_PNG),
        "gif" => Some(mime::IMAGE_GIF),
        "svg" => Some(mime::IMAGE_SVG),
        "webp" => "image/webp".parse().ok(),
        _ => None,
    }
}

/// 过滤后给调用方的提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionNotice {
    /// 没有任何有效图片，不入队
    NoValidFiles,
    /// 过滤掉了 n 个非图片文件
    Filtered(usize),
}

impl std::fmt::Display for SelectionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoValidFiles => write!(f, "please select valid image files"),
            Self::Filtered(count) => write!(f, "skipped {} file(s) that are not readable images", count),
        }
    }
}

#[derive(Debug, Default)]
pub struct Selection {
    pub accepted: Vec<QueuedFile>,
    pub rejected: usize,
}

impl Selection {
    pub fn notice(&self) -> Option<SelectionNotice> {
        if self.accepted.is_empty() {
            Some(SelectionNotice::NoValidFiles)
        } else if self.rejected > 0 {
            Some(SelectionNotice::Filtered(self.rejected))
        } else {
            None
        }
    }
}

/// 过滤候选文件，保持原有顺序
pub fn select_files(candidates: Vec<QueuedFile>) -> Selection {
    let total = candidates.len();
    let accepted: Vec<QueuedFile> = candidates
        .into_iter()
        .filter(|file| is_allowed(&file.mime))
        .collect();

    Selection {
        rejected: total - accepted.len(),
        accepted,
    }
}

/// 从本地路径选择文件，无法读取的路径计入 `rejected`
pub async fn select_paths<P: AsRef<Path>>(paths: &[P]) -> Selection {
    let mut candidates = Vec::with_capacity(paths.len());
    let mut unreadable = 0;
    for path in paths {
        match QueuedFile::from_path(path).await {
            Ok(file) => candidates.push(file),
            Err(err) => {
                warn!(path = %path.as_ref().display(), error = %err, "skipping unreadable file");
                unreadable += 1;
            }
        }
    }

    let mut selection = select_files(candidates);
    selection.rejected += unreadable;
    selection
}
