//! Events - ドメインイベント
//!
//! dispatcher と session が EventSink に送るイベント。
//! 進捗はファイル単位のまま流す（バッチ全体の % には集約しない）。

use serde::{Deserialize, Serialize};

use super::errors::UploadError;
use super::ids::{BatchId, FileId};
use super::notification::Notification;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    FilesAdded {
        count: usize,
        staged_total: usize,
    },
    BatchStarted {
        batch_id: BatchId,
        files: usize,
        concurrency_limit: usize,
    },
    UploadStarted {
        batch_id: BatchId,
        file_id: FileId,
        index: usize,
    },
    UploadProgress {
        batch_id: BatchId,
        file_id: FileId,
        percent: f32,
    },
    UploadSucceeded {
        batch_id: BatchId,
        file_id: FileId,
        url: String,
    },
    UploadFailed {
        batch_id: BatchId,
        file_id: FileId,
        reason: UploadError,
    },
    BatchCancelled {
        batch_id: BatchId,
        skipped: usize,
    },
    BatchFinished {
        batch_id: BatchId,
        succeeded: usize,
        failed: usize,
    },
    NotificationShown {
        notification: Notification,
    },
}
