//! Errors - エラー型と分類
//!
//! - `UploadError`: 1 ファイル分の失敗理由。outcome にデータとして格納され、呼び出し元には投げない
//! - `DispatchError`: dispatcher の前提条件違反（空バッチ、並列数 0）
//! - `TransitionError`: SessionState が受け付けなかったコマンド

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::FileId;

/// ErrorKind は失敗の運用分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（同じファイルを再送しても無意味）
/// - Cancelled: バッチがキャンセルされ、開始されなかった
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    Cancelled,
}

/// Why a single file's upload did not produce a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UploadError {
    #[error("network timeout")]
    NetworkTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// Storage-side rejection (e.g. file type not in the allowlist).
    #[error("rejected by storage: {0}")]
    Rejected(String),

    #[error("io error: {0}")]
    Io(String),

    /// The batch was cancelled before this file was started.
    #[error("upload cancelled before start")]
    Cancelled,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::NetworkTimeout | UploadError::Transport(_) | UploadError::Io(_) => {
                ErrorKind::Transient
            }
            UploadError::Rejected(_) => ErrorKind::Permanent,
            UploadError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            UploadError::NetworkTimeout
        } else {
            UploadError::Io(err.to_string())
        }
    }
}

/// Misuse of the dispatcher contract. Never produced by a failing upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("batch is empty: stage at least one file before dispatching")]
    EmptyBatch,

    #[error("concurrency limit must be at least 1 (got {0})")]
    InvalidConcurrencyLimit(usize),
}

/// A command the session state machine refused; the state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("the upload modal is closed")]
    ModalClosed,

    #[error("an upload is already in progress")]
    UploadInProgress,

    #[error("no upload is in progress")]
    NothingToCancel,

    #[error("no staged file with id {0}")]
    UnknownFile(FileId),
}
