//! StorageClient port - リモート object storage への upload
//!
//! transport・リトライ・認証・タイムアウトは実装側の責務。
//! orchestrator から見た契約は以下のみ:
//! - 1 回の呼び出しにつき終端結果（URL か失敗）はちょうど 1 つ
//! - 進捗コールバックは 0 回以上、呼び出しから終端結果までの間にだけ発生する

use async_trait::async_trait;

use crate::domain::{StagedFile, StoredObject, UploadError};

/// Receives fractional progress (0..=100) for a single file.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f32);
}

/// Progress sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreProgress;

impl ProgressSink for IgnoreProgress {
    fn report(&self, _percent: f32) {}
}

/// Storage client port.
///
/// The dispatcher borrows `file` for the duration of the call only.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upload(
        &self,
        file: &StagedFile,
        progress: &dyn ProgressSink,
    ) -> Result<StoredObject, UploadError>;

    /// Startup reachability check. Adapters without a meaningful probe keep
    /// the default.
    async fn probe(&self) -> Result<(), UploadError> {
        Ok(())
    }
}

#[async_trait]
impl<S: StorageClient + ?Sized> StorageClient for std::sync::Arc<S> {
    async fn upload(
        &self,
        file: &StagedFile,
        progress: &dyn ProgressSink,
    ) -> Result<StoredObject, UploadError> {
        (**self).upload(file, progress).await
    }

    async fn probe(&self) -> Result<(), UploadError> {
        (**self).probe().await
    }
}
