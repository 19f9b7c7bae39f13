//! UploadDispatcher - バッチ内のファイルを並列数制限つきで upload する
//!
//! # フロー
//! 1. `min(concurrency_limit, files.len())` 本の lane を作る
//! 2. 各 lane は共有カーソルから次の index を取り、StorageClient::upload を await する
//! 3. lane はすべて同じ task 上で join される（スレッド並列ではなく協調的な interleave）
//! 4. 結果は到着順ではなく元の index に置く
//!
//! # キャンセル
//! `CancelHandle::cancel()` は新しい upload の開始だけを止める。
//! 実行中の upload はそのまま完了させる（WorkerGroup::request_shutdown と同じ方針）。
//! 開始されなかったファイルは `UploadError::Cancelled` の失敗になる。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::domain::{
    BatchId, BatchResult, DispatchError, DomainEvent, FileId, StagedFile, UploadError,
    UploadOutcome, UploadResult,
};
use crate::ports::{EventSink, ProgressSink, StorageClient};

/// Trigger side of a cooperative cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, checked by lanes before taking the next file.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelSignal { rx })
    }

    pub fn cancel(&self) {
        // ignore send error: the run may already be over
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Forwards one file's progress as events; no batch-level aggregation.
struct FileProgress<'a> {
    batch_id: BatchId,
    file_id: FileId,
    events: &'a dyn EventSink,
}

impl ProgressSink for FileProgress<'_> {
    fn report(&self, percent: f32) {
        if percent.is_nan() {
            return;
        }
        self.events.emit(DomainEvent::UploadProgress {
            batch_id: self.batch_id,
            file_id: self.file_id,
            percent: percent.clamp(0.0, 100.0),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadDispatcher {
    concurrency_limit: NonZeroUsize,
}

impl UploadDispatcher {
    pub fn new(concurrency_limit: usize) -> Result<Self, DispatchError> {
        NonZeroUsize::new(concurrency_limit)
            .map(|concurrency_limit| Self { concurrency_limit })
            .ok_or(DispatchError::InvalidConcurrencyLimit(concurrency_limit))
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit.get()
    }

    pub async fn run<S>(
        &self,
        batch_id: BatchId,
        files: &[StagedFile],
        storage: &S,
        events: &dyn EventSink,
    ) -> Result<BatchResult, DispatchError>
    where
        S: StorageClient + ?Sized,
    {
        self.run_with_cancel(batch_id, files, storage, events, &CancelSignal::never())
            .await
    }

    #[tracing::instrument(
        skip_all,
        fields(%batch_id, files = files.len(), limit = self.concurrency_limit.get())
    )]
    pub async fn run_with_cancel<S>(
        &self,
        batch_id: BatchId,
        files: &[StagedFile],
        storage: &S,
        events: &dyn EventSink,
        cancel: &CancelSignal,
    ) -> Result<BatchResult, DispatchError>
    where
        S: StorageClient + ?Sized,
    {
        if files.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }

        events.emit(DomainEvent::BatchStarted {
            batch_id,
            files: files.len(),
            concurrency_limit: self.concurrency_limit.get(),
        });

        let cursor = AtomicUsize::new(0);
        let lanes = self.concurrency_limit.get().min(files.len());
        let finished = futures::future::join_all(
            (0..lanes).map(|_| lane(batch_id, files, storage, events, cancel, &cursor)),
        )
        .await;

        let mut slots: Vec<Option<UploadOutcome>> = files.iter().map(|_| None).collect();
        for (index, outcome) in finished.into_iter().flatten() {
            slots[index] = Some(outcome);
        }

        let mut skipped = 0;
        let outcomes: Vec<UploadOutcome> = slots
            .into_iter()
            .zip(files)
            .map(|(slot, file)| {
                slot.unwrap_or_else(|| {
                    skipped += 1;
                    UploadOutcome::failure(file.clone(), UploadError::Cancelled)
                })
            })
            .collect();

        if skipped > 0 {
            tracing::info!(skipped, "batch cancelled before all files started");
            events.emit(DomainEvent::BatchCancelled { batch_id, skipped });
        }

        let batch = BatchResult::new(batch_id, outcomes);
        tracing::info!(
            succeeded = batch.succeeded_count(),
            failed = batch.failed_count(),
            "batch finished"
        );
        events.emit(DomainEvent::BatchFinished {
            batch_id,
            succeeded: batch.succeeded_count(),
            failed: batch.failed_count(),
        });
        Ok(batch)
    }
}

/// One lane: take the next index until the files run out or cancel fires.
async fn lane<S>(
    batch_id: BatchId,
    files: &[StagedFile],
    storage: &S,
    events: &dyn EventSink,
    cancel: &CancelSignal,
    cursor: &AtomicUsize,
) -> Vec<(usize, UploadOutcome)>
where
    S: StorageClient + ?Sized,
{
    let mut done = Vec::new();
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(file) = files.get(index) else {
            break;
        };

        events.emit(DomainEvent::UploadStarted {
            batch_id,
            file_id: file.id(),
            index,
        });
        let progress = FileProgress {
            batch_id,
            file_id: file.id(),
            events,
        };
        let result = UploadResult::from(storage.upload(file, &progress).await);

        match &result {
            UploadResult::Success { url } => {
                events.emit(DomainEvent::UploadSucceeded {
                    batch_id,
                    file_id: file.id(),
                    url: url.clone(),
                });
            }
            UploadResult::Failure { reason } => {
                tracing::warn!(file = file.name(), %reason, "upload failed");
                events.emit(DomainEvent::UploadFailed {
                    batch_id,
                    file_id: file.id(),
                    reason: reason.clone(),
                });
            }
        }
        done.push((index, UploadOutcome::new(file.clone(), result)));
    }
    done
}
