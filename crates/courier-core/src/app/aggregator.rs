//! BatchResultAggregator - BatchResult を 1 つの判定に畳み込む
//!
//! 純粋関数: 同じ BatchResult からは常に同じ BatchVerdict が返る。
//! 部分失敗は失敗として扱う（失敗分を再送できるよう、ステージ済みファイルは消さない）。

use crate::domain::{BatchResult, NoticeDraft};

pub const UPLOAD_SUCCEEDED: &str = "Files uploaded to storage successfully!";
pub const UPLOAD_FAILED: &str = "Error uploading files to storage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchVerdict {
    pub notice: NoticeDraft,
    pub should_clear_accumulator: bool,
}

/// Policy seam for turning a batch into a verdict.
pub trait BatchPolicy: Send + Sync {
    fn reduce(&self, batch: &BatchResult) -> BatchVerdict;
}

/// Default policy: only an all-success batch clears the accumulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchResultAggregator;

impl BatchPolicy for BatchResultAggregator {
    fn reduce(&self, batch: &BatchResult) -> BatchVerdict {
        if batch.all_succeeded() {
            BatchVerdict {
                notice: NoticeDraft::success(UPLOAD_SUCCEEDED),
                should_clear_accumulator: true,
            }
        } else {
            // 全失敗・部分失敗は外向きには同じメッセージ。内訳は batch.outcomes() に残る
            BatchVerdict {
                notice: NoticeDraft::error(UPLOAD_FAILED),
                should_clear_accumulator: false,
            }
        }
    }
}
