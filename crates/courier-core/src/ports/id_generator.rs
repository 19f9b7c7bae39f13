//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock の時刻を timestamp 部に使う）

use crate::domain::ids::{BatchId, FileId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はファイルとバッチの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（session runtime と CLI の両方から使う）
pub trait IdGenerator: Send + Sync {
    fn generate_file_id(&self) -> FileId;

    fn generate_batch_id(&self) -> BatchId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// FixedClock を使うと timestamp 部分が決定的になります（ランダム部分は異なる）。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_file_id(&self) -> FileId {
        FileId::from(self.next_ulid())
    }

    fn generate_batch_id(&self) -> BatchId {
        BatchId::from(self.next_ulid())
    }
}
