//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type で型付けしています。
//! - **時刻でソート可能**: 生成順序でソートできる（ステージした順序の確認に便利）
//! - **UUID互換**: 128-bit
//!
//! `Id<T>` の `T` は実行時には使わないマーカー型で、
//! `FileId` と `BatchId` をコンパイル時に区別します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"file-", "batch-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let file_id: FileId = Id::from(Ulid::new());
/// let batch_id: BatchId = Id::from(Ulid::new());
/// // file_id と batch_id は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// StagedFile のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum File {}

impl IdMarker for File {
    fn prefix() -> &'static str {
        "file-"
    }
}

/// Dispatch run のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Batch {}

impl IdMarker for Batch {
    fn prefix() -> &'static str {
        "batch-"
    }
}

/// Identifier of a staged file (stable across retries of the same file).
pub type FileId = Id<File>;

/// Identifier of one dispatch run.
pub type BatchId = Id<Batch>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let file = FileId::from_ulid(ulid1);
        let batch = BatchId::from_ulid(ulid2);

        assert_eq!(file.as_ulid(), ulid1);
        assert_eq!(batch.as_ulid(), ulid2);

        assert!(file.to_string().starts_with("file-"));
        assert!(batch.to_string().starts_with("batch-"));
        // let _: FileId = batch; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = FileId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2)); // 時刻が進むのを待つ
        let id2 = FileId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn ids_can_be_serialized() {
        let file_id = FileId::from_ulid(Ulid::new());

        let serialized = serde_json::to_string(&file_id).unwrap();
        let deserialized: FileId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(file_id, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<FileId>(), size_of::<Ulid>());
        assert_eq!(size_of::<BatchId>(), 16);
    }
}
