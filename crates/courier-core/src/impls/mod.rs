//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **LocalDirStorage**: ローカルディレクトリへのコピー（CLI のデフォルト）
//! - **InMemoryStorage**: 開発・テスト用の object storage
//! - **TracingEventSink / RecordingEventSink**: EventSink の実装
//!
//! リモート object storage 向けの実装は別クレートに置く想定です。

pub mod event_sinks;
pub mod inmem_storage;
pub mod local_storage;

pub use self::event_sinks::{RecordingEventSink, TracingEventSink};
pub use self::inmem_storage::InMemoryStorage;
pub use self::local_storage::LocalDirStorage;
