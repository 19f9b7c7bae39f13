//! Ports - 抽象化レイヤー
//!
//! 外部システム（object storage、時刻、ID 生成、イベント出力）への
//! インターフェースを定義し、orchestrator から実装の詳細を隠蔽します。

pub mod accept_policy;
pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod storage;

pub use self::accept_policy::{AcceptPolicy, ExtensionAllowlist};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::storage::{IgnoreProgress, ProgressSink, StorageClient};
