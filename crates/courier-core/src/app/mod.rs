//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて upload セッションを実装します。
//!
//! # 主要コンポーネント
//! - **FileAccumulator**: ステージ済みファイルの順序付きリスト
//! - **UploadDispatcher**: 並列数制限つきのバッチ upload
//! - **BatchResultAggregator**: BatchResult を通知とクリア判定に畳み込む
//! - **SessionState**: Command を消費する純粋な状態機械
//! - **SessionRuntime**: SessionState を駆動する control loop
//! - **AppBuilder**: アプリケーションの構築とワイヤリング

pub mod accumulator;
pub mod aggregator;
pub mod builder;
pub mod dispatcher;
pub mod runtime;
pub mod session;

// 主要な型を再エクスポート
pub use self::accumulator::FileAccumulator;
pub use self::aggregator::{BatchPolicy, BatchResultAggregator, BatchVerdict};
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::dispatcher::{CancelHandle, CancelSignal, UploadDispatcher};
pub use self::runtime::{SessionDeps, SessionError, SessionHandle, SessionRuntime};
pub use self::session::{Command, Effect, SessionOptions, SessionState, SessionView, Transition};
