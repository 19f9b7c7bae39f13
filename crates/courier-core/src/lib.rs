//! courier-core
//!
//! Core building blocks for the Courier upload orchestrator.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, file, outcome, notification, state, errors, events）
//! - **ports**: 抽象化レイヤー（StorageClient, AcceptPolicy, Clock, IdGenerator, EventSink）
//! - **app**: アプリケーションロジック（accumulator, dispatcher, aggregator, session, runtime, builder）
//! - **impls**: 実装（LocalDirStorage, InMemoryStorage, event sinks）
//! - **config**: CourierConfig（JSON ファイル + 環境変数）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::config::{ConfigError, CourierConfig};
