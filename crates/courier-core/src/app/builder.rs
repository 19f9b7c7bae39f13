//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 指定されなかった port はデフォルト実装で埋める

use std::sync::Arc;

use super::aggregator::{BatchPolicy, BatchResultAggregator};
use super::dispatcher::UploadDispatcher;
use super::runtime::{SessionDeps, SessionRuntime};
use super::session::SessionState;
use crate::config::{ConfigError, CourierConfig};
use crate::domain::DispatchError;
use crate::impls::{LocalDirStorage, TracingEventSink};
use crate::ports::{Clock, EventSink, IdGenerator, StorageClient, SystemClock, UlidGenerator};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config)
///     .storage(Arc::new(InMemoryStorage::new("scratch")))
///     .build()?;
/// let runtime = app.spawn();
/// ```
///
/// # Fail-fast 設計
/// - build() 時に config を検証する
/// - concurrency_limit が 0 なら dispatch を始める前に BuildError を返す
pub struct AppBuilder {
    config: CourierConfig,
    storage: Option<Arc<dyn StorageClient>>,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    policy: Option<Arc<dyn BatchPolicy>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl AppBuilder {
    pub fn new(config: CourierConfig) -> Self {
        Self {
            config,
            storage: None,
            events: None,
            clock: None,
            ids: None,
            policy: None,
        }
    }

    /// Storage adapter. Defaults to `LocalDirStorage` over `config.storage_dir`.
    pub fn storage(mut self, storage: Arc<dyn StorageClient>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Defaults to `TracingEventSink`.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn batch_policy(mut self, policy: Arc<dyn BatchPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;
        let dispatcher = UploadDispatcher::new(self.config.concurrency_limit)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let storage = self.storage.unwrap_or_else(|| {
            Arc::new(LocalDirStorage::new(
                self.config.storage_dir.clone(),
                self.config.accept_policy(),
            ))
        });
        let events = self.events.unwrap_or_else(|| Arc::new(TracingEventSink));
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(BatchResultAggregator));

        Ok(App {
            state: SessionState::with_policy(self.config.session_options(), policy),
            dispatcher,
            deps: SessionDeps {
                storage,
                events,
                clock,
                ids,
            },
            config: self.config,
        })
    }
}

/// Wired but not yet running.
pub struct App {
    config: CourierConfig,
    state: SessionState,
    dispatcher: UploadDispatcher,
    deps: SessionDeps,
}

impl App {
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> UploadDispatcher {
        self.dispatcher
    }

    /// Id generator shared with the session, for minting `FileId`s.
    pub fn ids(&self) -> Arc<dyn IdGenerator> {
        Arc::clone(&self.deps.ids)
    }

    /// Start the session control loop. Needs a tokio runtime.
    pub fn spawn(self) -> SessionRuntime {
        SessionRuntime::spawn(self.state, self.dispatcher, self.deps)
    }
}
