//! SessionRuntime - SessionState を 1 つの task 上で駆動する
//!
//! # 構成
//! - 書き込み: `SessionHandle::send` が mpsc で Command を送り、oneshot で結果を受け取る
//! - 読み取り: `watch::Receiver<SessionView>`（状態が変わるたびに最新の view を publish）
//! - dispatch: in-flight の upload は control loop が直接 poll する（別 task にしない）
//! - 通知: 最新の通知の expires_at に合わせた deadline を 1 つだけ持つ
//!
//! `select!` で「コマンド受信」「dispatch 完了」「通知の失効」を待ち合わせる。
//! 状態を触るのは control loop だけなので lock は不要。
//!
//! # 終了
//! - `SessionRuntime::shutdown()` は `shutdown_tx` で停止を要求する（残っている handle の数は関係ない）
//! - `shutdown_tx` を drop しても loop は止まる（WorkerGroup と同じ）
//! - すべての `SessionHandle` が drop されて inbox が閉じた場合も止まる
//!
//! どの経路でも、dispatch が in-flight なら完了を待ってから抜ける。
//! 停止後の `send` は `SessionError::Closed` になる。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::dispatcher::{CancelHandle, UploadDispatcher};
use super::session::{Command, Effect, SessionState, SessionView, Transition};
use crate::domain::{
    BatchResult, DispatchError, DomainEvent, FileId, NotificationId, StagedFile, TransitionError,
};
use crate::ports::{Clock, EventSink, IdGenerator, StorageClient};

const INBOX_CAPACITY: usize = 32;

pub const STORAGE_UNAVAILABLE: &str =
    "Failed to initialize storage. Please check your storage configuration.";

/// SessionError はセッション操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("session runtime has stopped")]
    Closed,
}

/// Ports the runtime needs besides the state itself.
#[derive(Clone)]
pub struct SessionDeps {
    pub storage: Arc<dyn StorageClient>,
    pub events: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

type DispatchFuture = Pin<Box<dyn Future<Output = Result<BatchResult, DispatchError>> + Send>>;

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), TransitionError>>,
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
    view: watch::Receiver<SessionView>,
}

pub struct SessionRuntime {
    handle: SessionHandle,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SessionRuntime {
    /// Spawn the control loop on the current tokio runtime.
    pub fn spawn(state: SessionState, dispatcher: UploadDispatcher, deps: SessionDeps) -> Self {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (view_tx, view_rx) = watch::channel(state.view());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let control = ControlLoop {
            ttl: state.options().notification_ttl,
            state,
            dispatcher,
            deps,
            view_tx,
            in_flight: None,
            cancel: None,
            expiry: None,
        };
        let join = tokio::spawn(control.run(inbox, shutdown_rx));

        Self {
            handle: SessionHandle { tx, view: view_rx },
            shutdown_tx,
            join,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// An in-flight dispatch settles first. Outstanding handles see `Closed`
    /// afterwards.
    pub async fn shutdown(self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
        drop(self.handle);
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "session runtime task failed");
        }
    }
}

impl SessionHandle {
    pub async fn send(&self, command: Command) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    pub async fn open_modal(&self) -> Result<(), SessionError> {
        self.send(Command::OpenModal).await
    }

    pub async fn close_modal(&self) -> Result<(), SessionError> {
        self.send(Command::CloseModal).await
    }

    pub async fn add_files(&self, files: Vec<StagedFile>) -> Result<(), SessionError> {
        self.send(Command::AddFiles(files)).await
    }

    pub async fn remove_file(&self, id: FileId) -> Result<(), SessionError> {
        self.send(Command::RemoveFile(id)).await
    }

    pub async fn submit(&self) -> Result<(), SessionError> {
        self.send(Command::Submit).await
    }

    pub async fn cancel_upload(&self) -> Result<(), SessionError> {
        self.send(Command::CancelUpload).await
    }

    pub async fn dismiss_storage_error(&self) -> Result<(), SessionError> {
        self.send(Command::DismissStorageError).await
    }

    /// Latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait until no dispatch is in flight and return that view.
    pub async fn wait_until_settled(&self) -> Result<SessionView, SessionError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|v| !v.uploading)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok((*view).clone())
    }

    /// Submit, then wait for the batch to settle.
    pub async fn submit_and_wait(&self) -> Result<SessionView, SessionError> {
        self.submit().await?;
        self.wait_until_settled().await
    }
}

struct ControlLoop {
    state: SessionState,
    dispatcher: UploadDispatcher,
    deps: SessionDeps,
    view_tx: watch::Sender<SessionView>,
    ttl: Duration,
    in_flight: Option<DispatchFuture>,
    cancel: Option<CancelHandle>,
    expiry: Option<(NotificationId, Instant)>,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Request>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        if let Err(err) = self.deps.storage.probe().await {
            tracing::error!(error = %err, "storage probe failed");
            self.apply_internal(Command::StorageUnavailable(format!(
                "{STORAGE_UNAVAILABLE} ({err})"
            )));
            self.publish();
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    // 値の変化でも sender の drop でも止まる
                    tracing::debug!("session shutdown requested");
                    break;
                }
                request = inbox.recv() => {
                    let Some(Request { command, reply }) = request else {
                        break;
                    };
                    let result = self.apply(command);
                    // view を先に publish してから返信する（返信を受けた側が古い view を見ないように）
                    self.publish();
                    let _ = reply.send(result);
                }
                result = poll_in_flight(&mut self.in_flight) => {
                    self.settle(result);
                    self.publish();
                }
                id = wait_for_expiry(self.expiry) => {
                    self.expiry = None;
                    self.apply_internal(Command::ExpireNotification(id));
                    self.publish();
                }
            }
        }

        // 以降のコマンドは受け付けない（送信側は Closed を受け取る）
        drop(inbox);
        if let Some(in_flight) = self.in_flight.take() {
            tracing::info!("session stopping; waiting for in-flight dispatch");
            let result = in_flight.await;
            self.settle(result);
            self.publish();
        }
        tracing::debug!("session runtime stopped");
    }

    fn settle(&mut self, result: Result<BatchResult, DispatchError>) {
        self.in_flight = None;
        self.cancel = None;
        let command = match result {
            Ok(batch) => Command::BatchSettled(batch),
            Err(err) => Command::DispatchAborted(err),
        };
        self.apply_internal(command);
    }

    /// Commands produced by the loop itself are never rejected by the state.
    fn apply_internal(&mut self, command: Command) {
        if let Err(err) = self.apply(command) {
            tracing::warn!(error = %err, "internal command rejected");
        }
    }

    fn apply(&mut self, command: Command) -> Result<(), TransitionError> {
        let now = self.deps.clock.now();
        let Transition {
            effect,
            shown,
            events,
        } = self.state.apply(command, now)?;

        for event in events {
            self.deps.events.emit(event);
        }
        if let Some(notification) = shown {
            self.expiry = Instant::now()
                .checked_add(self.ttl)
                .map(|at| (notification.id, at));
            self.deps
                .events
                .emit(DomainEvent::NotificationShown { notification });
        }

        match effect {
            Effect::None => {}
            Effect::Dispatch(files) => self.start_dispatch(files),
            Effect::CancelDispatch => {
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
            }
        }
        Ok(())
    }

    fn start_dispatch(&mut self, files: Vec<StagedFile>) {
        let batch_id = self.deps.ids.generate_batch_id();
        let (cancel, signal) = CancelHandle::new();
        let dispatcher = self.dispatcher;
        let storage = Arc::clone(&self.deps.storage);
        let events = Arc::clone(&self.deps.events);

        tracing::info!(%batch_id, files = files.len(), "dispatch started");
        self.cancel = Some(cancel);
        self.in_flight = Some(Box::pin(async move {
            dispatcher
                .run_with_cancel(batch_id, &files, storage.as_ref(), events.as_ref(), &signal)
                .await
        }));
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view());
    }
}

/// Resolves when the in-flight dispatch finishes; pending forever when idle.
async fn poll_in_flight(
    in_flight: &mut Option<DispatchFuture>,
) -> Result<BatchResult, DispatchError> {
    match in_flight {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn wait_for_expiry(expiry: Option<(NotificationId, Instant)>) -> NotificationId {
    match expiry {
        Some((id, at)) => {
            tokio::time::sleep_until(at).await;
            id
        }
        None => std::future::pending().await,
    }
}
