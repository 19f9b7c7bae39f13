//! SessionState - セッションの状態機械
//!
//! UI のイベントハンドラの代わりに、閉じた `Command` 集合を `apply` で消費する。
//! `apply` は I/O をしない純粋な遷移関数で、必要な副作用は `Effect` として返す。
//! 非同期の駆動（dispatch の実行、通知のタイマー）は `app::runtime` の責務。
//!
//! # 不変条件
//! - `uploading` は dispatch のどの終了経路でも false に戻る（BatchSettled / DispatchAborted）
//! - accumulator を空にするのは失敗 0 件のバッチの後だけ
//! - 通知の失効は id の一致で判定する（古いタイマーが新しい通知を消さない）

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::accumulator::FileAccumulator;
use super::aggregator::{BatchPolicy, BatchResultAggregator, UPLOAD_FAILED};
use crate::domain::{
    BatchReport, BatchResult, DispatchError, DomainEvent, FileId, NoticeDraft, Notification,
    NotificationId, SessionPhase, StagedFile, StagedFileSummary, TransitionError,
};

pub const FILES_ADDED: &str = "Files added to queue";
pub const EMPTY_SUBMIT: &str = "Please add at least one file";

/// User actions and dispatch completions, as a closed set.
#[derive(Debug, Clone)]
pub enum Command {
    OpenModal,
    CloseModal,
    AddFiles(Vec<StagedFile>),
    RemoveFile(FileId),
    Submit,
    CancelUpload,
    BatchSettled(BatchResult),
    DispatchAborted(DispatchError),
    ExpireNotification(NotificationId),
    StorageUnavailable(String),
    DismissStorageError,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Default)]
pub enum Effect {
    #[default]
    None,

    /// Start a dispatch run over this snapshot.
    Dispatch(Vec<StagedFile>),

    /// Stop starting new uploads in the current run.
    CancelDispatch,
}

/// Everything a successful `apply` produced besides the new state.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub effect: Effect,
    /// Notification shown by this transition, if any.
    pub shown: Option<Notification>,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub notification_ttl: Duration,
    pub allow_close_while_uploading: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            notification_ttl: Duration::from_millis(3000),
            allow_close_while_uploading: false,
        }
    }
}

/// Serializable snapshot for the read channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub modal_open: bool,
    pub uploading: bool,
    pub staged: Vec<StagedFileSummary>,
    pub staged_bytes: u64,
    pub notification: Option<Notification>,
    pub uploaded_urls: Vec<String>,
    pub last_batch: Option<BatchReport>,
    pub storage_error: Option<String>,
}

pub struct SessionState {
    options: SessionOptions,
    policy: Arc<dyn BatchPolicy>,
    modal_open: bool,
    uploading: bool,
    accumulator: FileAccumulator,
    notification: Option<Notification>,
    last_notification_id: NotificationId,
    uploaded_urls: Vec<String>,
    last_batch: Option<BatchReport>,
    storage_error: Option<String>,
}

impl SessionState {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_policy(options, Arc::new(BatchResultAggregator))
    }

    pub fn with_policy(options: SessionOptions, policy: Arc<dyn BatchPolicy>) -> Self {
        Self {
            options,
            policy,
            modal_open: false,
            uploading: false,
            accumulator: FileAccumulator::new(),
            notification: None,
            last_notification_id: NotificationId::new(0),
            uploaded_urls: Vec::new(),
            last_batch: None,
            storage_error: None,
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_flags(self.modal_open, self.uploading)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn accumulator(&self) -> &FileAccumulator {
        &self.accumulator
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn uploaded_urls(&self) -> &[String] {
        &self.uploaded_urls
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase(),
            modal_open: self.modal_open,
            uploading: self.uploading,
            staged: self.accumulator.summaries(),
            staged_bytes: self.accumulator.total_bytes(),
            notification: self.notification.clone(),
            uploaded_urls: self.uploaded_urls.clone(),
            last_batch: self.last_batch.clone(),
            storage_error: self.storage_error.clone(),
        }
    }

    /// Apply one command. On `Err` the state is unchanged.
    pub fn apply(
        &mut self,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let mut transition = Transition::default();
        match command {
            Command::OpenModal => {
                self.modal_open = true;
            }
            Command::CloseModal => {
                if self.uploading && !self.options.allow_close_while_uploading {
                    return Err(TransitionError::UploadInProgress);
                }
                self.modal_open = false;
            }
            Command::AddFiles(files) => {
                self.require_editable()?;
                let count = self.accumulator.add(files);
                if count > 0 {
                    transition.events.push(DomainEvent::FilesAdded {
                        count,
                        staged_total: self.accumulator.len(),
                    });
                    self.notify(NoticeDraft::success(FILES_ADDED), now, &mut transition);
                }
            }
            Command::RemoveFile(id) => {
                if self.uploading {
                    return Err(TransitionError::UploadInProgress);
                }
                self.accumulator
                    .remove(id)
                    .ok_or(TransitionError::UnknownFile(id))?;
            }
            Command::Submit => {
                self.require_editable()?;
                if self.accumulator.is_empty() {
                    self.notify(NoticeDraft::error(EMPTY_SUBMIT), now, &mut transition);
                } else {
                    self.uploading = true;
                    transition.effect = Effect::Dispatch(self.accumulator.snapshot());
                }
            }
            Command::CancelUpload => {
                if !self.uploading {
                    return Err(TransitionError::NothingToCancel);
                }
                transition.effect = Effect::CancelDispatch;
            }
            Command::BatchSettled(batch) => {
                if !self.uploading {
                    tracing::warn!(
                        batch_id = %batch.batch_id(),
                        "settle without a dispatch in flight; ignored"
                    );
                    return Ok(transition);
                }
                self.uploading = false;
                let verdict = self.policy.reduce(&batch);
                if verdict.should_clear_accumulator {
                    self.accumulator.clear();
                    self.uploaded_urls.extend_from_slice(batch.succeeded_urls());
                    self.modal_open = false;
                }
                self.last_batch = Some(batch.report());
                self.notify(verdict.notice, now, &mut transition);
            }
            Command::DispatchAborted(err) => {
                self.uploading = false;
                tracing::error!(error = %err, "dispatch aborted");
                self.notify(
                    NoticeDraft::error(format!("{UPLOAD_FAILED}: {err}")),
                    now,
                    &mut transition,
                );
            }
            Command::ExpireNotification(id) => {
                if self.notification.as_ref().is_some_and(|n| n.id == id) {
                    self.notification = None;
                }
            }
            Command::StorageUnavailable(message) => {
                self.storage_error = Some(message);
            }
            Command::DismissStorageError => {
                self.storage_error = None;
            }
        }
        Ok(transition)
    }

    /// Staging edits and submit need an open modal and no dispatch in flight.
    fn require_editable(&self) -> Result<(), TransitionError> {
        if self.uploading {
            Err(TransitionError::UploadInProgress)
        } else if !self.modal_open {
            Err(TransitionError::ModalClosed)
        } else {
            Ok(())
        }
    }

    fn notify(&mut self, draft: NoticeDraft, now: DateTime<Utc>, transition: &mut Transition) {
        let id = self.last_notification_id.next();
        self.last_notification_id = id;
        // 範囲外の TTL は「失効しない」に丸める
        let expires_at = chrono::Duration::from_std(self.options.notification_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let notification = Notification::from_draft(id, draft, expires_at);
        self.notification = Some(notification.clone());
        transition.shown = Some(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchId, NotificationKind, UploadError, UploadOutcome};
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn staged(name: &str, size: usize) -> StagedFile {
        StagedFile::from_bytes(FileId::from_ulid(Ulid::new()), name, vec![0u8; size])
    }

    fn staging_with(files: Vec<StagedFile>) -> SessionState {
        let mut s = SessionState::new(SessionOptions::default());
        s.apply(Command::OpenModal, now()).unwrap();
        s.apply(Command::AddFiles(files), now()).unwrap();
        s
    }

    fn submit(s: &mut SessionState) -> Vec<StagedFile> {
        match s.apply(Command::Submit, now()).unwrap().effect {
            Effect::Dispatch(files) => files,
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    fn settle(files: &[StagedFile], pattern: &str) -> BatchResult {
        let outcomes = files
            .iter()
            .zip(pattern.chars())
            .enumerate()
            .map(|(i, (f, c))| match c {
                'S' => UploadOutcome::success(f.clone(), format!("u{}", i + 1)),
                _ => UploadOutcome::failure(f.clone(), UploadError::NetworkTimeout),
            })
            .collect();
        BatchResult::new(BatchId::from_ulid(Ulid::new()), outcomes)
    }

    fn staged_names(s: &SessionState) -> Vec<String> {
        s.accumulator().iter().map(|f| f.name().to_string()).collect()
    }

    #[test]
    fn starts_idle() {
        let s = SessionState::new(SessionOptions::default());
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.notification().is_none());
    }

    #[test]
    fn open_and_close_modal() {
        let mut s = SessionState::new(SessionOptions::default());
        s.apply(Command::OpenModal, now()).unwrap();
        assert_eq!(s.phase(), SessionPhase::Staging);
        s.apply(Command::CloseModal, now()).unwrap();
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    #[test]
    fn add_files_notifies_and_emits_event() {
        let mut s = SessionState::new(SessionOptions::default());
        s.apply(Command::OpenModal, now()).unwrap();

        let t = s
            .apply(Command::AddFiles(vec![staged("a.csv", 1), staged("b.csv", 1)]), now())
            .unwrap();

        let shown = t.shown.unwrap();
        assert_eq!(shown.message, FILES_ADDED);
        assert_eq!(shown.kind, NotificationKind::Success);
        assert_eq!(shown.expires_at, now() + chrono::Duration::milliseconds(3000));
        assert!(matches!(
            t.events.as_slice(),
            [DomainEvent::FilesAdded {
                count: 2,
                staged_total: 2
            }]
        ));
    }

    #[test]
    fn add_files_requires_open_modal() {
        let mut s = SessionState::new(SessionOptions::default());
        let err = s
            .apply(Command::AddFiles(vec![staged("a.csv", 1)]), now())
            .unwrap_err();
        assert_eq!(err, TransitionError::ModalClosed);
        assert!(s.accumulator().is_empty());
    }

    #[test]
    fn scenario_a_all_success_clears_and_closes() {
        let mut s = staging_with(vec![staged("a.csv", 10 * 1024), staged("b.csv", 20 * 1024)]);
        let files = submit(&mut s);
        assert_eq!(s.phase(), SessionPhase::Uploading);

        let t = s
            .apply(Command::BatchSettled(settle(&files, "SS")), now())
            .unwrap();

        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.accumulator().is_empty());
        assert_eq!(s.uploaded_urls(), ["u1".to_string(), "u2".to_string()]);
        let shown = t.shown.unwrap();
        assert_eq!(shown.kind, NotificationKind::Success);
        assert_eq!(shown.message, "Files uploaded to storage successfully!");
    }

    #[test]
    fn scenario_b_failure_keeps_files_for_retry() {
        let mut s = staging_with(vec![staged("a.csv", 1)]);
        let files = submit(&mut s);

        let t = s
            .apply(Command::BatchSettled(settle(&files, "F")), now())
            .unwrap();

        assert_eq!(s.phase(), SessionPhase::Staging);
        assert_eq!(staged_names(&s), ["a.csv"]);
        assert_eq!(t.shown.unwrap().kind, NotificationKind::Error);
        let report = s.view().last_batch.unwrap();
        assert_eq!(
            report.outcomes[0].result,
            crate::domain::UploadResult::Failure {
                reason: UploadError::NetworkTimeout
            }
        );
    }

    #[test]
    fn scenario_c_empty_submit_only_notifies() {
        let mut s = SessionState::new(SessionOptions::default());
        s.apply(Command::OpenModal, now()).unwrap();

        let t = s.apply(Command::Submit, now()).unwrap();

        assert!(matches!(t.effect, Effect::None));
        assert_eq!(s.phase(), SessionPhase::Staging);
        let shown = t.shown.unwrap();
        assert_eq!(shown.kind, NotificationKind::Error);
        assert_eq!(shown.message, "Please add at least one file");
    }

    #[test]
    fn scenario_d_partial_failure_keeps_every_file() {
        let names = ["f1.csv", "f2.csv", "f3.csv", "f4.csv", "f5.csv"];
        let mut s = staging_with(names.iter().map(|n| staged(n, 1)).collect());
        let files = submit(&mut s);

        s.apply(Command::BatchSettled(settle(&files, "SFSFS")), now())
            .unwrap();

        assert_eq!(staged_names(&s), names);
        assert!(s.uploaded_urls().is_empty());
        assert_eq!(s.view().last_batch.unwrap().succeeded_urls.len(), 3);
    }

    #[rstest]
    #[case::submit(Command::Submit)]
    #[case::add(Command::AddFiles(vec![]))]
    #[case::close(Command::CloseModal)]
    fn rejected_while_uploading(#[case] command: Command) {
        let mut s = staging_with(vec![staged("a.csv", 1)]);
        submit(&mut s);

        let err = s.apply(command, now()).unwrap_err();

        assert_eq!(err, TransitionError::UploadInProgress);
        assert!(s.is_uploading());
    }

    #[test]
    fn close_while_uploading_when_allowed_still_settles() {
        let mut s = SessionState::new(SessionOptions {
            allow_close_while_uploading: true,
            ..SessionOptions::default()
        });
        s.apply(Command::OpenModal, now()).unwrap();
        s.apply(Command::AddFiles(vec![staged("a.csv", 1)]), now())
            .unwrap();
        let files = submit(&mut s);

        s.apply(Command::CloseModal, now()).unwrap();
        assert_eq!(s.phase(), SessionPhase::Uploading);

        s.apply(Command::BatchSettled(settle(&files, "F")), now())
            .unwrap();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(s.accumulator().len(), 1);
    }

    #[test]
    fn submit_from_idle_is_rejected() {
        let mut s = SessionState::new(SessionOptions::default());
        assert_eq!(
            s.apply(Command::Submit, now()).unwrap_err(),
            TransitionError::ModalClosed
        );
    }

    #[test]
    fn cancel_only_while_uploading() {
        let mut s = staging_with(vec![staged("a.csv", 1)]);
        assert_eq!(
            s.apply(Command::CancelUpload, now()).unwrap_err(),
            TransitionError::NothingToCancel
        );
        submit(&mut s);
        let t = s.apply(Command::CancelUpload, now()).unwrap();
        assert!(matches!(t.effect, Effect::CancelDispatch));
    }

    #[test]
    fn dispatch_abort_resets_uploading() {
        let mut s = staging_with(vec![staged("a.csv", 1)]);
        submit(&mut s);

        let t = s
            .apply(Command::DispatchAborted(DispatchError::EmptyBatch), now())
            .unwrap();

        assert!(!s.is_uploading());
        assert_eq!(s.accumulator().len(), 1);
        assert_eq!(t.shown.unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn stale_expiry_does_not_clear_newer_notification() {
        let mut s = SessionState::new(SessionOptions::default());
        s.apply(Command::OpenModal, now()).unwrap();
        let first = s
            .apply(Command::AddFiles(vec![staged("a.csv", 1)]), now())
            .unwrap()
            .shown
            .unwrap();
        let second = s.apply(Command::Submit, now()).unwrap();
        assert!(second.shown.is_none());
        let files = match second.effect {
            Effect::Dispatch(files) => files,
            other => panic!("expected dispatch, got {other:?}"),
        };
        let newer = s
            .apply(Command::BatchSettled(settle(&files, "F")), now())
            .unwrap()
            .shown
            .unwrap();
        assert!(newer.id > first.id);

        s.apply(Command::ExpireNotification(first.id), now()).unwrap();
        assert_eq!(s.notification().map(|n| n.id), Some(newer.id));

        s.apply(Command::ExpireNotification(newer.id), now()).unwrap();
        assert!(s.notification().is_none());
    }

    #[test]
    fn remove_file_by_id() {
        let a = staged("a.csv", 1);
        let a_id = a.id();
        let mut s = staging_with(vec![a, staged("b.csv", 1)]);

        s.apply(Command::RemoveFile(a_id), now()).unwrap();
        assert_eq!(staged_names(&s), ["b.csv"]);
        assert_eq!(
            s.apply(Command::RemoveFile(a_id), now()).unwrap_err(),
            TransitionError::UnknownFile(a_id)
        );
    }

    #[test]
    fn out_of_range_ttl_never_expires_instead_of_overflowing() {
        let mut s = SessionState::new(SessionOptions {
            notification_ttl: Duration::from_millis(10_000_000_000_000_000),
            ..SessionOptions::default()
        });
        s.apply(Command::OpenModal, now()).unwrap();

        let shown = s
            .apply(Command::AddFiles(vec![staged("a.csv", 1)]), now())
            .unwrap()
            .shown
            .unwrap();

        assert_eq!(shown.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!shown.is_expired(now()));
    }

    #[test]
    fn storage_error_banner_can_be_dismissed() {
        let mut s = SessionState::new(SessionOptions::default());
        s.apply(Command::StorageUnavailable("down".into()), now())
            .unwrap();
        assert_eq!(s.view().storage_error.as_deref(), Some("down"));
        s.apply(Command::DismissStorageError, now()).unwrap();
        assert!(s.view().storage_error.is_none());
    }

    #[test]
    fn uploaded_urls_accumulate_across_batches() {
        let mut s = staging_with(vec![staged("a.csv", 1)]);
        let files = submit(&mut s);
        s.apply(Command::BatchSettled(settle(&files, "S")), now())
            .unwrap();

        s.apply(Command::OpenModal, now()).unwrap();
        s.apply(Command::AddFiles(vec![staged("b.csv", 1)]), now())
            .unwrap();
        let files = submit(&mut s);
        s.apply(Command::BatchSettled(settle(&files, "S")), now())
            .unwrap();

        assert_eq!(s.uploaded_urls().len(), 2);
    }
}
