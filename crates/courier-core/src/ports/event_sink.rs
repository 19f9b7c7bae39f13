//! EventSink port - イベント記録の抽象化
//!
//! dispatcher は進捗をここに流すだけで、集計はしない。
//!
//! # 実装
//! - NoopEventSink: 何もしない
//! - impls::TracingEventSink: tracing へ出力
//! - impls::RecordingEventSink: テスト・CLI サマリ用にメモリへ記録

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを受け取る
///
/// emit は同期・非ブロッキングであること（dispatch lane の中から呼ばれる）。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, event: DomainEvent) {
        (**self).emit(event)
    }
}
