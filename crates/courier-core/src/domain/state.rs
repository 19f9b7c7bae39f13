//! State - セッションの状態
//!
//! # 状態遷移
//! - Idle -> Staging (open modal)
//! - Staging -> Uploading (submit with staged files)
//! - Uploading -> Idle (all files succeeded: cleared, modal closed)
//! - Uploading -> Staging (any failure: files kept for retry)
//! - Staging -> Idle (close modal)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Modal closed, not uploading.
    Idle,

    /// Modal open, files being accumulated.
    Staging,

    /// A dispatch run is in flight.
    Uploading,
}

impl SessionPhase {
    /// Phase is derived from the two flags; `uploading` wins.
    pub fn from_flags(modal_open: bool, uploading: bool) -> Self {
        match (modal_open, uploading) {
            (_, true) => SessionPhase::Uploading,
            (true, false) => SessionPhase::Staging,
            (false, false) => SessionPhase::Idle,
        }
    }
}
