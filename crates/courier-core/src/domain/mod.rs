//! Domain model (ids, staged files, outcomes, notifications, events, errors).

pub mod errors;
pub mod events;
pub mod file;
pub mod ids;
pub mod notification;
pub mod outcome;
pub mod state;

pub use self::errors::{DispatchError, ErrorKind, TransitionError, UploadError};
pub use self::events::DomainEvent;
pub use self::file::{FileHandle, StagedFile, StagedFileSummary};
pub use self::ids::{BatchId, FileId};
pub use self::notification::{NoticeDraft, Notification, NotificationId, NotificationKind};
pub use self::outcome::{
    BatchReport, BatchResult, OutcomeReport, StoredObject, UploadOutcome, UploadResult,
};
pub use self::state::SessionPhase;
