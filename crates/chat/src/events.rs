use crate::copy_marks::CopyKey;
use crate::executor::CallOutcome;
use crate::message::MessageId;

/// Work reported back to the controller by its background tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// An executor invocation finished for the call issued by `user_id`.
    CallResolved {
        user_id: MessageId,
        outcome: CallOutcome,
    },
    /// The feedback window of a copy action elapsed.
    CopyExpired { key: CopyKey, generation: u64 },
}

/// What applying one [`ControllerEvent`] changed, for the front-end to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// The placeholder answering `user_id` now holds the reply (or error text).
    ReplyResolved {
        user_id: MessageId,
        reply_id: MessageId,
        failed: bool,
    },
    /// The call was signaled without an explicit cancel; its placeholder is gone.
    CallCancelled { user_id: MessageId },
    /// The call was no longer outstanding, so its outcome was dropped.
    ResolutionDiscarded { user_id: MessageId },
    CopyMarkCleared(CopyKey),
    Unchanged,
}
