#![deny(unsafe_code)]

//! Per-message request lifecycle for a chat front-end.
//!
//! Every submitted prompt becomes a user record plus an assistant placeholder in the
//! [`Ledger`], and one outstanding call tracked by the [`CallRegistry`]. The
//! [`ChatController`] is the only writer of both.

pub mod cancel;
pub mod clipboard;
pub mod controller;
pub mod copy_marks;
pub mod error;
pub mod events;
pub mod executor;
pub mod message;
pub mod registry;
pub mod render;

pub use cancel::CancellationToken;
pub use clipboard::{Clipboard, MemoryClipboard};
pub use controller::{
    Affordance, CODE_COPY_WINDOW, ChatController, ControllerConfig, MESSAGE_COPY_WINDOW,
};
pub use copy_marks::{CopyKey, CopyMarks, CopyTarget};
pub use error::{ChatError, ChatResult, ClipboardError};
pub use events::{ControllerEvent, Update};
pub use executor::{
    CallFailure, CallOutcome, DEFAULT_MAX_LATENCY, DEFAULT_MIN_LATENCY, FailureKind,
    LatencyWindow, NO_RESPONSE_TEXT, RequestExecutor, UNKNOWN_ERROR_TEXT,
};
pub use message::{Ledger, Message, MessageId, MessageStatus, Role};
pub use registry::CallRegistry;
pub use render::{CodeBlock, CodePresenter, Renderer, Segment, code_blocks, parse_segments};
