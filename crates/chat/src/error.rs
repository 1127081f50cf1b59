use snafu::Snafu;

use crate::message::MessageId;

/// Failure reported by the clipboard collaborator.
#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct ClipboardError {
    pub message: String,
}

impl ClipboardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("a call for message {id} is already in flight"))]
    CallAlreadyInFlight { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} is not in the conversation"))]
    UnknownMessage { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} has no text to copy yet"))]
    NothingToCopy { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} has no code block #{index}"))]
    MissingCodeBlock {
        stage: &'static str,
        id: MessageId,
        index: usize,
    },
    #[snafu(display("clipboard write failed on `{stage}`: {source}"))]
    ClipboardWrite {
        stage: &'static str,
        source: ClipboardError,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;
