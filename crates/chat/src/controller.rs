use std::sync::Arc;
use std::time::Duration;

use chatline_llm::ChatService;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::sync::mpsc;

use crate::cancel::CancellationToken;
use crate::clipboard::Clipboard;
use crate::copy_marks::{CopyKey, CopyMarks, CopyTarget};
use crate::error::{
    ChatResult, ClipboardWriteSnafu, MissingCodeBlockSnafu, NothingToCopySnafu,
    UnknownMessageSnafu,
};
use crate::events::{ControllerEvent, Update};
use crate::executor::{CallFailure, CallOutcome, LatencyWindow, RequestExecutor};
use crate::message::{Ledger, MessageId};
use crate::registry::CallRegistry;
use crate::render::code_blocks;

/// Feedback window after copying a whole message.
pub const MESSAGE_COPY_WINDOW: Duration = Duration::from_millis(2_000);
/// Feedback window after copying one code block.
pub const CODE_COPY_WINDOW: Duration = Duration::from_millis(1_500);

const ABANDONED_CALL_MESSAGE: &str = "request ended before a response was received";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub latency: LatencyWindow,
    pub message_copy_window: Duration,
    pub code_copy_window: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            latency: LatencyWindow::default(),
            message_copy_window: MESSAGE_COPY_WINDOW,
            code_copy_window: CODE_COPY_WINDOW,
        }
    }
}

/// Action the front-end offers next to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    None,
    /// The paired call is in flight.
    Cancel { user_id: MessageId },
    /// The reply is complete (success or error text) and can be requested again.
    Retry { assistant_id: MessageId },
}

/// Owns the conversation and every call issued for it.
///
/// All state changes happen through `&mut self`: executor tasks run on tokio but only
/// report back over a channel, and the owner applies those reports with
/// [`ChatController::next_update`]. Ledger writes for one user message are therefore
/// strictly ordered, while calls for different messages proceed independently.
pub struct ChatController {
    ledger: Ledger,
    registry: CallRegistry,
    copy_marks: CopyMarks,
    executor: Arc<RequestExecutor>,
    clipboard: Arc<dyn Clipboard>,
    config: ControllerConfig,
    input: String,
    next_message_id: u64,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: mpsc::UnboundedReceiver<ControllerEvent>,
}

impl ChatController {
    pub fn new(
        service: Arc<dyn ChatService>,
        clipboard: Arc<dyn Clipboard>,
        config: ControllerConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            ledger: Ledger::new(),
            registry: CallRegistry::new(),
            copy_marks: CopyMarks::new(),
            executor: Arc::new(RequestExecutor::new(service, config.latency)),
            clipboard,
            config,
            input: String::new(),
            next_message_id: 1,
            event_tx,
            event_rx,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn is_in_flight(&self, user_id: MessageId) -> bool {
        self.registry.contains(user_id)
    }

    pub fn is_copied(&self, message_id: MessageId, target: CopyTarget) -> bool {
        self.copy_marks.is_marked(CopyKey::new(message_id, target))
    }

    pub fn affordance(&self, message_id: MessageId) -> Affordance {
        let Some(message) = self.ledger.get(message_id) else {
            return Affordance::None;
        };
        let Some(user_id) = message.reply_to else {
            return Affordance::None;
        };

        if self.registry.contains(user_id) {
            Affordance::Cancel { user_id }
        } else if message.is_placeholder() {
            Affordance::None
        } else {
            Affordance::Retry {
                assistant_id: message_id,
            }
        }
    }

    /// Starts a turn for `prompt`. Blank prompts are ignored.
    ///
    /// Returns the id of the new user record; the call it issued is registered under it.
    pub fn submit(&mut self, prompt: &str) -> Option<MessageId> {
        if prompt.trim().is_empty() {
            return None;
        }

        let user_id = self.alloc_message_id();
        let reply_id = self.alloc_message_id();

        self.ledger.push_user(user_id, prompt);
        let paired = self.ledger.push_placeholder(reply_id, user_id);
        debug_assert!(paired, "fresh user record {user_id} must accept a placeholder");
        self.input.clear();

        let token = CancellationToken::new();
        if let Err(error) = self.registry.register(user_id, token.clone()) {
            // Ids are never reused, so a duplicate entry means the bookkeeping is broken.
            tracing::error!(user_id = %user_id, error = %error, "call registry invariant violated");
            unreachable!("{error}");
        }

        self.spawn_call(user_id, prompt.to_string(), token);
        Some(user_id)
    }

    /// Submits the current input draft.
    pub fn submit_input(&mut self) -> Option<MessageId> {
        let prompt = self.input.clone();
        self.submit(&prompt)
    }

    /// Cancels the call issued by `user_id` and drops its placeholder.
    ///
    /// Returns `false` when nothing is in flight for that message.
    pub fn cancel(&mut self, user_id: MessageId) -> bool {
        if !self.registry.cancel_and_unregister(user_id) {
            tracing::debug!(user_id = %user_id, "cancel ignored; no call in flight");
            return false;
        }

        if let Some(reply) = self.ledger.remove_reply(user_id) {
            self.copy_marks.forget(reply.id);
        }
        tracing::debug!(user_id = %user_id, "call cancelled");
        true
    }

    /// Replaces the completed reply `assistant_id` with a fresh call for the same prompt.
    ///
    /// The prompt is submitted again as a new turn with new ids. Returns the new user
    /// record id, or `None` when the reply is unknown or its call is still in flight.
    pub fn retry(&mut self, assistant_id: MessageId) -> Option<MessageId> {
        let Some(prompt) = self.ledger.prompt_for(assistant_id) else {
            tracing::debug!(assistant_id = %assistant_id, "retry ignored; no paired prompt");
            return None;
        };
        let (user_id, text) = (prompt.id, prompt.text.clone());

        if self.registry.contains(user_id) {
            tracing::warn!(user_id = %user_id, "retry ignored while the call is in flight");
            return None;
        }

        self.ledger.remove(assistant_id);
        self.copy_marks.forget(assistant_id);
        self.submit(&text)
    }

    /// Writes `text` to the clipboard and raises the copy mark for `target`.
    ///
    /// A clipboard failure is returned to the caller and leaves no mark.
    pub fn copy(
        &mut self,
        message_id: MessageId,
        target: CopyTarget,
        text: &str,
    ) -> ChatResult<()> {
        if let Err(error) = self.clipboard.write_text(text) {
            tracing::warn!(message_id = %message_id, error = %error, "clipboard write failed");
            return Err(error).context(ClipboardWriteSnafu {
                stage: "copy-to-clipboard",
            });
        }

        let key = CopyKey::new(message_id, target);
        let generation = self.copy_marks.mark(key);
        let window = match target {
            CopyTarget::Message => self.config.message_copy_window,
            CopyTarget::CodeBlock(_) => self.config.code_copy_window,
        };

        let events = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = events.send(ControllerEvent::CopyExpired { key, generation });
        });
        Ok(())
    }

    pub fn copy_message(&mut self, message_id: MessageId) -> ChatResult<()> {
        let message = self.ledger.get(message_id).context(UnknownMessageSnafu {
            stage: "copy-message",
            id: message_id,
        })?;
        ensure!(
            !message.is_placeholder(),
            NothingToCopySnafu {
                stage: "copy-message",
                id: message_id,
            }
        );

        let text = message.text.clone();
        self.copy(message_id, CopyTarget::Message, &text)
    }

    pub fn copy_code_block(&mut self, message_id: MessageId, index: usize) -> ChatResult<()> {
        let message = self.ledger.get(message_id).context(UnknownMessageSnafu {
            stage: "copy-code-block",
            id: message_id,
        })?;
        let block = code_blocks(&message.text)
            .into_iter()
            .nth(index)
            .context(MissingCodeBlockSnafu {
                stage: "copy-code-block",
                id: message_id,
                index,
            })?;

        self.copy(message_id, CopyTarget::CodeBlock(index), block.copy_text())
    }

    /// Waits for the next background report and applies it.
    pub async fn next_update(&mut self) -> Update {
        match self.event_rx.recv().await {
            Some(event) => self.apply(event),
            // The controller keeps a sender alive, so the channel cannot close.
            None => Update::Unchanged,
        }
    }

    /// Applies every report that is already queued, without waiting.
    pub fn drain_updates(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            updates.push(self.apply(event));
        }
        updates
    }

    pub fn apply(&mut self, event: ControllerEvent) -> Update {
        match event {
            ControllerEvent::CallResolved { user_id, outcome } => {
                self.apply_resolution(user_id, outcome)
            }
            ControllerEvent::CopyExpired { key, generation } => {
                if self.copy_marks.expire(key, generation) {
                    Update::CopyMarkCleared(key)
                } else {
                    Update::Unchanged
                }
            }
        }
    }

    /// Signals every outstanding call. Late resolutions are discarded afterwards.
    pub fn shutdown(&mut self) -> usize {
        let cancelled = self.registry.cancel_all();
        self.copy_marks.clear();
        if cancelled > 0 {
            tracing::info!(cancelled, "signaled outstanding calls on teardown");
        }
        cancelled
    }

    fn apply_resolution(&mut self, user_id: MessageId, outcome: CallOutcome) -> Update {
        // The registry entry goes away whatever the outcome.
        if self.registry.unregister(user_id).is_none() {
            tracing::debug!(
                user_id = %user_id,
                cancelled = outcome.is_cancelled(),
                "discarding resolution of a call that is no longer outstanding"
            );
            return Update::ResolutionDiscarded { user_id };
        }

        let (text, failed) = match outcome {
            CallOutcome::Success(text) => (text, false),
            CallOutcome::Failure(failure) => (failure.reply_text(), true),
            CallOutcome::Cancelled => {
                if let Some(reply) = self.ledger.remove_reply(user_id) {
                    self.copy_marks.forget(reply.id);
                }
                tracing::debug!(
                    user_id = %user_id,
                    "call ended cancelled without an explicit cancel"
                );
                return Update::CallCancelled { user_id };
            }
        };

        match self.ledger.resolve(user_id, text) {
            Some(reply_id) => {
                tracing::debug!(user_id = %user_id, reply_id = %reply_id, failed, "call resolved");
                Update::ReplyResolved {
                    user_id,
                    reply_id,
                    failed,
                }
            }
            None => {
                tracing::warn!(user_id = %user_id, "resolved call has no placeholder to fill");
                Update::Unchanged
            }
        }
    }

    fn spawn_call(&self, user_id: MessageId, prompt: String, token: CancellationToken) {
        let executor = Arc::clone(&self.executor);
        let report = ResolutionReport::new(user_id, self.event_tx.clone());

        tracing::debug!(
            user_id = %user_id,
            service_id = %executor.service_id(),
            "issuing chat call"
        );

        tokio::spawn(async move {
            let outcome = executor.execute(&prompt, &token).await;
            report.deliver(outcome);
        });
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sends the outcome of one call back to the controller exactly once.
///
/// If the executor task dies before delivering (panic or runtime shutdown), the drop
/// path still reports a transport failure so the registry entry is cleaned up.
struct ResolutionReport {
    user_id: MessageId,
    events: Option<mpsc::UnboundedSender<ControllerEvent>>,
}

impl ResolutionReport {
    fn new(user_id: MessageId, events: mpsc::UnboundedSender<ControllerEvent>) -> Self {
        Self {
            user_id,
            events: Some(events),
        }
    }

    fn deliver(mut self, outcome: CallOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: CallOutcome) {
        if let Some(events) = self.events.take() {
            let _ = events.send(ControllerEvent::CallResolved {
                user_id: self.user_id,
                outcome,
            });
        }
    }
}

impl Drop for ResolutionReport {
    fn drop(&mut self) {
        self.send(CallOutcome::Failure(CallFailure::transport(
            ABANDONED_CALL_MESSAGE,
        )));
    }
}
