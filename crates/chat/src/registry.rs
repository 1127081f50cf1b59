use std::collections::HashMap;

use snafu::ensure;

use crate::cancel::CancellationToken;
use crate::error::{CallAlreadyInFlightSnafu, ChatResult};
use crate::message::MessageId;

/// Outstanding calls keyed by the user message that issued them.
///
/// An entry exists exactly while the call is issued and not yet resolved, cancelled, or
/// unregistered. Cancel/retry affordances are derived from this map alone.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: HashMap<MessageId, CancellationToken>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the token for `id`. At most one call may be in flight per user message.
    pub fn register(&mut self, id: MessageId, token: CancellationToken) -> ChatResult<()> {
        ensure!(
            !self.calls.contains_key(&id),
            CallAlreadyInFlightSnafu {
                stage: "register-call",
                id,
            }
        );
        self.calls.insert(id, token);
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&CancellationToken> {
        self.calls.get(&id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.calls.contains_key(&id)
    }

    /// Removes the entry for `id`, returning its token. No-op when absent.
    pub fn unregister(&mut self, id: MessageId) -> Option<CancellationToken> {
        self.calls.remove(&id)
    }

    /// Signals and removes the entry for `id`. Returns whether a call was in flight.
    pub fn cancel_and_unregister(&mut self, id: MessageId) -> bool {
        match self.calls.remove(&id) {
            Some(token) => {
                token.signal();
                true
            }
            None => false,
        }
    }

    /// Signals every outstanding call and empties the registry.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.calls.len();
        for (_, token) in self.calls.drain() {
            token.signal();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
