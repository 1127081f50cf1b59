use std::collections::HashMap;

use crate::message::MessageId;

/// What a copy action copied: the full message or one of its code blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyTarget {
    Message,
    CodeBlock(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyKey {
    pub message_id: MessageId,
    pub target: CopyTarget,
}

impl CopyKey {
    pub const fn new(message_id: MessageId, target: CopyTarget) -> Self {
        Self { message_id, target }
    }
}

/// Transient "just copied" flags. Presentational only.
///
/// Each mark remembers the generation that set it, so an expiry scheduled by an older
/// copy cannot clear a mark refreshed by a newer one.
#[derive(Debug, Default)]
pub struct CopyMarks {
    marks: HashMap<CopyKey, u64>,
    next_generation: u64,
}

impl CopyMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, key: CopyKey) -> u64 {
        self.next_generation = self.next_generation.wrapping_add(1);
        self.marks.insert(key, self.next_generation);
        self.next_generation
    }

    /// Clears `key` if it is still owned by `generation`.
    pub fn expire(&mut self, key: CopyKey, generation: u64) -> bool {
        if self.marks.get(&key) != Some(&generation) {
            return false;
        }
        self.marks.remove(&key);
        true
    }

    pub fn is_marked(&self, key: CopyKey) -> bool {
        self.marks.contains_key(&key)
    }

    /// Drops every mark belonging to `message_id`.
    pub fn forget(&mut self, message_id: MessageId) {
        self.marks.retain(|key, _| key.message_id != message_id);
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }
}
