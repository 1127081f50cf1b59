use std::fmt;

/// Stable identifier for one message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    /// Assistant record created on submit, waiting for its call to resolve.
    Placeholder,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
    /// For assistant records, the user record this one answers.
    pub reply_to: Option<MessageId>,
}

impl Message {
    /// Creates a user turn. User records are complete from the start.
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            text: text.into(),
            status: MessageStatus::Complete,
            reply_to: None,
        }
    }

    /// Creates an empty assistant placeholder paired with `reply_to`.
    pub fn placeholder(id: MessageId, reply_to: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: String::new(),
            status: MessageStatus::Placeholder,
            reply_to: Some(reply_to),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_placeholder(&self) -> bool {
        self.status == MessageStatus::Placeholder
    }
}

/// Ordered record of the conversation.
///
/// Reads are public. Writes are crate-private: the lifecycle controller is the only
/// component allowed to mutate the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    messages: Vec<Message>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Assistant record paired with the user record `user_id`, if one exists.
    pub fn reply_for(&self, user_id: MessageId) -> Option<&Message> {
        self.messages
            .iter()
            .find(|message| message.reply_to == Some(user_id))
    }

    /// User record that the assistant record `assistant_id` answers.
    pub fn prompt_for(&self, assistant_id: MessageId) -> Option<&Message> {
        let user_id = self.get(assistant_id)?.reply_to?;
        self.get(user_id).filter(|message| message.is_user())
    }

    /// Every assistant record is preceded by the user record it answers, and no user
    /// record has more than one answer.
    pub fn pairing_holds(&self) -> bool {
        self.messages.iter().enumerate().all(|(index, message)| {
            let Some(user_id) = message.reply_to else {
                return message.is_user();
            };
            let earlier = self.messages[..index]
                .iter()
                .any(|candidate| candidate.id == user_id && candidate.is_user());
            let answers = self
                .messages
                .iter()
                .filter(|candidate| candidate.reply_to == Some(user_id))
                .count();
            earlier && answers == 1
        })
    }

    pub(crate) fn push_user(&mut self, id: MessageId, text: impl Into<String>) {
        self.messages.push(Message::user(id, text));
    }

    /// Appends a placeholder for `reply_to`. Refuses when the user record is missing or
    /// already answered, which would break the pairing.
    pub(crate) fn push_placeholder(&mut self, id: MessageId, reply_to: MessageId) -> bool {
        let user_present = self
            .get(reply_to)
            .is_some_and(|message| message.is_user());
        if !user_present || self.reply_for(reply_to).is_some() {
            return false;
        }

        self.messages.push(Message::placeholder(id, reply_to));
        true
    }

    /// Completes the placeholder answering `user_id`. Returns the id of the completed
    /// record, or `None` when no placeholder is waiting for that user record.
    pub(crate) fn resolve(&mut self, user_id: MessageId, text: String) -> Option<MessageId> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.reply_to == Some(user_id) && message.is_placeholder())?;

        message.text = text;
        message.status = MessageStatus::Complete;
        Some(message.id)
    }

    pub(crate) fn remove_reply(&mut self, user_id: MessageId) -> Option<Message> {
        let index = self
            .messages
            .iter()
            .position(|message| message.reply_to == Some(user_id))?;
        Some(self.messages.remove(index))
    }

    pub(crate) fn remove(&mut self, id: MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|message| message.id == id)?;
        Some(self.messages.remove(index))
    }
}
