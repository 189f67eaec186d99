//! Chat message data model
//!
//! Conversations are append-only lists of immutable messages plus at most one
//! [`DraftMessage`]: the single mutable slot holding the assistant reply
//! while it is still streaming. The draft is promoted to a real message only
//! when its stream completes, and discarded wholesale when it fails, so
//! optimistic UI state never leaks into the durable history.
//!
//! Role alternation is deliberately not enforced; the durable record accepts
//! whatever order the caller produced.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One finished conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The assistant message currently being streamed.
///
/// Content is replaced with each (strictly longer) accumulator snapshot
/// rather than appended here, mirroring how the session republishes the full
/// buffer on every update.
#[derive(Debug, Clone, Default)]
pub struct DraftMessage {
    content: String,
}

impl DraftMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the draft content with the latest accumulated buffer.
    pub fn update(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Freeze the draft into an immutable assistant message.
    pub fn promote(self) -> ChatMessage {
        ChatMessage::assistant(self.content)
    }
}

/// An in-memory conversation: finished messages plus an optional draft.
#[derive(Debug, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
    draft: Option<DraftMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            draft: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.draft.is_none()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Open the streaming slot. Any previous draft is discarded.
    pub fn open_draft(&mut self) -> &mut DraftMessage {
        self.draft.insert(DraftMessage::new())
    }

    pub fn update_draft(&mut self, content: impl Into<String>) {
        if let Some(draft) = self.draft.as_mut() {
            draft.update(content);
        }
    }

    pub fn draft(&self) -> Option<&DraftMessage> {
        self.draft.as_ref()
    }

    /// Promote the draft into the message list at stream completion.
    pub fn promote_draft(&mut self) {
        if let Some(draft) = self.draft.take() {
            self.messages.push(draft.promote());
        }
    }

    /// Drop the draft without promoting it (stream failed or was replaced).
    pub fn discard_draft(&mut self) {
        self.draft = None;
    }

    /// Remove and return the most recent finished message.
    ///
    /// Used to roll back an optimistic user message when its request fails.
    pub fn pop(&mut self) -> Option<ChatMessage> {
        self.messages.pop()
    }

    /// The full conversation as the UI sees it: finished messages followed
    /// by the draft rendered as a trailing assistant message.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        let mut view = self.messages.clone();
        if let Some(draft) = &self.draft {
            view.push(ChatMessage::assistant(draft.content()));
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization_shape() {
        let message = ChatMessage::user("hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let parsed: ChatMessage =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": "yo"}))
                .unwrap();
        assert_eq!(parsed, ChatMessage::assistant("yo"));
    }

    #[test]
    fn test_draft_promotes_to_assistant_message() {
        let mut history = ChatHistory::new();
        history.push(ChatMessage::user("question"));
        history.open_draft();
        history.update_draft("partial");
        history.update_draft("partial answer");
        history.promote_draft();

        assert_eq!(history.messages().len(), 2);
        assert_eq!(
            history.messages()[1],
            ChatMessage::assistant("partial answer")
        );
        assert!(history.draft().is_none());
    }

    #[test]
    fn test_discard_draft_rolls_back_streaming_state() {
        let mut history = ChatHistory::new();
        history.push(ChatMessage::user("question"));
        history.open_draft();
        history.update_draft("half an ans");
        history.discard_draft();
        history.pop();

        assert!(history.is_empty());
    }

    #[test]
    fn test_snapshot_includes_draft_as_trailing_message() {
        let mut history = ChatHistory::from_messages(vec![ChatMessage::user("q")]);
        history.open_draft();
        history.update_draft("typing...");

        let view = history.snapshot();
        assert_eq!(view.len(), 2);
        assert_eq!(view[1], ChatMessage::assistant("typing..."));
        // Snapshot does not promote; the draft is still pending
        assert_eq!(history.messages().len(), 1);
    }

    #[test]
    fn test_roles_are_not_validated_for_alternation() {
        let mut history = ChatHistory::new();
        history.push(ChatMessage::user("one"));
        history.push(ChatMessage::user("two"));
        assert_eq!(history.messages().len(), 2);
    }
}
