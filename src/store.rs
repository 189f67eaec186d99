//! Durable conversation storage trait
//!
//! The relational backend (profiles, roadmaps, conversations) is an external
//! collaborator: this crate only needs "create a record" and "replace its
//! message list". Each write replaces the full list; there is no row-level
//! merge, so two writers racing on one record are last-writer-wins.

use crate::chat::ChatMessage;
use async_trait::async_trait;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque identifier of the user owning a record, supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(pub String);

/// Identifier of a durable conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error type for store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// The durable record: full message list plus metadata.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub owner: OwnerId,
    pub messages: Vec<ChatMessage>,
    /// Opaque feature context (roadmap text, career path, ...), stored as-is.
    pub context: serde_json::Value,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Trait for creating and updating durable conversation records.
///
/// Implement this against the real backend; the crate ships an in-memory
/// implementation for tests and examples.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a record and return its id.
    async fn create(
        &self,
        owner: &OwnerId,
        messages: &[ChatMessage],
        context: serde_json::Value,
    ) -> Result<ConversationId, StoreError>;

    /// Replace the full message list of an existing record, bumping its
    /// modification timestamp.
    async fn update_messages(
        &self,
        id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), StoreError>;
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// In-memory store for tests and examples.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: std::sync::RwLock<std::collections::HashMap<String, ConversationRecord>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ConversationId) -> Option<ConversationRecord> {
        self.records.read().unwrap().get(&id.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create(
        &self,
        owner: &OwnerId,
        messages: &[ChatMessage],
        context: serde_json::Value,
    ) -> Result<ConversationId, StoreError> {
        let n = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let id = format!("conv_{n:08x}");
        let now = unix_now();
        let record = ConversationRecord {
            owner: owner.clone(),
            messages: messages.to_vec(),
            context,
            created_at: now,
            updated_at: now,
        };
        self.records.write().unwrap().insert(id.clone(), record);
        Ok(ConversationId(id))
    }

    async fn update_messages(
        &self,
        id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound(id.0.clone()))?;
        record.messages = messages.to_vec();
        record.updated_at = unix_now();
        Ok(())
    }
}
