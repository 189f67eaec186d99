//! High-level roadmap client
//!
//! Ties the streaming core together the way the web app uses it: generate a
//! roadmap, chat about it with optimistic draft handling, and auto-save the
//! conversation once a durable record exists. One client owns one roadmap's
//! state at a time; starting a new generation replaces it.

use crate::autosave::{AutoSaver, DEFAULT_DEBOUNCE};
use crate::chat::{ChatHistory, ChatMessage};
use crate::client::HttpClient;
use crate::prompt::RoadmapContext;
use crate::session::{SessionError, SessionUpdate, StreamRequest, StreamSession};
use crate::store::{ConversationId, ConversationStore, OwnerId, StoreError};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use url::Url;

/// Everything that can go wrong driving a roadmap interaction.
#[derive(Debug, thiserror::Error)]
pub enum RoadmapError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("no active roadmap to chat about")]
    NoActiveRoadmap,
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to encode request payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Context carried from generation into follow-up chat.
#[derive(Debug, Clone)]
struct ChatContext {
    career_path_name: String,
}

/// Client-side driver for the roadmap feature.
pub struct RoadmapClient<T: HttpClient> {
    http_client: T,
    gateway_url: Url,
    publishable_key: Option<String>,
    owner: Option<OwnerId>,
    store: Arc<dyn ConversationStore>,
    autosave: AutoSaver,

    roadmap_content: String,
    history: ChatHistory,
    chat_context: Option<ChatContext>,
    current_id: Option<ConversationId>,

    updates_tx: watch::Sender<SessionUpdate>,
    updates_rx: watch::Receiver<SessionUpdate>,
}

impl<T: HttpClient> RoadmapClient<T> {
    /// Create a client plus the channel carrying auto-save write failures.
    pub fn new(
        http_client: T,
        gateway_url: Url,
        publishable_key: Option<String>,
        owner: Option<OwnerId>,
        store: Arc<dyn ConversationStore>,
    ) -> (Self, mpsc::UnboundedReceiver<StoreError>) {
        let (autosave, save_errors) = AutoSaver::new(Arc::clone(&store), DEFAULT_DEBOUNCE);
        let (updates_tx, updates_rx) = watch::channel(SessionUpdate::default());
        (
            Self {
                http_client,
                gateway_url,
                publishable_key,
                owner,
                store,
                autosave,
                roadmap_content: String::new(),
                history: ChatHistory::new(),
                chat_context: None,
                current_id: None,
                updates_tx,
                updates_rx,
            },
            save_errors,
        )
    }

    /// Observe live session updates (growing text + state) across requests.
    pub fn updates(&self) -> watch::Receiver<SessionUpdate> {
        self.updates_rx.clone()
    }

    pub fn roadmap_content(&self) -> &str {
        &self.roadmap_content
    }

    /// The conversation as rendered: finished messages plus any draft.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    pub fn current_id(&self) -> Option<&ConversationId> {
        self.current_id.as_ref()
    }

    /// Generate a fresh roadmap, replacing any loaded one.
    pub async fn generate(&mut self, context: RoadmapContext) -> Result<&str, RoadmapError> {
        self.reset();
        let career_path_name = context.career_path_name.clone();

        let request = StreamRequest::builder()
            .url(self.gateway_url.join("v1/roadmaps/generate")?.to_string())
            .maybe_bearer(self.publishable_key.clone())
            .body(serde_json::to_value(&context)?)
            .build();

        let text = self.run_session(request, false).await?;
        info!(career_path = %career_path_name, chars = text.len(), "roadmap generated");
        self.roadmap_content = text;
        self.chat_context = Some(ChatContext { career_path_name });
        Ok(&self.roadmap_content)
    }

    /// Send one chat message about the active roadmap.
    ///
    /// The user message and the streaming draft are optimistic: both are
    /// rolled back if the request fails. On success the draft is promoted
    /// and, if the roadmap has been saved, the full list is scheduled for a
    /// debounced auto-save.
    pub async fn send_chat_message(&mut self, message: &str) -> Result<(), RoadmapError> {
        let context = self
            .chat_context
            .clone()
            .ok_or(RoadmapError::NoActiveRoadmap)?;

        self.history.push(ChatMessage::user(message));
        self.history.open_draft();

        let request = StreamRequest::builder()
            .url(self.gateway_url.join("v1/roadmaps/chat")?.to_string())
            .maybe_bearer(self.publishable_key.clone())
            .body(json!({
                "roadmap_content": self.roadmap_content,
                "career_path_name": context.career_path_name,
                "messages": self.history.messages(),
            }))
            .build();

        match self.run_session(request, true).await {
            Ok(text) => {
                self.history.update_draft(text);
                self.history.promote_draft();
                self.autosave
                    .schedule(self.current_id.as_ref(), self.history.messages().to_vec());
                Ok(())
            }
            Err(e) => {
                // Roll back the optimistic placeholder and user message
                self.history.discard_draft();
                self.history.pop();
                Err(e.into())
            }
        }
    }

    /// Persist the roadmap and conversation, enabling auto-save.
    pub async fn save(&mut self) -> Result<ConversationId, RoadmapError> {
        let owner = self.owner.as_ref().ok_or(RoadmapError::NotAuthenticated)?;
        let context = json!({
            "roadmap_content": self.roadmap_content,
            "career_path_name": self
                .chat_context
                .as_ref()
                .map(|c| c.career_path_name.clone()),
        });
        let id = self
            .store
            .create(owner, self.history.messages(), context)
            .await?;
        self.current_id = Some(id.clone());
        Ok(id)
    }

    /// Swap in a previously saved roadmap.
    pub fn load(
        &mut self,
        id: ConversationId,
        roadmap_content: String,
        career_path_name: String,
        messages: Vec<ChatMessage>,
    ) {
        self.reset();
        self.roadmap_content = roadmap_content;
        self.history = ChatHistory::from_messages(messages);
        self.chat_context = Some(ChatContext { career_path_name });
        self.current_id = Some(id);
    }

    /// Clear all in-memory roadmap state and any pending auto-save.
    pub fn reset(&mut self) {
        self.roadmap_content.clear();
        self.history = ChatHistory::new();
        self.chat_context = None;
        self.current_id = None;
        self.autosave.cancel_pending();
    }

    /// Run one session, mirroring its updates into the client channel (and
    /// into the chat draft when one is open).
    async fn run_session(
        &mut self,
        request: StreamRequest,
        into_draft: bool,
    ) -> Result<String, SessionError> {
        let session = StreamSession::new();
        let mut session_updates = session.handle().subscribe();

        let run = session.run(&self.http_client, request);
        tokio::pin!(run);

        loop {
            tokio::select! {
                result = &mut run => {
                    // The session publishes its terminal snapshot right
                    // before resolving, after our last poll; mirror it
                    // unconditionally so observers see the final state.
                    let update = session_updates.borrow_and_update().clone();
                    if into_draft {
                        self.history.update_draft(update.text.clone());
                    }
                    self.updates_tx.send_replace(update);
                    return result;
                }
                changed = session_updates.changed() => {
                    if changed.is_ok() {
                        let update = session_updates.borrow_and_update().clone();
                        if into_draft {
                            self.history.update_draft(update.text.clone());
                        }
                        self.updates_tx.send_replace(update);
                    }
                }
            }
        }
    }
}
