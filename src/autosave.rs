//! Debounced conversation auto-save
//!
//! Chat messages are auto-saved after each completed assistant reply, but
//! rapid successive turns must not hammer the store: every [`AutoSaver::schedule`]
//! call restarts a single delay timer, and only the most recently scheduled
//! payload is written when the timer fires. The saver is owned by one
//! conversation and its timer dies with it.

use crate::chat::ChatMessage;
use crate::store::{ConversationId, ConversationStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Default quiescence window before a scheduled save is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Coalesces save requests into one durable write per quiescent period.
pub struct AutoSaver {
    store: Arc<dyn ConversationStore>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    errors: mpsc::UnboundedSender<StoreError>,
}

impl std::fmt::Debug for AutoSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaver")
            .field("delay", &self.delay)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

impl AutoSaver {
    /// Create a saver plus the channel on which write failures are reported.
    ///
    /// Failed writes never crash the conversation: the in-memory list stays
    /// intact and the next schedule retries implicitly.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<StoreError>) {
        let (errors, error_rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                delay,
                pending: None,
                errors,
            },
            error_rx,
        )
    }

    /// Schedule a write of the full message list, restarting any pending timer.
    ///
    /// A `None` target is a no-op: auto-save only applies once the caller has
    /// created the durable record with an explicit save.
    pub fn schedule(&mut self, target: Option<&ConversationId>, messages: Vec<ChatMessage>) {
        let Some(target) = target else {
            return;
        };
        self.cancel_pending();

        let store = Arc::clone(&self.store);
        let errors = self.errors.clone();
        let delay = self.delay;
        let target = target.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.update_messages(&target, &messages).await {
                warn!(conversation = %target, error = %e, "auto-save write failed");
                let _ = errors.send(e);
            }
        }));
    }

    /// Drop any not-yet-fired save.
    pub fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a save is scheduled but not yet written.
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OwnerId;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Store double that records every write.
    #[derive(Default)]
    struct CountingStore {
        writes: AtomicUsize,
        last: Mutex<Vec<ChatMessage>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ConversationStore for CountingStore {
        async fn create(
            &self,
            _owner: &OwnerId,
            _messages: &[ChatMessage],
            _context: serde_json::Value,
        ) -> Result<ConversationId, StoreError> {
            Ok(ConversationId("conv_test".into()))
        }

        async fn update_messages(
            &self,
            _id: &ConversationId,
            messages: &[ChatMessage],
        ) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Storage("backend down".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = messages.to_vec();
            Ok(())
        }
    }

    fn target() -> ConversationId {
        ConversationId("conv_test".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_coalesce_to_one_write() {
        let store = Arc::new(CountingStore::default());
        let (mut saver, _errors) = AutoSaver::new(store.clone(), DEFAULT_DEBOUNCE);

        for i in 0..5 {
            saver.schedule(Some(&target()), vec![ChatMessage::user(format!("v{i}"))]);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(*store.last.lock().unwrap(), vec![ChatMessage::user("v4")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiescent_periods_write_separately() {
        let store = Arc::new(CountingStore::default());
        let (mut saver, _errors) = AutoSaver::new(store.clone(), DEFAULT_DEBOUNCE);

        saver.schedule(Some(&target()), vec![ChatMessage::user("first")]);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        saver.schedule(Some(&target()), vec![ChatMessage::user("second")]);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        assert_eq!(*store.last.lock().unwrap(), vec![ChatMessage::user("second")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_without_target_is_noop() {
        let store = Arc::new(CountingStore::default());
        let (mut saver, _errors) = AutoSaver::new(store.clone(), DEFAULT_DEBOUNCE);

        saver.schedule(None, vec![ChatMessage::user("unsaved")]);
        assert!(!saver.has_pending());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_prevents_write() {
        let store = Arc::new(CountingStore::default());
        let (mut saver, _errors) = AutoSaver::new(store.clone(), DEFAULT_DEBOUNCE);

        saver.schedule(Some(&target()), vec![ChatMessage::user("doomed")]);
        saver.cancel_pending();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_reported_on_error_channel() {
        let store = Arc::new(CountingStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let (mut saver, mut errors) = AutoSaver::new(store.clone(), DEFAULT_DEBOUNCE);

        saver.schedule(Some(&target()), vec![ChatMessage::user("q")]);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let err = errors.try_recv().unwrap();
        assert!(matches!(err, StoreError::Storage(_)));

        // A later schedule retries against the recovered backend
        store.fail.store(false, Ordering::SeqCst);
        saver.schedule(Some(&target()), vec![ChatMessage::user("q")]);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }
}
