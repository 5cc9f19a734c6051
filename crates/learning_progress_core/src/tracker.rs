//! crates/learning_progress_core/src/tracker.rs
//!
//! The client-side reading-progress store for one learning history.
//!
//! The tracker is the only local copy of the learner's progress. Page turns are
//! applied locally first and then pushed through the [`ProgressSync`] port. A
//! failed push is logged and remembered but neither retried nor rolled back, so
//! the displayed page may run ahead of the server until the next [`reload`].
//!
//! [`reload`]: ProgressTracker::reload

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::navigator::{PageNavigator, Transition};
use crate::ports::{PortError, PortResult, ProgressSync};
use crate::sequencer::{SequenceEntry, TopicSequence};

pub struct ProgressTracker {
    sync: Arc<dyn ProgressSync>,
    user_id: Uuid,
    history_id: Uuid,
    navigator: PageNavigator,
    last_sync_error: Option<PortError>,
}

impl ProgressTracker {
    /// Loads the sequence from the server and opens it on `requested_topic`
    /// when given, else on the first unfinished topic.
    pub async fn open(
        sync: Arc<dyn ProgressSync>,
        user_id: Uuid,
        history_id: Uuid,
        requested_topic: Option<Uuid>,
    ) -> PortResult<Self> {
        let entries = sync.load_sequence(user_id, history_id).await?;
        let navigator = PageNavigator::starting_at(TopicSequence::new(entries), requested_topic);
        info!(
            "Opened learning history {} with {} topics",
            history_id,
            navigator.entries().len()
        );
        Ok(Self {
            sync,
            user_id,
            history_id,
            navigator,
            last_sync_error: None,
        })
    }

    pub fn page(&self) -> u32 {
        self.navigator.page()
    }

    pub fn active_topic(&self) -> Option<&SequenceEntry> {
        self.navigator.active_topic()
    }

    pub fn entries(&self) -> &[SequenceEntry] {
        self.navigator.entries()
    }

    /// Aggregate progress over the whole history, from the local copy.
    pub fn percent_complete(&self) -> f64 {
        TopicSequence::new(self.entries().to_vec()).percent_complete()
    }

    /// The most recent failed push. Kept until the next [`reload`](Self::reload).
    pub fn last_sync_error(&self) -> Option<&PortError> {
        self.last_sync_error.as_ref()
    }

    pub async fn advance(&mut self) -> Transition {
        let transition = self.navigator.advance();
        self.push(&transition).await;
        transition
    }

    pub async fn retreat(&mut self) -> Transition {
        let transition = self.navigator.retreat();
        self.push(&transition).await;
        transition
    }

    /// Drops the local copy and re-reads the sequence from the server, staying on
    /// the current topic if the server still lists it.
    pub async fn reload(&mut self) -> PortResult<()> {
        let current = self.active_topic().map(|e| e.topic_id);
        let entries = self.sync.load_sequence(self.user_id, self.history_id).await?;
        self.navigator = PageNavigator::starting_at(TopicSequence::new(entries), current);
        self.last_sync_error = None;
        Ok(())
    }

    async fn push(&mut self, transition: &Transition) {
        for update in transition.updates() {
            let result = self
                .sync
                .update_page(self.user_id, self.history_id, update.topic_id, update.page)
                .await;
            // Only `reload` clears a failure; a later success may be for another topic.
            if let Err(e) = result {
                warn!(
                    "Failed to sync page {} for topic {}: {}",
                    update.page, update.topic_id, e
                );
                self.last_sync_error = Some(e);
            }
        }
    }
}
