//! crates/learning_progress_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the object store and the HTTP transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{LearningHistory, Topic, TopicWithDocument, User, UserDocumentProgress};
use crate::sequencer::SequenceEntry;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User>;

    // --- Topic Management ---
    async fn create_topic(
        &self,
        name: &str,
        doc_file_name: &str,
        total_pages: u32,
    ) -> PortResult<TopicWithDocument>;

    async fn list_topics(&self) -> PortResult<Vec<Topic>>;

    /// Topics that have a document attached, in creation order.
    async fn list_topics_with_documents(&self) -> PortResult<Vec<TopicWithDocument>>;

    /// Fails with `NotFound` when the topic is missing or has no document.
    async fn get_topic_with_document(&self, topic_id: Uuid) -> PortResult<TopicWithDocument>;

    // --- Reading Progress ---

    /// Fails with `AlreadyExists` when the (user, document) pair already has a record.
    async fn create_progress(&self, progress: UserDocumentProgress)
        -> PortResult<UserDocumentProgress>;

    async fn get_progress(&self, user_id: Uuid, document_id: Uuid)
        -> PortResult<UserDocumentProgress>;

    /// Sets the page and recomputes `completed_at` in a single write.
    async fn update_progress_page(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        page: u32,
        now: DateTime<Utc>,
    ) -> PortResult<UserDocumentProgress>;

    async fn list_progress_for_user(&self, user_id: Uuid) -> PortResult<Vec<UserDocumentProgress>>;

    // --- Learning Histories (Topic Sequences) ---
    async fn create_learning_history(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
    ) -> PortResult<LearningHistory>;

    async fn get_learning_history(&self, history_id: Uuid) -> PortResult<LearningHistory>;

    /// The user's first history that contains any of `topic_ids`.
    async fn find_history_with_topics(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
    ) -> PortResult<Option<LearningHistory>>;
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Stores a whole document under `key`.
    async fn put_document(&self, key: &str, data: &[u8], content_type: &str) -> PortResult<()>;

    /// Fetches a whole document. Missing keys map to `NotFound`.
    async fn get_document(&self, key: &str) -> PortResult<Vec<u8>>;

    fn provider_name(&self) -> &str;
}

/// The client-to-server boundary used by the progress tracker.
#[async_trait]
pub trait ProgressSync: Send + Sync {
    /// Loads the current topic sequence of a learning history from the server.
    async fn load_sequence(&self, user_id: Uuid, history_id: Uuid) -> PortResult<Vec<SequenceEntry>>;

    /// Pushes a new page number for one topic of the history.
    async fn update_page(
        &self,
        user_id: Uuid,
        history_id: Uuid,
        topic_id: Uuid,
        page: u32,
    ) -> PortResult<UserDocumentProgress>;
}
