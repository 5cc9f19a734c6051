//! services/api/src/web/dto.rs
//!
//! Request and response payloads for the REST API. Shared with the HTTP
//! progress client, so every response type also deserializes.

use chrono::{DateTime, Utc};
use learning_progress_core::domain::{Document, Topic, TopicWithDocument, UserDocumentProgress};
use learning_progress_core::sequencer::SequenceEntry;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Topics and Documents
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopicView {
    pub id: Uuid,
    pub name: String,
    pub doc_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Topic> for TopicView {
    fn from(t: Topic) -> Self {
        Self {
            id: t.id,
            name: t.name,
            doc_file_name: t.doc_file_name,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentView {
    pub id: Uuid,
    pub file_name: String,
    pub total_pages: u32,
}

impl From<Document> for DocumentView {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            file_name: d.file_name,
            total_pages: d.total_pages,
        }
    }
}

/// A topic listed together with its document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopicWithDocumentView {
    pub topic: TopicView,
    pub document: DocumentView,
}

impl From<TopicWithDocument> for TopicWithDocumentView {
    fn from(t: TopicWithDocument) -> Self {
        Self {
            topic: t.topic.into(),
            document: t.document.into(),
        }
    }
}

//=========================================================================================
// Reading Progress
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_id: Uuid,
    pub document_id: Uuid,
    pub current_page: u32,
    pub total_pages: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDocumentProgress> for ProgressView {
    fn from(p: UserDocumentProgress) -> Self {
        Self {
            completed: p.is_complete(),
            id: p.id,
            user_id: p.user_id,
            topic_id: p.topic_id,
            document_id: p.document_id,
            current_page: p.current_page,
            total_pages: p.total_pages,
            completed_at: p.completed_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl From<ProgressView> for UserDocumentProgress {
    fn from(v: ProgressView) -> Self {
        Self {
            id: v.id,
            user_id: v.user_id,
            topic_id: v.topic_id,
            document_id: v.document_id,
            current_page: v.current_page,
            total_pages: v.total_pages,
            completed_at: v.completed_at,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

/// The body of a page update. `currentPage` is accepted for older clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePageRequest {
    #[serde(alias = "currentPage")]
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopicSummary {
    pub id: Uuid,
    pub name: String,
}

/// One row of a learner's reading history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryItemView {
    pub progress: ProgressView,
    pub topic: TopicSummary,
    pub document: DocumentView,
}

//=========================================================================================
// Learning Sequences
//=========================================================================================

/// One topic in a learning sequence, with its PDF inlined as base64 when requested.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SequenceTopicView {
    pub topic_id: Uuid,
    pub name: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub completed: bool,
    pub pdf: Option<String>,
}

impl SequenceTopicView {
    pub fn new(entry: &SequenceEntry, pdf: Option<String>) -> Self {
        Self {
            topic_id: entry.topic_id,
            name: entry.name.clone(),
            current_page: entry.current_page,
            total_pages: entry.total_pages,
            completed: entry.is_complete(),
            pdf,
        }
    }
}

impl From<SequenceTopicView> for SequenceEntry {
    fn from(v: SequenceTopicView) -> Self {
        SequenceEntry::new(v.topic_id, v.name, v.current_page, v.total_pages)
    }
}

/// A learner's topic sequence: completed topics first, then the rest.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LearningTopicView {
    pub history_id: Uuid,
    pub user_id: Uuid,
    pub active_topic_id: Option<Uuid>,
    pub percent_complete: f64,
    pub topics: Vec<SequenceTopicView>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LearningTopicQuery {
    /// Topic to open; falls back to the first unfinished topic.
    pub topic: Option<Uuid>,
    /// Inline the topic PDFs as base64. Defaults to true.
    pub include_pdf: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateLearningRequest {
    pub topics: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateLearningResponse {
    /// False when an existing history already covered one of the requested topics.
    pub created: bool,
    pub learning: LearningTopicView,
}
