//! crates/learning_progress_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// A named unit of learning content. Its PDF lives in object storage under `doc_file_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: Uuid,
    pub name: String,
    pub doc_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The document attached to a topic. `total_pages` is fixed when the topic is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub file_name: String,
    pub total_pages: u32,
}

/// A topic together with its document, as listed to learners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicWithDocument {
    pub topic: Topic,
    pub document: Document,
}

// Represents a learner - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Persisted page-position state for one (user, document) pair.
///
/// `current_page` is 0 until the learner opens the document, then 1-indexed and
/// never above `total_pages`. `completed_at` is set exactly when
/// `current_page >= total_pages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDocumentProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_id: Uuid,
    pub document_id: Uuid,
    pub current_page: u32,
    pub total_pages: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDocumentProgress {
    /// Starts a fresh record at page 0 for the given document.
    pub fn start(user_id: Uuid, document: &Document, now: DateTime<Utc>) -> Self {
        let mut progress = Self {
            id: Uuid::new_v4(),
            user_id,
            topic_id: document.topic_id,
            document_id: document.id,
            current_page: 0,
            total_pages: document.total_pages,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        // A zero-page document is complete from the start.
        progress.completed_at = progress.is_complete().then_some(now);
        progress
    }

    pub fn is_complete(&self) -> bool {
        is_complete(self.current_page, self.total_pages)
    }

    /// Rejects pages outside `0..=total_pages`.
    pub fn validate_page(&self, page: u32) -> PortResult<()> {
        if page > self.total_pages {
            return Err(PortError::InvalidInput(format!(
                "page {} is beyond the last page ({})",
                page, self.total_pages
            )));
        }
        Ok(())
    }

    /// Moves to `page` and recomputes the completion timestamp.
    pub fn apply_page(&mut self, page: u32, now: DateTime<Utc>) -> PortResult<()> {
        self.validate_page(page)?;
        self.current_page = page;
        self.completed_at = if self.is_complete() { Some(now) } else { None };
        self.updated_at = now;
        Ok(())
    }
}

/// Completion rule shared by stored records and the client-side sequence.
pub fn is_complete(current_page: u32, total_pages: u32) -> bool {
    current_page >= total_pages
}

/// An ordered assignment of topics to a user. The order is the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LearningHistory {
    pub fn contains_any(&self, topic_ids: &[Uuid]) -> bool {
        self.topic_ids.iter().any(|id| topic_ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn document(total_pages: u32) -> Document {
        Document {
            id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            file_name: "anatomy.pdf".to_string(),
            total_pages,
        }
    }

    #[test]
    fn new_progress_starts_at_page_zero() {
        let doc = document(5);
        let progress = UserDocumentProgress::start(Uuid::new_v4(), &doc, Utc::now());
        assert_eq!(progress.current_page, 0);
        assert_eq!(progress.total_pages, 5);
        assert_eq!(progress.topic_id, doc.topic_id);
        assert!(progress.completed_at.is_none());
    }

    #[test]
    fn reaching_last_page_sets_and_leaving_clears_completion() {
        let mut progress = UserDocumentProgress::start(Uuid::new_v4(), &document(3), Utc::now());
        progress.apply_page(3, Utc::now()).unwrap();
        assert!(progress.completed_at.is_some());

        progress.apply_page(2, Utc::now()).unwrap();
        assert!(progress.completed_at.is_none());
    }

    #[test]
    fn page_beyond_total_is_rejected() {
        let mut progress = UserDocumentProgress::start(Uuid::new_v4(), &document(3), Utc::now());
        let err = progress.apply_page(4, Utc::now()).unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
        assert_eq!(progress.current_page, 0);
    }

    #[test]
    fn history_overlap_detection() {
        let shared = Uuid::new_v4();
        let history = LearningHistory {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            topic_ids: vec![Uuid::new_v4(), shared],
            created_at: Utc::now(),
        };
        assert!(history.contains_any(&[shared]));
        assert!(!history.contains_any(&[Uuid::new_v4()]));
    }

    proptest! {
        #[test]
        fn completion_flag_tracks_page(total in 0u32..500, page in 0u32..500) {
            let mut progress = UserDocumentProgress::start(Uuid::new_v4(), &document(total), Utc::now());
            if page <= total {
                progress.apply_page(page, Utc::now()).unwrap();
                prop_assert_eq!(progress.completed_at.is_some(), page >= total);
                prop_assert_eq!(progress.is_complete(), page >= total);
            } else {
                prop_assert!(progress.apply_page(page, Utc::now()).is_err());
            }
        }
    }
}
