//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the `DatabaseService` and `DocumentStorage`
//! ports. They back the router tests and local runs without Postgres or S3.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learning_progress_core::domain::{
    Document, LearningHistory, Topic, TopicWithDocument, User, UserDocumentProgress,
};
use learning_progress_core::ports::{DatabaseService, DocumentStorage, PortError, PortResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    topics: Vec<Topic>,
    documents: HashMap<Uuid, Document>,
    progress: Vec<UserDocumentProgress>,
    histories: Vec<LearningHistory>,
}

/// A `DatabaseService` that keeps every table in memory.
#[derive(Clone, Default)]
pub struct InMemoryDb {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

impl Tables {
    fn with_document(&self, topic: &Topic) -> Option<TopicWithDocument> {
        self.documents.get(&topic.id).map(|document| TopicWithDocument {
            topic: topic.clone(),
            document: document.clone(),
        })
    }

    fn progress_mut(&mut self, user_id: Uuid, document_id: Uuid) -> PortResult<&mut UserDocumentProgress> {
        self.progress
            .iter_mut()
            .find(|p| p.user_id == user_id && p.document_id == document_id)
            .ok_or_else(|| {
                PortError::NotFound("No reading progress found for this user and document".to_string())
            })
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User> {
        let mut tables = self.lock()?;
        let user = tables.users.entry(user_id).or_insert_with(|| User {
            user_id,
            created_at: Utc::now(),
        });
        Ok(user.clone())
    }

    async fn create_topic(
        &self,
        name: &str,
        doc_file_name: &str,
        total_pages: u32,
    ) -> PortResult<TopicWithDocument> {
        let mut tables = self.lock()?;
        let topic = Topic {
            id: Uuid::new_v4(),
            name: name.to_string(),
            doc_file_name: Some(doc_file_name.to_string()),
            created_at: Utc::now(),
        };
        let document = Document {
            id: Uuid::new_v4(),
            topic_id: topic.id,
            file_name: doc_file_name.to_string(),
            total_pages,
        };
        tables.topics.push(topic.clone());
        tables.documents.insert(topic.id, document.clone());
        Ok(TopicWithDocument { topic, document })
    }

    async fn list_topics(&self) -> PortResult<Vec<Topic>> {
        Ok(self.lock()?.topics.clone())
    }

    async fn list_topics_with_documents(&self) -> PortResult<Vec<TopicWithDocument>> {
        let tables = self.lock()?;
        Ok(tables
            .topics
            .iter()
            .filter_map(|t| tables.with_document(t))
            .collect())
    }

    async fn get_topic_with_document(&self, topic_id: Uuid) -> PortResult<TopicWithDocument> {
        let tables = self.lock()?;
        tables
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .and_then(|t| tables.with_document(t))
            .ok_or_else(|| PortError::NotFound(format!("No document found for topic {}", topic_id)))
    }

    async fn create_progress(
        &self,
        progress: UserDocumentProgress,
    ) -> PortResult<UserDocumentProgress> {
        let mut tables = self.lock()?;
        let duplicate = tables
            .progress
            .iter()
            .any(|p| p.user_id == progress.user_id && p.document_id == progress.document_id);
        if duplicate {
            return Err(PortError::AlreadyExists(format!(
                "User {} already has progress for document {}",
                progress.user_id, progress.document_id
            )));
        }
        tables.progress.push(progress.clone());
        Ok(progress)
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<UserDocumentProgress> {
        let mut tables = self.lock()?;
        tables.progress_mut(user_id, document_id).map(|p| p.clone())
    }

    async fn update_progress_page(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        page: u32,
        now: DateTime<Utc>,
    ) -> PortResult<UserDocumentProgress> {
        let mut tables = self.lock()?;
        let progress = tables.progress_mut(user_id, document_id)?;
        progress.apply_page(page, now)?;
        Ok(progress.clone())
    }

    async fn list_progress_for_user(&self, user_id: Uuid) -> PortResult<Vec<UserDocumentProgress>> {
        Ok(self
            .lock()?
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_learning_history(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
    ) -> PortResult<LearningHistory> {
        let mut tables = self.lock()?;
        let mut ordered: Vec<Uuid> = Vec::with_capacity(topic_ids.len());
        for id in topic_ids {
            if !ordered.contains(id) {
                ordered.push(*id);
            }
        }
        let history = LearningHistory {
            id: Uuid::new_v4(),
            user_id,
            topic_ids: ordered,
            created_at: Utc::now(),
        };
        tables.histories.push(history.clone());
        Ok(history)
    }

    async fn get_learning_history(&self, history_id: Uuid) -> PortResult<LearningHistory> {
        self.lock()?
            .histories
            .iter()
            .find(|h| h.id == history_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("User learning history not found".to_string()))
    }

    async fn find_history_with_topics(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
    ) -> PortResult<Option<LearningHistory>> {
        Ok(self
            .lock()?
            .histories
            .iter()
            .find(|h| h.user_id == user_id && h.contains_any(topic_ids))
            .cloned())
    }
}

/// A `DocumentStorage` backed by a map of keys to bytes.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects. A poisoned lock counts as empty.
    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStorage for InMemoryStorage {
    async fn put_document(&self, key: &str, data: &[u8], _content_type: &str) -> PortResult<()> {
        self.objects
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get_document(&self, key: &str) -> PortResult<Vec<u8>> {
        self.objects
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found in storage", key)))
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
