//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learning_progress_core::domain::{
    Document, LearningHistory, Topic, TopicWithDocument, User, UserDocumentProgress,
};
use learning_progress_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn topic_ids_for_history(&self, history_id: Uuid) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT topic_id FROM learning_history_topics WHERE history_id = $1 ORDER BY position ASC",
        )
        .bind(history_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn page_to_db(page: u32) -> PortResult<i32> {
    i32::try_from(page).map_err(|_| PortError::InvalidInput(format!("page {} is out of range", page)))
}

fn page_from_db(page: i32) -> u32 {
    u32::try_from(page).unwrap_or(0)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: Uuid,
    name: String,
    doc_file_name: Option<String>,
    created_at: DateTime<Utc>,
}
impl TopicRecord {
    fn to_domain(self) -> Topic {
        Topic {
            id: self.id,
            name: self.name,
            doc_file_name: self.doc_file_name,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TopicDocumentRecord {
    id: Uuid,
    name: String,
    doc_file_name: Option<String>,
    created_at: DateTime<Utc>,
    document_id: Uuid,
    file_name: String,
    total_pages: i32,
}
impl TopicDocumentRecord {
    fn to_domain(self) -> TopicWithDocument {
        TopicWithDocument {
            document: Document {
                id: self.document_id,
                topic_id: self.id,
                file_name: self.file_name,
                total_pages: page_from_db(self.total_pages),
            },
            topic: Topic {
                id: self.id,
                name: self.name,
                doc_file_name: self.doc_file_name,
                created_at: self.created_at,
            },
        }
    }
}

const TOPIC_DOCUMENT_COLUMNS: &str = "t.id, t.name, t.doc_file_name, t.created_at, \
     d.id AS document_id, d.file_name, d.total_pages \
     FROM topics t JOIN documents d ON d.topic_id = t.id";

#[derive(FromRow)]
struct ProgressRecord {
    id: Uuid,
    user_id: Uuid,
    topic_id: Uuid,
    document_id: Uuid,
    current_page: i32,
    total_pages: i32,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProgressRecord {
    fn to_domain(self) -> UserDocumentProgress {
        UserDocumentProgress {
            id: self.id,
            user_id: self.user_id,
            topic_id: self.topic_id,
            document_id: self.document_id,
            current_page: page_from_db(self.current_page),
            total_pages: page_from_db(self.total_pages),
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const PROGRESS_COLUMNS: &str = "id, user_id, topic_id, document_id, current_page, total_pages, \
     completed_at, created_at, updated_at";

#[derive(FromRow)]
struct HistoryRecord {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}
impl HistoryRecord {
    fn to_domain(self, topic_ids: Vec<Uuid>) -> LearningHistory {
        LearningHistory {
            id: self.id,
            user_id: self.user_id,
            topic_ids,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;

        Ok(record.to_domain())
    }

    async fn create_topic(
        &self,
        name: &str,
        doc_file_name: &str,
        total_pages: u32,
    ) -> PortResult<TopicWithDocument> {
        let total_pages_db = page_to_db(total_pages)?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let topic = sqlx::query_as::<_, TopicRecord>(
            "INSERT INTO topics (id, name, doc_file_name) VALUES ($1, $2, $3) \
             RETURNING id, name, doc_file_name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(doc_file_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain();

        let document_id = Uuid::new_v4();
        sqlx::query("INSERT INTO documents (id, topic_id, file_name, total_pages) VALUES ($1, $2, $3, $4)")
            .bind(document_id)
            .bind(topic.id)
            .bind(doc_file_name)
            .bind(total_pages_db)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;

        Ok(TopicWithDocument {
            document: Document {
                id: document_id,
                topic_id: topic.id,
                file_name: doc_file_name.to_string(),
                total_pages,
            },
            topic,
        })
    }

    async fn list_topics(&self) -> PortResult<Vec<Topic>> {
        let records = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, name, doc_file_name, created_at FROM topics ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_topics_with_documents(&self) -> PortResult<Vec<TopicWithDocument>> {
        let sql = format!("SELECT {} ORDER BY t.created_at ASC", TOPIC_DOCUMENT_COLUMNS);
        let records = sqlx::query_as::<_, TopicDocumentRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_topic_with_document(&self, topic_id: Uuid) -> PortResult<TopicWithDocument> {
        let sql = format!("SELECT {} WHERE t.id = $1", TOPIC_DOCUMENT_COLUMNS);
        let record = sqlx::query_as::<_, TopicDocumentRecord>(&sql)
            .bind(topic_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(e, format!("No document found for topic {}", topic_id))
            })?;
        Ok(record.to_domain())
    }

    async fn create_progress(
        &self,
        progress: UserDocumentProgress,
    ) -> PortResult<UserDocumentProgress> {
        let sql = format!(
            "INSERT INTO user_document_progress ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {cols}",
            cols = PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(progress.id)
            .bind(progress.user_id)
            .bind(progress.topic_id)
            .bind(progress.document_id)
            .bind(page_to_db(progress.current_page)?)
            .bind(page_to_db(progress.total_pages)?)
            .bind(progress.completed_at)
            .bind(progress.created_at)
            .bind(progress.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => PortError::AlreadyExists(
                    format!(
                        "User {} already has progress for document {}",
                        progress.user_id, progress.document_id
                    ),
                ),
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain())
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<UserDocumentProgress> {
        let sql = format!(
            "SELECT {} FROM user_document_progress WHERE user_id = $1 AND document_id = $2",
            PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(
                    e,
                    "No reading progress found for this user and document".to_string(),
                )
            })?;
        Ok(record.to_domain())
    }

    async fn update_progress_page(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        page: u32,
        now: DateTime<Utc>,
    ) -> PortResult<UserDocumentProgress> {
        // Completion is derived inside the statement so no read-modify-write is needed.
        let sql = format!(
            "UPDATE user_document_progress \
             SET current_page = $3, \
                 completed_at = CASE WHEN $3 >= total_pages THEN $4 ELSE NULL END, \
                 updated_at = $4 \
             WHERE user_id = $1 AND document_id = $2 \
             RETURNING {}",
            PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .bind(document_id)
            .bind(page_to_db(page)?)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_check_violation() => {
                    PortError::InvalidInput(format!("page {} is beyond the last page", page))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?
            .ok_or_else(|| {
                PortError::NotFound("No reading progress found for this user and document".to_string())
            })?;
        Ok(record.to_domain())
    }

    async fn list_progress_for_user(&self, user_id: Uuid) -> PortResult<Vec<UserDocumentProgress>> {
        let sql = format!(
            "SELECT {} FROM user_document_progress WHERE user_id = $1 ORDER BY created_at ASC",
            PROGRESS_COLUMNS
        );
        let records = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_learning_history(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
    ) -> PortResult<LearningHistory> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, HistoryRecord>(
            "INSERT INTO learning_histories (id, user_id) VALUES ($1, $2) RETURNING id, user_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for (position, topic_id) in topic_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO learning_history_topics (history_id, topic_id, position) VALUES ($1, $2, $3) \
                 ON CONFLICT (history_id, topic_id) DO NOTHING",
            )
            .bind(record.id)
            .bind(topic_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;

        let topic_ids = self.topic_ids_for_history(record.id).await?;
        Ok(record.to_domain(topic_ids))
    }

    async fn get_learning_history(&self, history_id: Uuid) -> PortResult<LearningHistory> {
        let record = sqlx::query_as::<_, HistoryRecord>(
            "SELECT id, user_id, created_at FROM learning_histories WHERE id = $1",
        )
        .bind(history_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "User learning history not found".to_string()))?;

        let topic_ids = self.topic_ids_for_history(record.id).await?;
        Ok(record.to_domain(topic_ids))
    }

    async fn find_history_with_topics(
        &self,
        user_id: Uuid,
        topic_ids: &[Uuid],
    ) -> PortResult<Option<LearningHistory>> {
        let record = sqlx::query_as::<_, HistoryRecord>(
            "SELECT h.id, h.user_id, h.created_at FROM learning_histories h \
             WHERE h.user_id = $1 AND EXISTS ( \
                 SELECT 1 FROM learning_history_topics ht \
                 WHERE ht.history_id = h.id AND ht.topic_id = ANY($2)) \
             ORDER BY h.created_at ASC LIMIT 1",
        )
        .bind(user_id)
        .bind(topic_ids)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => {
                let ids = self.topic_ids_for_history(record.id).await?;
                Ok(Some(record.to_domain(ids)))
            }
            None => Ok(None),
        }
    }
}
