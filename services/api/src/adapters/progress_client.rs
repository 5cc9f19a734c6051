//! services/api/src/adapters/progress_client.rs
//!
//! An HTTP implementation of the `ProgressSync` port. It lets a
//! `ProgressTracker` run against a remote instance of this API.

use async_trait::async_trait;
use learning_progress_core::domain::UserDocumentProgress;
use learning_progress_core::ports::{PortError, PortResult, ProgressSync};
use learning_progress_core::sequencer::SequenceEntry;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::web::dto::{LearningTopicView, ProgressView, UpdatePageRequest};
use crate::web::response::ApiResponse;

#[derive(Clone)]
pub struct HttpProgressClient {
    client: Client,
    base_url: String,
}

impl HttpProgressClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response ({}): {}", status, e)))?;

        if envelope.error || !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => PortError::NotFound(envelope.message),
                StatusCode::BAD_REQUEST => PortError::InvalidInput(envelope.message),
                _ => PortError::Unexpected(format!("{}: {}", status, envelope.message)),
            });
        }
        envelope
            .data
            .ok_or_else(|| PortError::Unexpected("Response carried no data".to_string()))
    }
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl ProgressSync for HttpProgressClient {
    async fn load_sequence(&self, user_id: Uuid, history_id: Uuid) -> PortResult<Vec<SequenceEntry>> {
        let url = format!("{}/api/learningtopic/{}/{}", self.base_url, user_id, history_id);
        let response = self
            .client
            .get(url)
            .query(&[("include_pdf", "false")])
            .send()
            .await
            .map_err(transport)?;

        let view: LearningTopicView = Self::read_envelope(response).await?;
        Ok(view.topics.into_iter().map(SequenceEntry::from).collect())
    }

    async fn update_page(
        &self,
        user_id: Uuid,
        history_id: Uuid,
        topic_id: Uuid,
        page: u32,
    ) -> PortResult<UserDocumentProgress> {
        let url = format!(
            "{}/api/updatecurrentpage/{}/{}/{}",
            self.base_url, user_id, history_id, topic_id
        );
        let response = self
            .client
            .post(url)
            .json(&UpdatePageRequest { page })
            .send()
            .await
            .map_err(transport)?;

        let view: ProgressView = Self::read_envelope(response).await?;
        Ok(view.into())
    }
}
