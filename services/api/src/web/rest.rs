//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    dto::{
        CreateLearningRequest, CreateLearningResponse, DocumentView, HistoryItemView,
        LearningTopicQuery, LearningTopicView, ProgressView, SequenceTopicView, TopicSummary,
        TopicView, TopicWithDocumentView, UpdatePageRequest,
    },
    response::{parse_id, respond, ApiResponse, ErrorResponse, HandlerResult},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use futures::future::join_all;
use learning_progress_core::{
    domain::{LearningHistory, TopicWithDocument, UserDocumentProgress},
    ports::{DatabaseService, DocumentStorage, PortError, PortResult},
    sequencer::{SequenceEntry, TopicSequence},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_topics_handler,
        create_topic_handler,
        list_learning_topics_handler,
        get_learning_topic_handler,
        update_current_page_handler,
        learning_history_handler,
        create_user_learning_handler,
        create_topic_progress_handler,
    ),
    components(
        schemas(
            TopicView,
            DocumentView,
            TopicWithDocumentView,
            ProgressView,
            UpdatePageRequest,
            TopicSummary,
            HistoryItemView,
            SequenceTopicView,
            LearningTopicView,
            CreateLearningRequest,
            CreateLearningResponse,
        )
    ),
    tags(
        (name = "Learning Progress API", description = "Topic sequences and per-document reading progress.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Returns the learner's progress for a topic's document, creating it at page 0 if missing.
async fn ensure_progress(
    db: &dyn DatabaseService,
    user_id: Uuid,
    topic: &TopicWithDocument,
) -> PortResult<UserDocumentProgress> {
    match db.get_progress(user_id, topic.document.id).await {
        Err(PortError::NotFound(_)) => {
            let fresh = UserDocumentProgress::start(user_id, &topic.document, Utc::now());
            match db.create_progress(fresh).await {
                // Another request created it first.
                Err(PortError::AlreadyExists(_)) => db.get_progress(user_id, topic.document.id).await,
                other => other,
            }
        }
        other => other,
    }
}

/// Loads a history and checks that it belongs to `user_id`.
async fn owned_history(
    app_state: &AppState,
    user_id: Uuid,
    history_id: Uuid,
) -> Result<LearningHistory, ErrorResponse> {
    let history = app_state.db.get_learning_history(history_id).await?;
    if history.user_id != user_id {
        return Err(ErrorResponse::not_found("User learning history not found"));
    }
    Ok(history)
}

/// Fetches every PDF concurrently. A failed fetch yields `None` for that topic.
async fn fetch_pdfs(
    storage: &dyn DocumentStorage,
    entries: &[SequenceEntry],
    keys: &HashMap<Uuid, String>,
) -> Vec<Option<String>> {
    let fetches = entries.iter().map(|entry| async move {
        let key = keys.get(&entry.topic_id)?;
        match storage.get_document(key).await {
            Ok(bytes) => Some(BASE64.encode(bytes)),
            Err(e) => {
                warn!("Failed to retrieve PDF for topic {}: {}", entry.topic_id, e);
                None
            }
        }
    });
    join_all(fetches).await
}

async fn build_learning_view(
    app_state: &AppState,
    history: &LearningHistory,
    requested_topic: Option<Uuid>,
    include_pdf: bool,
) -> Result<LearningTopicView, ErrorResponse> {
    let mut entries = Vec::with_capacity(history.topic_ids.len());
    let mut keys = HashMap::new();

    for topic_id in &history.topic_ids {
        let topic = app_state.db.get_topic_with_document(*topic_id).await?;
        let progress = app_state
            .db
            .get_progress(history.user_id, topic.document.id)
            .await?;
        if let Some(key) = &topic.topic.doc_file_name {
            keys.insert(topic.topic.id, key.clone());
        }
        entries.push(SequenceEntry::new(
            topic.topic.id,
            topic.topic.name,
            progress.current_page,
            progress.total_pages,
        ));
    }

    let sequence = TopicSequence::new(entries);
    let active_topic_id = sequence
        .select_active(requested_topic)
        .map(|i| sequence.entries()[i].topic_id);
    let pdfs = if include_pdf {
        fetch_pdfs(app_state.storage.as_ref(), sequence.entries(), &keys).await
    } else {
        vec![None; sequence.len()]
    };

    Ok(LearningTopicView {
        history_id: history.id,
        user_id: history.user_id,
        active_topic_id,
        percent_complete: sequence.percent_complete(),
        topics: sequence
            .entries()
            .iter()
            .zip(pdfs)
            .map(|(entry, pdf)| SequenceTopicView::new(entry, pdf))
            .collect(),
    })
}

//=========================================================================================
// Topic Administration
//=========================================================================================

/// List every topic.
#[utoipa::path(
    get,
    path = "/api/topics",
    responses(
        (status = 200, description = "All topics", body = ApiResponse<Vec<TopicView>>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_topics_handler(
    State(app_state): State<Arc<AppState>>,
) -> HandlerResult<Vec<TopicView>> {
    let topics = app_state.db.list_topics().await?;
    respond(
        StatusCode::OK,
        "Topics fetched successfully",
        topics.into_iter().map(TopicView::from).collect(),
    )
}

/// Create a topic by uploading its PDF.
///
/// Accepts a multipart/form-data request with `name`, `total_pages` and a `file` part.
#[utoipa::path(
    post,
    path = "/api/topics",
    request_body(content_type = "multipart/form-data", description = "Topic name, page count and the PDF."),
    responses(
        (status = 201, description = "Topic created", body = ApiResponse<TopicWithDocumentView>),
        (status = 400, description = "Missing or invalid form field"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_topic_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> HandlerResult<TopicWithDocumentView> {
    let mut name = None;
    let mut total_pages = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ErrorResponse::bad_request(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                name = Some(field.text().await.map_err(|e| {
                    ErrorResponse::bad_request(format!("Failed to read name: {}", e))
                })?)
            }
            "total_pages" => {
                let raw = field.text().await.map_err(|e| {
                    ErrorResponse::bad_request(format!("Failed to read total_pages: {}", e))
                })?;
                // Stored as a Postgres INTEGER, so the range is checked before the upload.
                let parsed = raw
                    .trim()
                    .parse::<i32>()
                    .ok()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        ErrorResponse::bad_request("total_pages must be a non-negative integer")
                    })?;
                total_pages = Some(parsed);
            }
            "file" => {
                file = Some(field.bytes().await.map_err(|e| {
                    ErrorResponse::bad_request(format!("Failed to read file bytes: {}", e))
                })?)
            }
            _ => {}
        }
    }

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ErrorResponse::bad_request("Topic name is required"))?;
    let total_pages = total_pages.ok_or_else(|| ErrorResponse::bad_request("total_pages is required"))?;
    let file = file.ok_or_else(|| ErrorResponse::bad_request("Multipart form must include a file"))?;
    if !file.starts_with(b"%PDF") {
        return Err(ErrorResponse::bad_request("Uploaded file is not a PDF"));
    }

    let key = format!("topics/{}.pdf", Uuid::new_v4());
    app_state
        .storage
        .put_document(&key, &file, "application/pdf")
        .await?;
    let created = app_state.db.create_topic(&name, &key, total_pages).await?;
    info!(
        "Created topic {} ({} pages) stored at {} via {}",
        created.topic.id,
        total_pages,
        key,
        app_state.storage.provider_name()
    );

    respond(StatusCode::CREATED, "Topic created successfully", created.into())
}

//=========================================================================================
// Learning Topics and Progress
//=========================================================================================

/// List topics that have a document and can be assigned to learners.
#[utoipa::path(
    get,
    path = "/api/learningtopic",
    responses(
        (status = 200, description = "Topics with documents", body = ApiResponse<Vec<TopicWithDocumentView>>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_learning_topics_handler(
    State(app_state): State<Arc<AppState>>,
) -> HandlerResult<Vec<TopicWithDocumentView>> {
    let topics = app_state.db.list_topics_with_documents().await?;
    respond(
        StatusCode::OK,
        "Topics with documents fetched successfully",
        topics.into_iter().map(TopicWithDocumentView::from).collect(),
    )
}

/// Load a learner's topic sequence with progress and inlined PDFs.
#[utoipa::path(
    get,
    path = "/api/learningtopic/{userId}/{progressId}",
    params(
        ("userId" = Uuid, Path, description = "The learner."),
        ("progressId" = Uuid, Path, description = "The learning history."),
        LearningTopicQuery
    ),
    responses(
        (status = 200, description = "The topic sequence", body = ApiResponse<LearningTopicView>),
        (status = 400, description = "Invalid parameter"),
        (status = 404, description = "Learning history not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_learning_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, progress_id)): Path<(String, String)>,
    Query(query): Query<LearningTopicQuery>,
) -> HandlerResult<LearningTopicView> {
    let user_id = parse_id("userId", &user_id)?;
    let history_id = parse_id("progressId", &progress_id)?;

    let history = owned_history(&app_state, user_id, history_id).await?;
    let view = build_learning_view(
        &app_state,
        &history,
        query.topic,
        query.include_pdf.unwrap_or(true),
    )
    .await?;

    respond(StatusCode::OK, "Learning topics fetched successfully", view)
}

/// Set the current page of one topic in a learner's sequence.
#[utoipa::path(
    post,
    path = "/api/updatecurrentpage/{userId}/{progressId}/{topicId}",
    params(
        ("userId" = Uuid, Path, description = "The learner."),
        ("progressId" = Uuid, Path, description = "The learning history."),
        ("topicId" = Uuid, Path, description = "The topic being read.")
    ),
    request_body = UpdatePageRequest,
    responses(
        (status = 200, description = "Progress updated", body = ApiResponse<ProgressView>),
        (status = 400, description = "Invalid parameter or page out of range"),
        (status = 404, description = "History, topic or progress not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_current_page_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, progress_id, topic_id)): Path<(String, String, String)>,
    payload: Result<Json<UpdatePageRequest>, JsonRejection>,
) -> HandlerResult<ProgressView> {
    let user_id = parse_id("userId", &user_id)?;
    let history_id = parse_id("progressId", &progress_id)?;
    let topic_id = parse_id("topicId", &topic_id)?;
    let Json(body) = payload
        .map_err(|e| ErrorResponse::bad_request(format!("Invalid page parameter: {}", e.body_text())))?;

    let history = owned_history(&app_state, user_id, history_id).await?;
    if !history.topic_ids.contains(&topic_id) {
        return Err(ErrorResponse::not_found("Topic is not part of this learning history"));
    }

    let topic = app_state.db.get_topic_with_document(topic_id).await?;
    let progress = app_state.db.get_progress(user_id, topic.document.id).await?;
    progress.validate_page(body.page)?;

    let updated = app_state
        .db
        .update_progress_page(user_id, topic.document.id, body.page, Utc::now())
        .await?;
    info!(
        "User {} is on page {}/{} of topic {}",
        user_id, updated.current_page, updated.total_pages, topic_id
    );

    respond(StatusCode::OK, "progress updated successfully", updated.into())
}

/// List every progress record of a learner.
#[utoipa::path(
    get,
    path = "/api/learninghistory/{userId}",
    params(
        ("userId" = Uuid, Path, description = "The learner.")
    ),
    responses(
        (status = 200, description = "The learner's reading history", body = ApiResponse<Vec<HistoryItemView>>),
        (status = 400, description = "Invalid parameter"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn learning_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> HandlerResult<Vec<HistoryItemView>> {
    let user_id = parse_id("userId", &user_id)?;

    let records = app_state.db.list_progress_for_user(user_id).await?;
    if records.is_empty() {
        return respond(StatusCode::OK, "No reading history found for the user", Vec::new());
    }

    let mut items = Vec::with_capacity(records.len());
    for progress in records {
        let topic = app_state.db.get_topic_with_document(progress.topic_id).await?;
        items.push(HistoryItemView {
            progress: progress.into(),
            topic: TopicSummary {
                id: topic.topic.id,
                name: topic.topic.name,
            },
            document: topic.document.into(),
        });
    }

    respond(StatusCode::OK, "Reading history fetched successfully", items)
}

/// Assign a sequence of topics to a learner.
///
/// If one of the learner's histories already contains any requested topic,
/// that history is returned instead and `created` is false.
#[utoipa::path(
    post,
    path = "/api/createuserlearning/{userId}",
    params(
        ("userId" = Uuid, Path, description = "The learner.")
    ),
    request_body = CreateLearningRequest,
    responses(
        (status = 201, description = "Learning history created", body = ApiResponse<CreateLearningResponse>),
        (status = 200, description = "Existing learning history returned", body = ApiResponse<CreateLearningResponse>),
        (status = 400, description = "Invalid parameter or no topics"),
        (status = 404, description = "Topic or document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_user_learning_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<CreateLearningRequest>, JsonRejection>,
) -> HandlerResult<CreateLearningResponse> {
    let user_id = parse_id("userId", &user_id)?;
    let Json(body) = payload
        .map_err(|e| ErrorResponse::bad_request(format!("Invalid request body: {}", e.body_text())))?;
    if body.topics.is_empty() {
        return Err(ErrorResponse::bad_request("Topics are required"));
    }

    app_state.db.get_or_create_user(user_id).await?;

    if let Some(existing) = app_state
        .db
        .find_history_with_topics(user_id, &body.topics)
        .await?
    {
        let learning = build_learning_view(&app_state, &existing, None, true).await?;
        return respond(
            StatusCode::OK,
            "User learning history already exists",
            CreateLearningResponse {
                created: false,
                learning,
            },
        );
    }

    let mut topics = Vec::with_capacity(body.topics.len());
    for topic_id in &body.topics {
        topics.push(app_state.db.get_topic_with_document(*topic_id).await?);
    }

    let history = app_state
        .db
        .create_learning_history(user_id, &body.topics)
        .await?;
    for topic in &topics {
        ensure_progress(app_state.db.as_ref(), user_id, topic).await?;
    }
    info!(
        "Created learning history {} for user {} with {} topics",
        history.id,
        user_id,
        history.topic_ids.len()
    );

    let learning = build_learning_view(&app_state, &history, None, true).await?;
    respond(
        StatusCode::CREATED,
        "User learning history created successfully",
        CreateLearningResponse {
            created: true,
            learning,
        },
    )
}

/// Start tracking a single topic for a learner.
#[utoipa::path(
    post,
    path = "/api/createuserlearning/{userId}/{topicId}",
    params(
        ("userId" = Uuid, Path, description = "The learner."),
        ("topicId" = Uuid, Path, description = "The topic to start.")
    ),
    responses(
        (status = 201, description = "Progress record created", body = ApiResponse<ProgressView>),
        (status = 400, description = "Invalid parameter or progress already exists"),
        (status = 404, description = "Topic or document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_topic_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, topic_id)): Path<(String, String)>,
) -> HandlerResult<ProgressView> {
    let user_id = parse_id("userId", &user_id)?;
    let topic_id = parse_id("topicId", &topic_id)?;

    app_state.db.get_or_create_user(user_id).await?;
    let topic = app_state.db.get_topic_with_document(topic_id).await?;

    let progress = UserDocumentProgress::start(user_id, &topic.document, Utc::now());
    let created = app_state
        .db
        .create_progress(progress)
        .await
        .map_err(|e| match e {
            PortError::AlreadyExists(_) => {
                ErrorResponse::bad_request("User already has progress for this document")
            }
            other => other.into(),
        })?;

    respond(
        StatusCode::CREATED,
        "User document progress created successfully",
        created.into(),
    )
}
