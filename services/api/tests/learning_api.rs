//! Router-level tests for the learning progress endpoints, run against the
//! in-memory database and storage adapters.

use api_lib::{
    adapters::{InMemoryDb, InMemoryStorage},
    web::{router, state::AppState},
};
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use learning_progress_core::domain::{TopicWithDocument, UserDocumentProgress};
use learning_progress_core::ports::{DatabaseService, DocumentStorage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const PDF: &[u8] = b"%PDF-1.4 test document";

struct TestApp {
    db: InMemoryDb,
    storage: InMemoryStorage,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let db = InMemoryDb::new();
        let storage = InMemoryStorage::new();
        let state = AppState::new(Arc::new(db.clone()), Arc::new(storage.clone()));
        Self {
            router: router(Arc::new(state)),
            db,
            storage,
        }
    }

    async fn topic(&self, name: &str, total_pages: u32) -> TopicWithDocument {
        let key = format!("topics/{}.pdf", name);
        self.storage
            .put_document(&key, PDF, "application/pdf")
            .await
            .unwrap();
        self.db.create_topic(name, &key, total_pages).await.unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Assigns the topics to a fresh user and returns (user, history).
    async fn assign(&self, topics: &[&TopicWithDocument]) -> (Uuid, Uuid) {
        let user_id = Uuid::new_v4();
        let ids: Vec<Uuid> = topics.iter().map(|t| t.topic.id).collect();
        let (status, body) = self
            .post(&format!("/api/createuserlearning/{}", user_id), json!({ "topics": ids }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let history_id = body["data"]["learning"]["history_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap();
        (user_id, history_id)
    }
}

#[tokio::test]
async fn creating_learning_history_starts_every_topic_at_page_zero() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let renal = app.topic("renal", 3).await;

    let (user_id, history_id) = app.assign(&[&cardio, &renal]).await;

    let (status, body) = app
        .get(&format!("/api/learningtopic/{}/{}", user_id, history_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], json!(false));

    let data = &body["data"];
    assert_eq!(data["active_topic_id"], json!(cardio.topic.id));
    assert_eq!(data["percent_complete"], json!(0.0));
    let topics = data["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["current_page"], json!(0));
    assert_eq!(topics[0]["pdf"], json!(BASE64.encode(PDF)));
}

#[tokio::test]
async fn assigning_overlapping_topics_returns_the_existing_history() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let (user_id, history_id) = app.assign(&[&cardio]).await;

    let (status, body) = app
        .post(
            &format!("/api/createuserlearning/{}", user_id),
            json!({ "topics": [cardio.topic.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created"], json!(false));
    assert_eq!(body["data"]["learning"]["history_id"], json!(history_id));
}

#[tokio::test]
async fn assigning_requires_topics_that_exist() {
    let app = TestApp::new();
    let user = Uuid::new_v4();

    let (status, body) = app
        .post(&format!("/api/createuserlearning/{}", user), json!({ "topics": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Topics are required"));

    let (status, _) = app
        .post(
            &format!("/api/createuserlearning/{}", user),
            json!({ "topics": [Uuid::new_v4()] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn updating_the_page_sets_and_clears_completion() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let (user_id, history_id) = app.assign(&[&cardio]).await;
    let uri = format!(
        "/api/updatecurrentpage/{}/{}/{}",
        user_id, history_id, cardio.topic.id
    );

    let (status, body) = app.post(&uri, json!({ "page": 5 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_page"], json!(5));
    assert_eq!(body["data"]["completed"], json!(true));
    assert!(body["data"]["completed_at"].is_string());

    let (status, body) = app.post(&uri, json!({ "currentPage": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], json!(false));
    assert!(body["data"]["completed_at"].is_null());
}

#[tokio::test]
async fn page_updates_are_validated() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let other = app.topic("other", 5).await;
    let (user_id, history_id) = app.assign(&[&cardio]).await;
    let uri = |topic: Uuid| format!("/api/updatecurrentpage/{}/{}/{}", user_id, history_id, topic);

    let (status, _) = app.post(&uri(cardio.topic.id), json!({ "page": 6 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post(&uri(cardio.topic.id), json!({ "page": -1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!(true));

    let (status, _) = app.post(&uri(other.topic.id), json!({ "page": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            &format!("/api/updatecurrentpage/not-a-user/{}/{}", history_id, cardio.topic.id),
            json!({ "page": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid userId parameter"));
}

#[tokio::test]
async fn histories_are_private_to_their_owner() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let (_, history_id) = app.assign(&[&cardio]).await;

    let (status, body) = app
        .get(&format!("/api/learningtopic/{}/{}", Uuid::new_v4(), history_id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!(true));
}

#[tokio::test]
async fn requested_topic_overrides_the_default_active_topic() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 2).await;
    let renal = app.topic("renal", 2).await;
    let (user_id, history_id) = app.assign(&[&cardio, &renal]).await;

    let (_, body) = app
        .get(&format!(
            "/api/learningtopic/{}/{}?topic={}&include_pdf=false",
            user_id, history_id, renal.topic.id
        ))
        .await;
    assert_eq!(body["data"]["active_topic_id"], json!(renal.topic.id));
    assert!(body["data"]["topics"][0]["pdf"].is_null());
}

#[tokio::test]
async fn completed_topics_are_listed_first() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 4).await;
    let renal = app.topic("renal", 2).await;
    let (user_id, history_id) = app.assign(&[&cardio, &renal]).await;
    app.post(
        &format!("/api/updatecurrentpage/{}/{}/{}", user_id, history_id, renal.topic.id),
        json!({ "page": 2 }),
    )
    .await;

    let (_, body) = app
        .get(&format!("/api/learningtopic/{}/{}?include_pdf=false", user_id, history_id))
        .await;
    let data = &body["data"];
    assert_eq!(data["topics"][0]["topic_id"], json!(renal.topic.id));
    assert_eq!(data["topics"][0]["completed"], json!(true));
    assert_eq!(data["active_topic_id"], json!(cardio.topic.id));
    let percent = data["percent_complete"].as_f64().unwrap();
    assert!((percent - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn missing_pdf_is_reported_as_null() {
    let app = TestApp::new();
    let ghost = app.db.create_topic("ghost", "topics/ghost.pdf", 3).await.unwrap();
    let (user_id, history_id) = app.assign(&[&ghost]).await;

    let (status, body) = app
        .get(&format!("/api/learningtopic/{}/{}", user_id, history_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["topics"][0]["pdf"].is_null());
}

#[tokio::test]
async fn single_topic_progress_rejects_duplicates() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let user = Uuid::new_v4();
    let uri = format!("/api/createuserlearning/{}/{}", user, cardio.topic.id);

    let (status, body) = app.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["current_page"], json!(0));
    assert_eq!(body["data"]["total_pages"], json!(5));

    let (status, body) = app.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("User already has progress for this document"));

    let (status, _) = app
        .post(&format!("/api/createuserlearning/{}/{}", user, Uuid::new_v4()), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn learning_history_lists_all_progress_records() {
    let app = TestApp::new();
    let user = Uuid::new_v4();

    let (status, body) = app.get(&format!("/api/learninghistory/{}", user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("No reading history found for the user"));
    assert_eq!(body["data"], json!([]));

    let cardio = app.topic("cardio", 5).await;
    app.post(&format!("/api/createuserlearning/{}/{}", user, cardio.topic.id), json!({}))
        .await;

    let (status, body) = app.get(&format!("/api/learninghistory/{}", user)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["topic"]["name"], json!("cardio"));
    assert_eq!(items[0]["document"]["total_pages"], json!(5));
}

#[tokio::test]
async fn learning_topic_listing_and_topic_upload() {
    let app = TestApp::new();
    let boundary = "learning-progress-boundary";
    let mut body = Vec::new();
    for (name, value) in [("name", "Pharmacology"), ("total_pages", "12")] {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n",
                b = boundary,
                n = name,
                v = value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"pharm.pdf\"\r\nContent-Type: application/pdf\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(PDF);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let (status, created) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/topics")
                .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["data"]["document"]["total_pages"], json!(12));
    let key = created["data"]["topic"]["doc_file_name"].as_str().unwrap();
    assert_eq!(app.storage.get_document(key).await.unwrap(), PDF);

    let (status, listed) = app.get("/api/learningtopic").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"][0]["topic"]["name"], json!("Pharmacology"));

    let (status, all) = app.get("/api/topics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn topic_upload_rejects_non_pdf_files() {
    let app = TestApp::new();
    let boundary = "b";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nNotes\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"total_pages\"\r\n\r\n3\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\r\nplain text\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let (status, response) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/topics")
                .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], json!("Uploaded file is not a PDF"));
}

#[tokio::test]
async fn topic_upload_rejects_page_counts_the_database_cannot_hold() {
    let app = TestApp::new();
    let boundary = "b";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nHuge\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"total_pages\"\r\n\r\n3000000000\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"huge.pdf\"\r\n\r\n",
        b = boundary
    )
    .into_bytes();
    body.extend_from_slice(PDF);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let (status, response) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/topics")
                .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], json!("total_pages must be a non-negative integer"));
    assert_eq!(app.storage.object_count(), 0);
    assert!(app.db.list_topics().await.unwrap().is_empty());
}

#[tokio::test]
async fn loading_a_sequence_does_not_create_progress() {
    let app = TestApp::new();
    let cardio = app.topic("cardio", 5).await;
    let user_id = Uuid::new_v4();
    let history = app
        .db
        .create_learning_history(user_id, &[cardio.topic.id])
        .await
        .unwrap();

    let (status, _) = app
        .get(&format!("/api/learningtopic/{}/{}", user_id, history.id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.db.list_progress_for_user(user_id).await.unwrap().is_empty());

    app.db
        .create_progress(UserDocumentProgress::start(
            user_id,
            &cardio.document,
            chrono::Utc::now(),
        ))
        .await
        .unwrap();
    let (status, body) = app
        .get(&format!("/api/learningtopic/{}/{}?include_pdf=false", user_id, history.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["topics"][0]["current_page"], json!(0));
}
