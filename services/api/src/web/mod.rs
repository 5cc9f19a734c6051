pub mod dto;
pub mod response;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::web::{rest::*, state::AppState};

pub use rest::ApiDoc;

/// Builds the API router. Middleware that depends on deployment settings
/// (CORS, body limits) is layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/topics", get(list_topics_handler).post(create_topic_handler))
        .route("/api/learningtopic", get(list_learning_topics_handler))
        .route(
            "/api/learningtopic/{user_id}/{progress_id}",
            get(get_learning_topic_handler),
        )
        .route(
            "/api/updatecurrentpage/{user_id}/{progress_id}/{topic_id}",
            post(update_current_page_handler),
        )
        .route("/api/learninghistory/{user_id}", get(learning_history_handler))
        .route(
            "/api/createuserlearning/{user_id}",
            post(create_user_learning_handler),
        )
        .route(
            "/api/createuserlearning/{user_id}/{topic_id}",
            post(create_topic_progress_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
