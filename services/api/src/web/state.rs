//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use learning_progress_core::ports::{DatabaseService, DocumentStorage};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub storage: Arc<dyn DocumentStorage>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, storage: Arc<dyn DocumentStorage>) -> Self {
        Self { db, storage }
    }
}
