pub mod db;
pub mod memory;
pub mod progress_client;
pub mod storage;

pub use db::DbAdapter;
pub use memory::{InMemoryDb, InMemoryStorage};
pub use progress_client::HttpProgressClient;
pub use storage::{LocalStorage, S3Storage};
