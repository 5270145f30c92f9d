#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryRepository, Storage, StorageError, SubmissionRepository, SubmissionStats};
pub use sqlite::{SqliteInitError, SqliteRepository};
