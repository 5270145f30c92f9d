use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::tracking::TrackingService;

/// Assembles the services the binary and the HTTP server share.
#[derive(Clone)]
pub struct AppServices {
    tracking: Arc<TrackingService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let tracking = Arc::new(TrackingService::new(
            clock,
            Arc::clone(&storage.submissions),
        ));
        Self { tracking }
    }

    #[must_use]
    pub fn tracking(&self) -> Arc<TrackingService> {
        Arc::clone(&self.tracking)
    }
}
