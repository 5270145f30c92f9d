use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use funnel_core::model::SessionId;
use funnel_core::time::from_millis;
use rand::Rng;

use crate::Clock;

/// Key under which the session id lives in tab storage.
pub const SESSION_ID_KEY: &str = "quiz_session_id";
/// Key holding the creation time (epoch millis) of the stored session id.
pub const SESSION_CREATED_KEY: &str = "quiz_session_id_created";

const SUFFIX_LEN: usize = 13;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Key/value storage scoped to one browser tab.
pub trait TabStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// `TabStorage` kept in process memory; one instance per simulated tab.
#[derive(Debug, Default)]
pub struct MemoryTabStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTabStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TabStorage for MemoryTabStorage {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.entries.lock().ok()?;
        guard.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(key.to_owned(), value.to_owned());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.remove(key);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// Issues the per-tab session id that ties tracking calls together.
#[derive(Clone)]
pub struct SessionIdentity {
    clock: Clock,
    storage: Option<Arc<dyn TabStorage>>,
}

impl SessionIdentity {
    #[must_use]
    pub fn new(clock: Clock, storage: Arc<dyn TabStorage>) -> Self {
        Self {
            clock,
            storage: Some(storage),
        }
    }

    /// Identity without tab storage, as during server-side rendering.
    #[must_use]
    pub fn server_side(clock: Clock) -> Self {
        Self {
            clock,
            storage: None,
        }
    }

    /// Returns the tab's session id, minting and storing one on first use.
    ///
    /// Without tab storage this is always the `server_session` placeholder.
    #[must_use]
    pub fn get_session_id(&self) -> SessionId {
        let Some(storage) = &self.storage else {
            return SessionId::server_placeholder();
        };
        if let Some(id) = storage
            .get(SESSION_ID_KEY)
            .and_then(|raw| SessionId::new(raw).ok())
        {
            return id;
        }

        let millis = self.clock.now_millis();
        let id = SessionId::from_parts(millis, &random_base36(SUFFIX_LEN))
            .unwrap_or_else(|_| SessionId::server_placeholder());
        storage.set(SESSION_ID_KEY, id.as_str());
        storage.set(SESSION_CREATED_KEY, &millis.to_string());
        tracing::debug!(session_id = %id, "minted session id");
        id
    }

    /// The current id with its creation time; "now" when none was recorded.
    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        let session_id = self.get_session_id();
        let created_at = self
            .storage
            .as_ref()
            .and_then(|s| s.get(SESSION_CREATED_KEY))
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(from_millis)
            .unwrap_or_else(|| self.clock.now());
        SessionMetadata {
            session_id,
            created_at,
        }
    }

    /// Forgets the stored id; the next call mints a fresh one.
    pub fn clear(&self) {
        if let Some(storage) = &self.storage {
            storage.remove(SESSION_ID_KEY);
            storage.remove(SESSION_CREATED_KEY);
        }
    }
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::model::SESSION_ID_PREFIX;
    use funnel_core::time::{FIXED_TEST_TIMESTAMP, fixed_clock, fixed_now};

    #[test]
    fn id_is_minted_once_per_tab() {
        let tab = Arc::new(MemoryTabStorage::new());
        let identity = SessionIdentity::new(fixed_clock(), tab.clone());
        let first = identity.get_session_id();
        assert_eq!(identity.get_session_id(), first);
        assert!(first.as_str().starts_with(SESSION_ID_PREFIX));
        assert_eq!(first.embedded_millis(), Some(FIXED_TEST_TIMESTAMP * 1000));
        let suffix = first.as_str().rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
        assert_eq!(tab.get(SESSION_ID_KEY).as_deref(), Some(first.as_str()));
    }

    #[test]
    fn separate_tabs_get_separate_ids() {
        let a = SessionIdentity::new(fixed_clock(), Arc::new(MemoryTabStorage::new()));
        let b = SessionIdentity::new(fixed_clock(), Arc::new(MemoryTabStorage::new()));
        assert_ne!(a.get_session_id(), b.get_session_id());
    }

    #[test]
    fn server_side_uses_placeholder() {
        let identity = SessionIdentity::server_side(fixed_clock());
        assert_eq!(identity.get_session_id().as_str(), "server_session");
        assert_eq!(identity.metadata().created_at, fixed_now());
    }

    #[test]
    fn metadata_and_clear() {
        let tab = Arc::new(MemoryTabStorage::new());
        let identity = SessionIdentity::new(fixed_clock(), tab.clone());
        let meta = identity.metadata();
        assert_eq!(meta.created_at, fixed_now());

        identity.clear();
        assert!(tab.get(SESSION_ID_KEY).is_none());
        assert!(tab.get(SESSION_CREATED_KEY).is_none());
        assert_ne!(identity.get_session_id(), meta.session_id);
    }
}
