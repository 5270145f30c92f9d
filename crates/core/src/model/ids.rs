use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest session id accepted from clients.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Prefix of every generated session id.
pub const SESSION_ID_PREFIX: &str = "session_";

/// Placeholder used when no tab storage exists (server-side rendering).
pub const SERVER_SESSION_ID: &str = "server_session";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionIdError {
    #[error("session id cannot be empty")]
    Empty,

    #[error("session id is too long: {len} > {MAX_SESSION_ID_LEN}")]
    TooLong { len: usize },

    #[error("session id contains control characters")]
    ControlCharacter,
}

/// Client-generated correlation key tying every tracking event of one visit together.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Validates and wraps a raw session id. Surrounding whitespace is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionIdError` if the id is blank, too long, or contains control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionIdError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_SESSION_ID_LEN {
            return Err(SessionIdError::TooLong { len });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(SessionIdError::ControlCharacter);
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    /// Builds the canonical `session_<millis>_<suffix>` form.
    ///
    /// # Errors
    ///
    /// Returns `SessionIdError` if the suffix makes the id invalid.
    pub fn from_parts(created_millis: i64, suffix: &str) -> Result<Self, SessionIdError> {
        Self::new(format!("{SESSION_ID_PREFIX}{created_millis}_{suffix}"))
    }

    /// The fixed id handed out when no client storage is available.
    #[must_use]
    pub fn server_placeholder() -> Self {
        Self(SERVER_SESSION_ID.to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation time embedded in a generated id, if the id has the canonical shape.
    #[must_use]
    pub fn embedded_millis(&self) -> Option<i64> {
        let rest = self.0.strip_prefix(SESSION_ID_PREFIX)?;
        let (millis, _) = rest.split_once('_')?;
        millis.parse().ok()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_ids() {
        assert_eq!(SessionId::new("   "), Err(SessionIdError::Empty));
        assert_eq!(SessionId::new(""), Err(SessionIdError::Empty));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = SessionId::new("  s1 ").unwrap();
        assert_eq!(id.as_str(), "s1");
    }

    #[test]
    fn rejects_overlong_and_control_characters() {
        let long = "x".repeat(MAX_SESSION_ID_LEN + 1);
        assert_eq!(
            SessionId::new(long),
            Err(SessionIdError::TooLong {
                len: MAX_SESSION_ID_LEN + 1
            })
        );
        assert_eq!(
            SessionId::new("abc\u{0}def"),
            Err(SessionIdError::ControlCharacter)
        );
    }

    #[test]
    fn canonical_ids_expose_creation_millis() {
        let id = SessionId::from_parts(1_700_000_000_000, "k3j9x0a1b2c3d").unwrap();
        assert_eq!(id.as_str(), "session_1700000000000_k3j9x0a1b2c3d");
        assert_eq!(id.embedded_millis(), Some(1_700_000_000_000));
        assert_eq!(SessionId::new("s1").unwrap().embedded_millis(), None);
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let id: SessionId = serde_json::from_str("\"s1\"").unwrap();
        assert_eq!(id.to_string(), "s1");
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"s1\"");
    }
}
