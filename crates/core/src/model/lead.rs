use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeadStatusError {
    #[error("invalid lead status: {0}")]
    Invalid(String),
}

/// Whether the visitor clicked "Get My Plan".
///
/// Stored as the single letters `Y` / `N`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    #[serde(rename = "Y")]
    Yes,
    #[default]
    #[serde(rename = "N")]
    No,
}

impl LeadStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::Yes => "Y",
            LeadStatus::No => "N",
        }
    }

    #[must_use]
    pub fn is_lead(self) -> bool {
        matches!(self, LeadStatus::Yes)
    }

    /// Reads a stored column value; legacy rows may hold `NULL`, which means `N`.
    ///
    /// # Errors
    ///
    /// Returns `LeadStatusError::Invalid` for anything other than `Y`, `N` or nothing.
    pub fn from_stored(value: Option<&str>) -> Result<Self, LeadStatusError> {
        match value {
            None => Ok(LeadStatus::No),
            Some(raw) => raw.parse(),
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = LeadStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Y" | "y" => Ok(LeadStatus::Yes),
            "N" | "n" | "" => Ok(LeadStatus::No),
            other => Err(LeadStatusError::Invalid(other.to_owned())),
        }
    }
}

impl From<bool> for LeadStatus {
    fn from(is_lead: bool) -> Self {
        if is_lead { LeadStatus::Yes } else { LeadStatus::No }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reads_as_no() {
        assert_eq!(LeadStatus::from_stored(None).unwrap(), LeadStatus::No);
        assert_eq!(LeadStatus::from_stored(Some("Y")).unwrap(), LeadStatus::Yes);
        assert!(LeadStatus::from_stored(Some("maybe")).is_err());
    }

    #[test]
    fn serializes_as_letters() {
        assert_eq!(serde_json::to_string(&LeadStatus::Yes).unwrap(), "\"Y\"");
        let parsed: LeadStatus = serde_json::from_str("\"N\"").unwrap();
        assert_eq!(parsed, LeadStatus::No);
    }
}
