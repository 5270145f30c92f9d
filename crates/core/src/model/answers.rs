use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswersError {
    #[error("quiz answers blob is not valid JSON: {0}")]
    InvalidBlob(#[from] serde_json::Error),
}

/// A single recorded answer: one option, or every option of a multi-select question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    /// Flattened form used by reports and spreadsheet exports.
    ///
    /// Choices are joined with `", "`. This is lossy: an option that itself
    /// contains a comma cannot be told apart, so the result is never parsed back.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Choices(choices) => choices.join(", "),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_owned())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        AnswerValue::Choices(value)
    }
}

/// Answers keyed by question, where the key is the 0-based question index as text.
///
/// Persisted as a JSON object blob in the `quiz_answers` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizAnswers(BTreeMap<String, AnswerValue>);

impl QuizAnswers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the answer for a question index, replacing any earlier one.
    pub fn record(&mut self, question: usize, value: impl Into<AnswerValue>) {
        self.0.insert(question.to_string(), value.into());
    }

    /// Inserts an answer under an arbitrary key as sent by a client.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn for_question(&self, question: usize) -> Option<&AnswerValue> {
        self.0.get(&question.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Entries in question order (numeric keys first, see `compare_question_keys`).
    #[must_use]
    pub fn ordered(&self) -> Vec<(&str, &AnswerValue)> {
        let mut entries: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| compare_question_keys(a.0, b.0));
        entries
    }

    /// Serializes to the text blob stored in the database.
    #[must_use]
    pub fn to_blob(&self) -> String {
        // A map of strings to strings or string lists always serializes.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_owned())
    }

    /// Parses a stored blob. A missing or blank blob yields no answers.
    ///
    /// # Errors
    ///
    /// Returns `AnswersError::InvalidBlob` if the text is not a JSON answers object.
    pub fn from_blob(blob: Option<&str>) -> Result<Self, AnswersError> {
        match blob.map(str::trim) {
            None | Some("") | Some("null") => Ok(Self::default()),
            Some(text) => Ok(serde_json::from_str(text)?),
        }
    }
}

impl FromIterator<(String, AnswerValue)> for QuizAnswers {
    fn from_iter<T: IntoIterator<Item = (String, AnswerValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Orders question keys numerically when both parse as numbers, lexically otherwise.
///
/// Numeric keys sort before any other key so the order stays total.
#[must_use]
pub fn compare_question_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
