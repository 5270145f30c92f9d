use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use super::screen::Interstitial;

pub const DEFAULT_QUESTION_COUNT: usize = 20;
pub const DEFAULT_ADVANCE_DELAY_MS: u64 = 300;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowConfigError {
    #[error("a quiz needs at least one question")]
    NoQuestions,

    #[error("checkpoint after question {question} is outside the quiz (0..{count})")]
    CheckpointOutOfRange { question: usize, count: usize },

    #[error("more than one checkpoint after question {0}")]
    DuplicateCheckpoint(usize),

    #[error("multi-select question {question} is outside the quiz (0..{count})")]
    MultiSelectOutOfRange { question: usize, count: usize },

    #[error("invalid flow config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// When the email address is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCapture {
    /// Save as soon as the email page is submitted, then again with the name.
    Immediate,
    /// Hold the email until the name is known and save both in one call.
    #[default]
    Deferred,
}

/// Shows an interstitial after a question instead of moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub question: usize,
    pub page: Interstitial,
}

impl Checkpoint {
    #[must_use]
    pub fn new(question: usize, page: Interstitial) -> Self {
        Self { question, page }
    }
}

/// Declarative shape of the funnel: question count, question kinds and checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowConfig {
    pub question_count: usize,
    pub multi_select: BTreeSet<usize>,
    pub checkpoints: Vec<Checkpoint>,
    pub email_capture: EmailCapture,
    pub advance_delay_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            multi_select: BTreeSet::from([18]),
            checkpoints: vec![
                Checkpoint::new(4, Interstitial::Teaser),
                Checkpoint::new(16, Interstitial::UserProfile),
                Checkpoint::new(18, Interstitial::End),
            ],
            email_capture: EmailCapture::Deferred,
            advance_delay_ms: DEFAULT_ADVANCE_DELAY_MS,
        }
    }
}

impl FlowConfig {
    /// Parses and validates a JSON flow description.
    ///
    /// Missing keys fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns `FlowConfigError` if the JSON is malformed or describes an impossible quiz.
    pub fn from_json(raw: &str) -> Result<Self, FlowConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that checkpoints and question kinds reference real questions.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), FlowConfigError> {
        let count = self.question_count;
        if count == 0 {
            return Err(FlowConfigError::NoQuestions);
        }
        let mut seen = BTreeSet::new();
        for checkpoint in &self.checkpoints {
            if checkpoint.question >= count {
                return Err(FlowConfigError::CheckpointOutOfRange {
                    question: checkpoint.question,
                    count,
                });
            }
            if !seen.insert(checkpoint.question) {
                return Err(FlowConfigError::DuplicateCheckpoint(checkpoint.question));
            }
        }
        if let Some(&question) = self.multi_select.iter().find(|&&q| q >= count) {
            return Err(FlowConfigError::MultiSelectOutOfRange { question, count });
        }
        Ok(())
    }

    #[must_use]
    pub fn last_question(&self) -> usize {
        self.question_count.saturating_sub(1)
    }

    #[must_use]
    pub fn is_multi_select(&self, question: usize) -> bool {
        self.multi_select.contains(&question)
    }

    #[must_use]
    pub fn checkpoint_after(&self, question: usize) -> Option<Interstitial> {
        self.checkpoints
            .iter()
            .find(|c| c.question == question)
            .map(|c| c.page)
    }

    #[must_use]
    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }

    #[must_use]
    pub fn with_email_capture(mut self, capture: EmailCapture) -> Self {
        self.email_capture = capture;
        self
    }
}
