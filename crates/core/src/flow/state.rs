use crate::model::{AnswerValue, QuizAnswers, SubmissionDraft};

use super::config::FlowConfig;
use super::screen::Screen;

/// Email, name and consents captured by the contact steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub privacy_consent: bool,
    pub marketing_consent: bool,
}

/// Aggregated view of quiz progress, useful for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowProgress {
    /// 1-based number of the held question.
    pub question_number: usize,
    pub total: usize,
    pub percent: u8,
}

/// Complete funnel state; transitions produce a new value through `reduce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowState {
    pub(crate) started: bool,
    pub(crate) screen: Screen,
    pub(crate) question: usize,
    pub(crate) answers: QuizAnswers,
    pub(crate) selection: Vec<String>,
    pub(crate) contact: ContactDetails,
    pub(crate) submitting: bool,
    pub(crate) lead: bool,
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: false,
            screen: Screen::Question,
            question: 0,
            answers: QuizAnswers::default(),
            selection: Vec::new(),
            contact: ContactDetails::default(),
            submitting: false,
            lead: false,
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Held question index. Stays put while an interstitial is showing.
    #[must_use]
    pub fn question(&self) -> usize {
        self.question
    }

    #[must_use]
    pub fn answers(&self) -> &QuizAnswers {
        &self.answers
    }

    /// Choices toggled on the current multi-select question, in click order.
    #[must_use]
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    #[must_use]
    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    /// True while a contact save is in flight; the continue button is disabled.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    #[must_use]
    pub fn is_lead(&self) -> bool {
        self.lead
    }

    #[must_use]
    pub fn drop_off_label(&self) -> String {
        self.screen.drop_off_label(self.question)
    }

    #[must_use]
    pub fn progress(&self, config: &FlowConfig) -> FlowProgress {
        let total = config.question_count.max(1);
        let question_number = (self.question + 1).min(total);
        let percent = u8::try_from(question_number * 100 / total).unwrap_or(100);
        FlowProgress {
            question_number,
            total,
            percent,
        }
    }

    /// Everything a combined save needs, once an email has been captured.
    #[must_use]
    pub fn submission_draft(&self) -> Option<SubmissionDraft> {
        let email = self.contact.email.clone()?;
        Some(SubmissionDraft {
            email,
            name: self.contact.name.clone(),
            quiz_answers: self.answers.clone(),
            privacy_consent: self.contact.privacy_consent,
            marketing_consent: self.contact.marketing_consent,
        })
    }

    /// Re-seeds the transient selection when (re)entering a multi-select question.
    pub(crate) fn restore_selection(&mut self, config: &FlowConfig) {
        self.selection.clear();
        if !config.is_multi_select(self.question) {
            return;
        }
        match self.answers.for_question(self.question) {
            Some(AnswerValue::Choices(choices)) => self.selection.clone_from(choices),
            Some(AnswerValue::Text(text)) => self.selection.push(text.clone()),
            None => {}
        }
    }
}
