use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LeadStatus, QuizAnswers, SessionId};

/// Drop-off page recorded for a freshly created session.
pub const INITIAL_DROP_OFF_PAGE: &str = "quiz_start";

//
// ─── READ MODEL ────────────────────────────────────────────────────────────────
//

/// One row of funnel activity: everything known about a single visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: i64,
    pub session_id: SessionId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub quiz_answers: QuizAnswers,
    pub privacy_consent: bool,
    pub marketing_consent: bool,
    pub is_lead: LeadStatus,
    pub drop_off_page: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the store first wrote the row, as opposed to the client's `created_at`.
    pub created_timestamp: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Placeholder row written on first contact.
    #[must_use]
    pub fn initial(id: i64, session_id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            session_id,
            email: None,
            name: None,
            quiz_answers: QuizAnswers::default(),
            privacy_consent: false,
            marketing_consent: false,
            is_lead: LeadStatus::No,
            drop_off_page: INITIAL_DROP_OFF_PAGE.to_owned(),
            created_at,
            submitted_at: None,
            created_timestamp: Some(created_at),
        }
    }

    /// Applies a full save on top of the stored row.
    ///
    /// `created_at` stays at first contact; lead status and drop-off page only
    /// change when the save carries them.
    pub fn apply_save(&mut self, save: &SessionSave) {
        self.email = Some(save.email.clone());
        self.name.clone_from(&save.name);
        self.quiz_answers = save.quiz_answers.clone();
        self.privacy_consent = save.privacy_consent;
        self.marketing_consent = save.marketing_consent;
        self.submitted_at = Some(save.submitted_at);
        if let Some(status) = save.is_lead {
            self.is_lead = status;
        }
        if let Some(page) = &save.drop_off_page {
            self.drop_off_page.clone_from(page);
        }
    }
}

//
// ─── WRITE MODEL ───────────────────────────────────────────────────────────────
//

/// Contact details and answers collected by the email/name steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionDraft {
    pub email: String,
    pub name: Option<String>,
    pub quiz_answers: QuizAnswers,
    pub privacy_consent: bool,
    pub marketing_consent: bool,
}

/// Full upsert of a session row.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSave {
    pub session_id: SessionId,
    pub email: String,
    pub name: Option<String>,
    pub quiz_answers: QuizAnswers,
    pub privacy_consent: bool,
    pub marketing_consent: bool,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    /// `None` keeps whatever lead status is already stored.
    pub is_lead: Option<LeadStatus>,
    /// `None` keeps whatever drop-off page is already stored.
    pub drop_off_page: Option<String>,
}

impl SessionSave {
    #[must_use]
    pub fn from_draft(
        session_id: SessionId,
        draft: SubmissionDraft,
        created_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            email: draft.email,
            name: draft.name,
            quiz_answers: draft.quiz_answers,
            privacy_consent: draft.privacy_consent,
            marketing_consent: draft.marketing_consent,
            created_at,
            submitted_at,
            is_lead: None,
            drop_off_page: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn save_keeps_lead_and_created_at_when_absent() {
        let id = SessionId::new("s1").unwrap();
        let mut record = SessionRecord::initial(1, id.clone(), fixed_now());
        record.is_lead = LeadStatus::Yes;
        record.drop_off_page = "question_3".to_owned();

        let later = fixed_now() + chrono::Duration::minutes(5);
        let save = SessionSave::from_draft(
            id,
            SubmissionDraft {
                email: "a@b.com".to_owned(),
                name: None,
                quiz_answers: QuizAnswers::default(),
                privacy_consent: true,
                marketing_consent: false,
            },
            later,
            later,
        );
        record.apply_save(&save);

        assert_eq!(record.email.as_deref(), Some("a@b.com"));
        assert_eq!(record.is_lead, LeadStatus::Yes);
        assert_eq!(record.drop_off_page, "question_3");
        assert_eq!(record.created_at, fixed_now());
        assert_eq!(record.submitted_at, Some(later));
    }
}
