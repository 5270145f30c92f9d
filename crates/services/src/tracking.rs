use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use funnel_core::model::{LeadStatus, SessionId, SessionRecord, SessionSave, SubmissionDraft};
use storage::repository::{SubmissionRepository, SubmissionStats};

use crate::Clock;
use crate::error::TrackingError;

/// Destination for the best-effort tracking calls a funnel makes.
///
/// Implemented in-process by `TrackingService` and over HTTP by
/// `HttpTrackingClient`.
#[async_trait]
pub trait TrackingSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `TrackingError` if the session cannot be recorded.
    async fn create_session(
        &self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<(), TrackingError>;

    /// # Errors
    ///
    /// Returns `TrackingError` if the drop-off page cannot be recorded.
    async fn update_drop_off(&self, session_id: &SessionId, page: &str)
    -> Result<(), TrackingError>;

    /// # Errors
    ///
    /// Returns `TrackingError` if the lead flag cannot be recorded.
    async fn mark_lead(&self, session_id: &SessionId) -> Result<(), TrackingError>;

    /// # Errors
    ///
    /// Returns `TrackingError` if the submission cannot be saved.
    async fn save_submission(
        &self,
        session_id: &SessionId,
        draft: &SubmissionDraft,
        created_at: DateTime<Utc>,
    ) -> Result<(), TrackingError>;
}

/// Server-side tracking operations on top of the submission repository.
#[derive(Clone)]
pub struct TrackingService {
    clock: Clock,
    submissions: Arc<dyn SubmissionRepository>,
}

impl TrackingService {
    #[must_use]
    pub fn new(clock: Clock, submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self { clock, submissions }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert the placeholder row for a new visit; repeated calls are no-ops.
    ///
    /// Returns `true` when a row was created.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if persistence fails.
    pub async fn create_session(
        &self,
        session_id: &SessionId,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<bool, TrackingError> {
        let created_at = created_at.unwrap_or_else(|| self.clock.now());
        let created = self
            .submissions
            .create_initial_session(session_id, created_at)
            .await?;
        tracing::info!(session_id = %session_id, created, "initial session");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if persistence fails.
    pub async fn update_drop_off(
        &self,
        session_id: &SessionId,
        page: &str,
    ) -> Result<(), TrackingError> {
        self.submissions
            .update_drop_off_page(session_id, page, self.clock.now())
            .await?;
        tracing::debug!(session_id = %session_id, page, "drop-off page");
        Ok(())
    }

    /// Flag the visit as a lead.
    ///
    /// A session without a row is left alone; the call still succeeds.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if persistence fails.
    pub async fn mark_lead(&self, session_id: &SessionId) -> Result<bool, TrackingError> {
        let updated = self
            .submissions
            .update_lead_status(session_id, LeadStatus::Yes)
            .await?;
        if updated {
            tracing::info!(session_id = %session_id, "lead marked");
        } else {
            tracing::warn!(session_id = %session_id, "lead update matched no session row");
        }
        Ok(updated)
    }

    /// Full upsert of the visit.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if persistence fails.
    pub async fn save_session(&self, save: &SessionSave) -> Result<(), TrackingError> {
        self.submissions.save_session(save).await?;
        Ok(())
    }

    /// Every stored visit, newest first.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if rows cannot be read.
    pub async fn list_submissions(&self) -> Result<Vec<SessionRecord>, TrackingError> {
        Ok(self.submissions.list_submissions().await?)
    }

    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if the aggregate query fails.
    pub async fn stats(&self) -> Result<SubmissionStats, TrackingError> {
        Ok(self.submissions.submission_stats().await?)
    }
}

#[async_trait]
impl TrackingSink for TrackingService {
    async fn create_session(
        &self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<(), TrackingError> {
        TrackingService::create_session(self, session_id, Some(created_at)).await?;
        Ok(())
    }

    async fn update_drop_off(
        &self,
        session_id: &SessionId,
        page: &str,
    ) -> Result<(), TrackingError> {
        TrackingService::update_drop_off(self, session_id, page).await
    }

    async fn mark_lead(&self, session_id: &SessionId) -> Result<(), TrackingError> {
        TrackingService::mark_lead(self, session_id).await?;
        Ok(())
    }

    async fn save_submission(
        &self,
        session_id: &SessionId,
        draft: &SubmissionDraft,
        created_at: DateTime<Utc>,
    ) -> Result<(), TrackingError> {
        let save = SessionSave::from_draft(
            session_id.clone(),
            draft.clone(),
            created_at,
            self.clock.now(),
        );
        self.save_session(&save).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn service() -> TrackingService {
        TrackingService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn create_defaults_to_now() {
        let tracking = service();
        let id = SessionId::new("s1").unwrap();
        assert!(tracking.create_session(&id, None).await.unwrap());
        assert!(!tracking.create_session(&id, None).await.unwrap());
        let rows = tracking.list_submissions().await.unwrap();
        assert_eq!(rows[0].created_at, fixed_now());
    }

    #[tokio::test]
    async fn lead_without_row_reports_no_update() {
        let tracking = service();
        let id = SessionId::new("ghost").unwrap();
        assert!(!tracking.mark_lead(&id).await.unwrap());
        assert!(tracking.list_submissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sink_save_stamps_submission_time() {
        let tracking = service();
        let id = SessionId::new("s1").unwrap();
        let sink: &dyn TrackingSink = &tracking;
        let draft = SubmissionDraft {
            email: "a@b.com".into(),
            name: Some("Ada".into()),
            quiz_answers: Default::default(),
            privacy_consent: true,
            marketing_consent: true,
        };
        sink.save_submission(&id, &draft, fixed_now()).await.unwrap();
        let row = tracking.list_submissions().await.unwrap().remove(0);
        assert_eq!(row.submitted_at, Some(fixed_now()));
        assert!(row.marketing_consent);
    }
}
