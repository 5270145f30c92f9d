use async_trait::async_trait;
use chrono::{DateTime, Utc};
use funnel_core::model::{LeadStatus, SessionId, SessionRecord, SessionSave};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Aggregate counts over every stored session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionStats {
    pub total: u64,
    pub unique_emails: u64,
    pub privacy_consents: u64,
    pub marketing_consents: u64,
    pub leads: u64,
    pub non_leads: u64,
}

impl SubmissionStats {
    /// Share of `part` in `total`, in percent. Zero when there are no rows.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self, part: u64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        part as f64 * 100.0 / self.total as f64
    }

    fn from_records(records: &[SessionRecord]) -> Self {
        let mut emails: Vec<&str> = records.iter().filter_map(|r| r.email.as_deref()).collect();
        emails.sort_unstable();
        emails.dedup();
        let count =
            |pred: fn(&SessionRecord) -> bool| records.iter().filter(|r| pred(r)).count() as u64;
        Self {
            total: records.len() as u64,
            unique_emails: emails.len() as u64,
            privacy_consents: count(|r| r.privacy_consent),
            marketing_consents: count(|r| r.marketing_consent),
            leads: count(|r| r.is_lead.is_lead()),
            non_leads: count(|r| !r.is_lead.is_lead()),
        }
    }
}

/// Repository contract for funnel session rows.
///
/// A session id identifies at most one row and rows are never deleted.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Insert a placeholder row unless one already exists for `session_id`.
    ///
    /// Returns `true` when a row was created.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn create_initial_session(
        &self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Record the last funnel step. Creates the row (with `created_at = now`) if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn update_drop_off_page(
        &self,
        session_id: &SessionId,
        page: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Set only `is_lead`. A missing row is left missing.
    ///
    /// Returns `true` when a row was updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update fails.
    async fn update_lead_status(
        &self,
        session_id: &SessionId,
        status: LeadStatus,
    ) -> Result<bool, StorageError>;

    /// Full upsert of contact details, answers and consents.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn save_session(&self, save: &SessionSave) -> Result<(), StorageError>;

    /// Every row, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read.
    async fn list_submissions(&self) -> Result<Vec<SessionRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the aggregate query fails.
    async fn submission_stats(&self) -> Result<SubmissionStats, StorageError>;
}

#[derive(Default)]
struct MemoryRows {
    next_id: i64,
    rows: HashMap<SessionId, SessionRecord>,
}

impl MemoryRows {
    fn insert_initial(
        &mut self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> &mut SessionRecord {
        self.next_id += 1;
        let id = self.next_id;
        self.rows
            .entry(session_id.clone())
            .or_insert_with(|| SessionRecord::initial(id, session_id.clone(), created_at))
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<Mutex<MemoryRows>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryRows>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn create_initial_session(
        &self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        if guard.rows.contains_key(session_id) {
            return Ok(false);
        }
        guard.insert_initial(session_id, created_at);
        Ok(true)
    }

    async fn update_drop_off_page(
        &self,
        session_id: &SessionId,
        page: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = if guard.rows.contains_key(session_id) {
            guard.rows.get_mut(session_id)
        } else {
            Some(guard.insert_initial(session_id, now))
        };
        if let Some(row) = row {
            page.clone_into(&mut row.drop_off_page);
        }
        Ok(())
    }

    async fn update_lead_status(
        &self,
        session_id: &SessionId,
        status: LeadStatus,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let Some(row) = guard.rows.get_mut(session_id) else {
            return Ok(false);
        };
        row.is_lead = status;
        Ok(true)
    }

    async fn save_session(&self, save: &SessionSave) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.rows.contains_key(&save.session_id) {
            guard.insert_initial(&save.session_id, save.created_at);
        }
        if let Some(row) = guard.rows.get_mut(&save.session_id) {
            row.apply_save(save);
        }
        Ok(())
    }

    async fn list_submissions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<SessionRecord> = guard.rows.values().cloned().collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows)
    }

    async fn submission_stats(&self) -> Result<SubmissionStats, StorageError> {
        let rows = self.list_submissions().await?;
        Ok(SubmissionStats::from_records(&rows))
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub submissions: Arc<dyn SubmissionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let submissions: Arc<dyn SubmissionRepository> = Arc::new(InMemoryRepository::new());
        Self { submissions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::model::{QuizAnswers, SubmissionDraft};
    use funnel_core::time::fixed_now;

    fn sid(raw: &str) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    fn save_for(id: &SessionId, email: &str) -> SessionSave {
        let mut answers = QuizAnswers::new();
        answers.record(0, "25-34");
        SessionSave::from_draft(
            id.clone(),
            SubmissionDraft {
                email: email.to_owned(),
                name: Some("Ada".to_owned()),
                quiz_answers: answers,
                privacy_consent: true,
                marketing_consent: false,
            },
            fixed_now(),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let repo = InMemoryRepository::new();
        let id = sid("s1");
        assert!(repo.create_initial_session(&id, fixed_now()).await.unwrap());
        assert!(!repo.create_initial_session(&id, fixed_now()).await.unwrap());
        let rows = repo.list_submissions().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].drop_off_page, "quiz_start");
    }

    #[tokio::test]
    async fn drop_off_creates_but_lead_does_not() {
        let repo = InMemoryRepository::new();
        repo.update_drop_off_page(&sid("s1"), "question_3", fixed_now())
            .await
            .unwrap();
        assert!(!repo.update_lead_status(&sid("ghost"), LeadStatus::Yes).await.unwrap());
        let rows = repo.list_submissions().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].drop_off_page, "question_3");
    }

    #[tokio::test]
    async fn save_after_lead_keeps_lead_and_page() {
        let repo = InMemoryRepository::new();
        let id = sid("s1");
        repo.create_initial_session(&id, fixed_now()).await.unwrap();
        repo.update_drop_off_page(&id, "question_3", fixed_now())
            .await
            .unwrap();
        assert!(repo.update_lead_status(&id, LeadStatus::Yes).await.unwrap());
        repo.save_session(&save_for(&id, "a@b.com")).await.unwrap();

        let row = repo.list_submissions().await.unwrap().remove(0);
        assert_eq!(row.email.as_deref(), Some("a@b.com"));
        assert_eq!(row.is_lead, LeadStatus::Yes);
        assert_eq!(row.drop_off_page, "question_3");
    }

    #[tokio::test]
    async fn stats_and_ordering() {
        let repo = InMemoryRepository::new();
        for (raw, email) in [("s1", "a@b.com"), ("s2", "a@b.com"), ("s3", "c@d.com")] {
            repo.save_session(&save_for(&sid(raw), email)).await.unwrap();
        }
        repo.create_initial_session(&sid("s4"), fixed_now()).await.unwrap();
        repo.update_lead_status(&sid("s3"), LeadStatus::Yes).await.unwrap();

        let rows = repo.list_submissions().await.unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(order, vec!["s4", "s3", "s2", "s1"]);

        let stats = repo.submission_stats().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.unique_emails, 2);
        assert_eq!(stats.privacy_consents, 3);
        assert_eq!(stats.marketing_consents, 0);
        assert_eq!(stats.leads, 1);
        assert_eq!(stats.non_leads, 3);
        assert!((stats.percent(stats.leads) - 25.0).abs() < f64::EPSILON);
    }
}
