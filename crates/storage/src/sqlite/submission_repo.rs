use chrono::{DateTime, Utc};
use funnel_core::model::{INITIAL_DROP_OFF_PAGE, LeadStatus, SessionId, SessionRecord, SessionSave};
use funnel_core::time::iso_timestamp;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{bool_to_i64, conn, map_submission_row, ser};
use crate::repository::{StorageError, SubmissionRepository, SubmissionStats};

fn count(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<u64, StorageError> {
    let value: Option<i64> = row.try_get(column).map_err(ser)?;
    u64::try_from(value.unwrap_or(0))
        .map_err(|_| StorageError::Serialization(format!("{column} is negative")))
}

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn create_initial_session(
        &self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO submissions (session_id, created_at, drop_off_page)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_id) DO NOTHING
            ",
        )
        .bind(session_id.as_str())
        .bind(iso_timestamp(created_at))
        .bind(INITIAL_DROP_OFF_PAGE)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let created = res.rows_affected() > 0;
        tracing::debug!(session_id = %session_id, created, "create session");
        Ok(created)
    }

    async fn update_drop_off_page(
        &self,
        session_id: &SessionId,
        page: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO submissions (session_id, created_at, drop_off_page)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_id) DO UPDATE SET
                drop_off_page = excluded.drop_off_page
            ",
        )
        .bind(session_id.as_str())
        .bind(iso_timestamp(now))
        .bind(page)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        tracing::debug!(session_id = %session_id, page, "drop-off page updated");
        Ok(())
    }

    async fn update_lead_status(
        &self,
        session_id: &SessionId,
        status: LeadStatus,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query("UPDATE submissions SET is_lead = ?1 WHERE session_id = ?2")
            .bind(status.as_str())
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        Ok(res.rows_affected() > 0)
    }

    async fn save_session(&self, save: &SessionSave) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO submissions (
                session_id, email, name, quiz_answers, privacy_consent, marketing_consent,
                created_at, submitted_at, is_lead, drop_off_page
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, COALESCE(?9, 'N'), COALESCE(?10, 'quiz_start'))
            ON CONFLICT(session_id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                quiz_answers = excluded.quiz_answers,
                privacy_consent = excluded.privacy_consent,
                marketing_consent = excluded.marketing_consent,
                submitted_at = excluded.submitted_at,
                is_lead = COALESCE(?9, submissions.is_lead),
                drop_off_page = COALESCE(?10, submissions.drop_off_page)
            ",
        )
        .bind(save.session_id.as_str())
        .bind(save.email.as_str())
        .bind(save.name.as_deref())
        .bind(save.quiz_answers.to_blob())
        .bind(bool_to_i64(save.privacy_consent))
        .bind(bool_to_i64(save.marketing_consent))
        .bind(iso_timestamp(save.created_at))
        .bind(iso_timestamp(save.submitted_at))
        .bind(save.is_lead.map(LeadStatus::as_str))
        .bind(save.drop_off_page.as_deref())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        tracing::info!(session_id = %save.session_id, "session saved");
        Ok(())
    }

    async fn list_submissions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, session_id, email, name, quiz_answers, privacy_consent, marketing_consent,
                   created_at, submitted_at, is_lead, drop_off_page, created_timestamp
            FROM submissions
            ORDER BY created_timestamp DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_submission_row).collect()
    }

    async fn submission_stats(&self) -> Result<SubmissionStats, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total,
                COUNT(DISTINCT email) AS unique_emails,
                SUM(CASE WHEN privacy_consent != 0 THEN 1 ELSE 0 END) AS privacy_yes,
                SUM(CASE WHEN marketing_consent != 0 THEN 1 ELSE 0 END) AS marketing_yes,
                SUM(CASE WHEN COALESCE(is_lead, 'N') = 'Y' THEN 1 ELSE 0 END) AS leads,
                SUM(CASE WHEN COALESCE(is_lead, 'N') = 'N' THEN 1 ELSE 0 END) AS non_leads
            FROM submissions
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        Ok(SubmissionStats {
            total: count(&row, "total")?,
            unique_emails: count(&row, "unique_emails")?,
            privacy_consents: count(&row, "privacy_yes")?,
            marketing_consents: count(&row, "marketing_yes")?,
            leads: count(&row, "leads")?,
            non_leads: count(&row, "non_leads")?,
        })
    }
}
