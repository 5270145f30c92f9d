use chrono::{DateTime, Utc};
use funnel_core::model::{INITIAL_DROP_OFF_PAGE, LeadStatus, QuizAnswers, SessionId, SessionRecord};
use funnel_core::time::parse_stored_timestamp;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn bool_to_i64(v: bool) -> i64 {
    i64::from(v)
}

/// Lenient timestamp decoding: unreadable text is logged and read as `None`.
fn stored_timestamp(
    session_id: &SessionId,
    field: &'static str,
    raw: Option<&str>,
) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|r| !r.trim().is_empty())?;
    let parsed = parse_stored_timestamp(raw);
    if parsed.is_none() {
        tracing::warn!(session_id = %session_id, field, raw, "unreadable timestamp");
    }
    parsed
}

/// Lenient answers decoding: a corrupt blob is logged and read as no answers.
pub(crate) fn answers_from_blob(session_id: &SessionId, blob: Option<&str>) -> QuizAnswers {
    QuizAnswers::from_blob(blob).unwrap_or_else(|err| {
        tracing::warn!(session_id = %session_id, error = %err, "unreadable quiz answers, using empty map");
        QuizAnswers::default()
    })
}

pub(crate) fn map_submission_row(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    let session_id = SessionId::new(row.try_get::<String, _>("session_id").map_err(ser)?)
        .map_err(ser)?;
    let quiz_answers = answers_from_blob(
        &session_id,
        row.try_get::<Option<String>, _>("quiz_answers")
            .map_err(ser)?
            .as_deref(),
    );
    let is_lead = LeadStatus::from_stored(
        row.try_get::<Option<String>, _>("is_lead")
            .map_err(ser)?
            .as_deref(),
    )
    .map_err(ser)?;
    let created_timestamp = stored_timestamp(
        &session_id,
        "created_timestamp",
        row.try_get::<Option<String>, _>("created_timestamp")
            .map_err(ser)?
            .as_deref(),
    );
    // A client time that cannot be read falls back to the insert time.
    let created_at = stored_timestamp(
        &session_id,
        "created_at",
        row.try_get::<Option<String>, _>("created_at")
            .map_err(ser)?
            .as_deref(),
    )
    .or(created_timestamp)
    .unwrap_or(DateTime::UNIX_EPOCH);
    let submitted_at = stored_timestamp(
        &session_id,
        "submitted_at",
        row.try_get::<Option<String>, _>("submitted_at")
            .map_err(ser)?
            .as_deref(),
    );

    Ok(SessionRecord {
        id: row.try_get("id").map_err(ser)?,
        session_id,
        email: row.try_get("email").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        quiz_answers,
        privacy_consent: row
            .try_get::<Option<i64>, _>("privacy_consent")
            .map_err(ser)?
            .unwrap_or(0)
            != 0,
        marketing_consent: row
            .try_get::<Option<i64>, _>("marketing_consent")
            .map_err(ser)?
            .unwrap_or(0)
            != 0,
        is_lead,
        drop_off_page: row
            .try_get::<Option<String>, _>("drop_off_page")
            .map_err(ser)?
            .unwrap_or_else(|| INITIAL_DROP_OFF_PAGE.to_owned()),
        created_at,
        submitted_at,
        created_timestamp,
    })
}
