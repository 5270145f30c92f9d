//! Tracking endpoints: validate the JSON body, call the tracking service, echo.
//!
//! Every body field is optional at the serde level so a missing field becomes
//! a 400 with a readable message instead of a deserializer error.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use funnel_core::model::{LeadStatus, QuizAnswers, SessionId, SessionSave};
use funnel_core::time::{iso_timestamp, parse_timestamp};

use crate::AppState;
use crate::error::ApiError;

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEmailRequest {
    pub email: Option<String>,
    pub session_id: Option<String>,
    pub name: Option<String>,
    pub quiz_answers: Option<QuizAnswers>,
    pub privacy_consent: Option<bool>,
    pub marketing_consent: Option<bool>,
    pub created_at: Option<String>,
    pub submitted_at: Option<String>,
    pub is_lead: Option<String>,
    pub drop_off_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOffRequest {
    pub session_id: Option<String>,
    pub drop_off_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub session_id: Option<String>,
}

// ─── FIELD HELPERS ───────────────────────────────────────────────────────────

/// Blank strings count as missing.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn session_id(raw: String) -> Result<SessionId, ApiError> {
    SessionId::new(raw).map_err(|err| ApiError::bad_request(format!("Invalid session ID: {err}")))
}

fn timestamp(field: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    present(raw)
        .map(|value| {
            parse_timestamp(&value)
                .map_err(|_| ApiError::bad_request(format!("Invalid {field} timestamp: {value}")))
        })
        .transpose()
}

fn lead_status(raw: Option<String>) -> Result<Option<LeadStatus>, ApiError> {
    present(raw)
        .map(|value| {
            value
                .parse::<LeadStatus>()
                .map_err(|err| ApiError::bad_request(err.to_string()))
        })
        .transpose()
}

fn success(message: &str, session_id: &SessionId, echo: &[(&str, Value)]) -> Json<Value> {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("message".into(), message.into());
    body.insert("sessionId".into(), session_id.as_str().into());
    for (key, value) in echo {
        body.insert((*key).to_owned(), value.clone());
    }
    body.insert("timestamp".into(), iso_timestamp(Utc::now()).into());
    Json(Value::Object(body))
}

// ─── HANDLERS ────────────────────────────────────────────────────────────────

pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let Some(raw_id) = present(request.session_id) else {
        return Err(ApiError::bad_request("Session ID is required"));
    };
    let session_id = session_id(raw_id)?;
    let created_at = timestamp("createdAt", request.created_at)?;

    state
        .tracking
        .create_session(&session_id, created_at)
        .await
        .map_err(ApiError::internal("Failed to create initial session"))?;

    Ok(success("Initial session created successfully", &session_id, &[]))
}

pub async fn save_email(
    State(state): State<AppState>,
    payload: Result<Json<SaveEmailRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let (Some(email), Some(raw_id)) = (present(request.email), present(request.session_id)) else {
        return Err(ApiError::bad_request("Email and session ID are required"));
    };
    let session_id = session_id(raw_id)?;
    let now = state.tracking.now();
    let created_at = timestamp("createdAt", request.created_at)?.unwrap_or(now);
    let submitted_at = timestamp("submittedAt", request.submitted_at)?.unwrap_or(now);

    let save = SessionSave {
        session_id,
        email: email.trim().to_owned(),
        name: present(request.name).map(|n| n.trim().to_owned()),
        quiz_answers: request.quiz_answers.unwrap_or_default(),
        privacy_consent: request.privacy_consent.unwrap_or(false),
        marketing_consent: request.marketing_consent.unwrap_or(false),
        created_at,
        submitted_at,
        is_lead: lead_status(request.is_lead)?,
        drop_off_page: present(request.drop_off_page),
    };

    state
        .tracking
        .save_session(&save)
        .await
        .map_err(ApiError::internal("Failed to save email"))?;
    tracing::info!(session_id = %save.session_id, answers = save.quiz_answers.len(), "email saved");

    Ok(success("Email saved successfully", &save.session_id, &[]))
}

pub async fn update_drop_off(
    State(state): State<AppState>,
    payload: Result<Json<DropOffRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let (Some(raw_id), Some(page)) = (present(request.session_id), present(request.drop_off_page))
    else {
        return Err(ApiError::bad_request(
            "Session ID and drop-off page are required",
        ));
    };
    let session_id = session_id(raw_id)?;

    state
        .tracking
        .update_drop_off(&session_id, &page)
        .await
        .map_err(ApiError::internal("Failed to update drop-off page"))?;

    Ok(success(
        "Drop-off page updated successfully",
        &session_id,
        &[("dropOffPage", Value::String(page))],
    ))
}

pub async fn update_lead(
    State(state): State<AppState>,
    payload: Result<Json<UpdateLeadRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let Some(raw_id) = present(request.session_id) else {
        return Err(ApiError::bad_request("Session ID is required"));
    };
    let session_id = session_id(raw_id)?;

    // A session without a row still answers 200; the service logs the miss.
    state
        .tracking
        .mark_lead(&session_id)
        .await
        .map_err(ApiError::internal("Failed to update lead status"))?;

    Ok(success(
        "Lead status updated successfully",
        &session_id,
        &[("isLead", LeadStatus::Yes.as_str().into())],
    ))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": iso_timestamp(Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_count_as_missing() {
        assert_eq!(present(Some("   ".into())), None);
        assert_eq!(present(None), None);
        assert_eq!(present(Some(" s1".into())), Some(" s1".into()));
    }

    #[test]
    fn timestamps_parse_or_reject() {
        assert_eq!(timestamp("createdAt", Some(String::new())).unwrap(), None);
        assert!(
            timestamp("createdAt", Some("2024-01-01T00:00:00.000Z".into()))
                .unwrap()
                .is_some()
        );
        let err = timestamp("createdAt", Some("yesterday".into())).unwrap_err();
        assert!(err.to_string().contains("Invalid createdAt timestamp"));
    }

    #[test]
    fn lead_flag_accepts_letters_only() {
        assert_eq!(lead_status(Some("Y".into())).unwrap(), Some(LeadStatus::Yes));
        assert_eq!(lead_status(None).unwrap(), None);
        assert!(lead_status(Some("maybe".into())).is_err());
    }

    #[test]
    fn success_body_echoes_extra_fields() {
        let id = SessionId::new("s1").unwrap();
        let Json(body) = success("ok", &id, &[("dropOffPage", "email".into())]);
        assert_eq!(body["success"], true);
        assert_eq!(body["sessionId"], "s1");
        assert_eq!(body["dropOffPage"], "email");
        assert!(body["timestamp"].is_string());
    }
}
