use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use funnel_core::model::{QuizAnswers, SessionId, SubmissionDraft};
use funnel_core::time::iso_timestamp;
use reqwest::Client;
use serde::Serialize;

use crate::Clock;
use crate::error::TrackingError;
use crate::tracking::TrackingSink;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

/// Posts tracking events to the funnel HTTP endpoints, as the browser does.
#[derive(Clone)]
pub struct HttpTrackingClient {
    client: Client,
    base_url: String,
    clock: Clock,
}

impl HttpTrackingClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            clock,
        }
    }

    /// Base URL from `FUNNEL_API_URL`, falling back to the local server.
    #[must_use]
    pub fn from_env(clock: Clock) -> Self {
        let base_url = env::var("FUNNEL_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Self::new(base_url, clock)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), TrackingError> {
        let url = format!("{}/api/{path}", self.base_url.trim_end_matches('/'));
        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(TrackingError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingSink for HttpTrackingClient {
    async fn create_session(
        &self,
        session_id: &SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<(), TrackingError> {
        let body = CreateSessionBody {
            session_id: session_id.as_str(),
            created_at: iso_timestamp(created_at),
        };
        self.post("create-session", &body).await
    }

    async fn update_drop_off(
        &self,
        session_id: &SessionId,
        page: &str,
    ) -> Result<(), TrackingError> {
        let body = DropOffBody {
            session_id: session_id.as_str(),
            drop_off_page: page,
        };
        self.post("update-dropoff", &body).await
    }

    async fn mark_lead(&self, session_id: &SessionId) -> Result<(), TrackingError> {
        let body = LeadBody {
            session_id: session_id.as_str(),
        };
        self.post("update-lead", &body).await
    }

    async fn save_submission(
        &self,
        session_id: &SessionId,
        draft: &SubmissionDraft,
        created_at: DateTime<Utc>,
    ) -> Result<(), TrackingError> {
        let body = SaveEmailBody {
            email: &draft.email,
            name: draft.name.as_deref(),
            session_id: session_id.as_str(),
            quiz_answers: &draft.quiz_answers,
            privacy_consent: draft.privacy_consent,
            marketing_consent: draft.marketing_consent,
            created_at: iso_timestamp(created_at),
            submitted_at: iso_timestamp(self.clock.now()),
        };
        self.post("save-email", &body).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody<'a> {
    session_id: &'a str,
    created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DropOffBody<'a> {
    session_id: &'a str,
    drop_off_page: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeadBody<'a> {
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveEmailBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    session_id: &'a str,
    quiz_answers: &'a QuizAnswers,
    privacy_consent: bool,
    marketing_consent: bool,
    created_at: String,
    submitted_at: String,
}
