use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use funnel_core::flow::{FlowError, FlowEvent, QuizFlow, Screen, TrackingCommand};
use funnel_core::model::SessionId;

use crate::identity::SessionIdentity;
use crate::tracking::TrackingSink;

/// Outcome of one user event after its tracking calls went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelStep {
    pub screen: Screen,
    /// Every command dispatched for the event, in order.
    pub commands: Vec<TrackingCommand>,
    /// How many of them the sink rejected.
    pub failed: usize,
    pub advance_after: Option<Duration>,
}

/// One visitor walking the funnel: a flow controller wired to a tracking sink.
///
/// Tracking is best effort. A failed call is logged and the flow moves on;
/// a failed save still settles the busy screen.
pub struct FunnelSession {
    flow: QuizFlow,
    session_id: SessionId,
    created_at: DateTime<Utc>,
    sink: Arc<dyn TrackingSink>,
}

impl FunnelSession {
    #[must_use]
    pub fn new(flow: QuizFlow, identity: &SessionIdentity, sink: Arc<dyn TrackingSink>) -> Self {
        let meta = identity.metadata();
        Self {
            flow,
            session_id: meta.session_id,
            created_at: meta.created_at,
            sink,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn flow(&self) -> &QuizFlow {
        &self.flow
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.flow.screen()
    }

    /// Applies an event and dispatches the tracking it produced.
    ///
    /// # Errors
    ///
    /// Returns `FlowError` when the event is not valid on the current screen.
    /// Tracking failures never surface here.
    pub async fn apply(&mut self, event: FlowEvent) -> Result<FunnelStep, FlowError> {
        let output = self.flow.apply(event)?;
        let mut queue: VecDeque<TrackingCommand> = output.commands.into();
        let mut commands = Vec::with_capacity(queue.len());
        let mut failed = 0;

        while let Some(command) = queue.pop_front() {
            let saved = self.dispatch(&command).await;
            if !saved {
                failed += 1;
            }
            if matches!(command, TrackingCommand::SaveSubmission(_)) {
                let settled = self.flow.apply(FlowEvent::SubmissionSettled { saved })?;
                queue.extend(settled.commands);
            }
            commands.push(command);
        }

        Ok(FunnelStep {
            screen: self.flow.screen(),
            commands,
            failed,
            advance_after: output.advance_after,
        })
    }

    async fn dispatch(&self, command: &TrackingCommand) -> bool {
        let sid = &self.session_id;
        let (kind, result) = match command {
            TrackingCommand::CreateSession => (
                "create_session",
                self.sink.create_session(sid, self.created_at).await,
            ),
            TrackingCommand::UpdateDropOff(page) => {
                ("update_drop_off", self.sink.update_drop_off(sid, page).await)
            }
            TrackingCommand::MarkLead => ("mark_lead", self.sink.mark_lead(sid).await),
            TrackingCommand::SaveSubmission(draft) => (
                "save_submission",
                self.sink.save_submission(sid, draft, self.created_at).await,
            ),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(session_id = %sid, command = kind, error = %err, "tracking call failed");
                false
            }
        }
    }
}
