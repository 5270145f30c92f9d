use std::sync::Arc;

use funnel_core::flow::{FlowError, FlowEvent, QuizFlow, Screen};
use services::{Clock, FunnelSession, MemoryTabStorage, SessionIdentity, TrackingSink};

/// Upper bound on events in one walk; a valid flow finishes far below it.
const MAX_EVENTS: usize = 1_000;

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_NAME: &str = "Demo Visitor";

/// Walks one visitor from landing to "Get My Plan", printing every screen.
///
/// Returns the number of tracking calls the sink rejected.
pub async fn walk(
    flow: QuizFlow,
    clock: Clock,
    sink: Arc<dyn TrackingSink>,
) -> Result<usize, FlowError> {
    let identity = SessionIdentity::new(clock, Arc::new(MemoryTabStorage::new()));
    let mut funnel = FunnelSession::new(flow, &identity, sink);
    println!("session {}", funnel.session_id());

    let mut failed = funnel.apply(FlowEvent::Start).await?.failed;
    for _ in 0..MAX_EVENTS {
        let screen = funnel.screen();
        let question = funnel.flow().state().question();
        println!("  {}", funnel.flow().state().drop_off_label());

        let event = match screen {
            Screen::Question if funnel.flow().is_multi_select() => {
                failed += funnel
                    .apply(FlowEvent::ToggleOption(format!("option {question}")))
                    .await?
                    .failed;
                FlowEvent::ContinueMulti
            }
            Screen::Question => FlowEvent::SelectOption(format!("option {question}")),
            Screen::Email => FlowEvent::SubmitEmail {
                email: DEMO_EMAIL.into(),
                privacy_consent: true,
                marketing_consent: false,
            },
            Screen::Name => FlowEvent::SubmitName(DEMO_NAME.into()),
            Screen::Selling => {
                failed += funnel.apply(FlowEvent::GetMyPlan).await?.failed;
                println!("  lead marked");
                return Ok(failed);
            }
            _ => FlowEvent::Continue,
        };
        failed += funnel.apply(event).await?.failed;
    }
    tracing::warn!(max = MAX_EVENTS, "demo walk did not reach the selling page");
    Ok(failed)
}
