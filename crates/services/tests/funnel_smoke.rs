use std::sync::Arc;

use funnel_core::flow::{FlowEvent, QuizFlow, Screen};
use funnel_core::model::LeadStatus;
use funnel_core::time::fixed_now;
use services::{
    AppServices, Clock, FunnelSession, MemoryTabStorage, SessionIdentity, export_submissions,
};

async fn answer_until(funnel: &mut FunnelSession, target: Screen) {
    while funnel.screen() != target {
        let event = match funnel.screen() {
            Screen::Question if funnel.flow().is_multi_select() => {
                funnel
                    .apply(FlowEvent::ToggleOption("ChatGPT".into()))
                    .await
                    .unwrap();
                FlowEvent::ContinueMulti
            }
            Screen::Question => {
                FlowEvent::SelectOption(format!("answer {}", funnel.flow().state().question()))
            }
            _ => FlowEvent::Continue,
        };
        funnel.apply(event).await.unwrap();
    }
}

#[tokio::test]
async fn full_funnel_lands_in_sqlite_and_export() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_services_funnel?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
    )
    .await
    .expect("services");
    let tracking = services.tracking();

    let identity =
        SessionIdentity::new(Clock::fixed(fixed_now()), Arc::new(MemoryTabStorage::new()));
    let mut funnel = FunnelSession::new(QuizFlow::default(), &identity, tracking.clone());

    funnel.apply(FlowEvent::Start).await.unwrap();
    answer_until(&mut funnel, Screen::Email).await;
    funnel
        .apply(FlowEvent::SubmitEmail {
            email: "a@b.com".into(),
            privacy_consent: true,
            marketing_consent: true,
        })
        .await
        .unwrap();
    let step = funnel
        .apply(FlowEvent::SubmitName("Ada".into()))
        .await
        .unwrap();
    assert_eq!(step.failed, 0);
    funnel.apply(FlowEvent::Continue).await.unwrap();
    funnel.apply(FlowEvent::GetMyPlan).await.unwrap();

    let rows = tracking.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(&row.session_id, funnel.session_id());
    assert_eq!(row.email.as_deref(), Some("a@b.com"));
    assert_eq!(row.name.as_deref(), Some("Ada"));
    assert_eq!(row.quiz_answers.len(), 20);
    assert_eq!(row.is_lead, LeadStatus::Yes);
    assert_eq!(row.drop_off_page, "selling_page");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("submissions.csv");
    let summary = export_submissions(&tracking, &path).await.unwrap();
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.columns.len(), 10 + 20);
    assert_eq!(summary.columns.last().map(String::as_str), Some("Quiz Q19"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("ChatGPT"));
    assert_eq!(text.lines().count(), 2);
}
