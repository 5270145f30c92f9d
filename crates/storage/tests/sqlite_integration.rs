use chrono::Duration;
use funnel_core::model::{AnswerValue, LeadStatus, QuizAnswers, SessionId, SessionSave, SubmissionDraft};
use funnel_core::time::fixed_now;
use storage::repository::SubmissionRepository;
use storage::sqlite::SqliteRepository;

async fn open(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn sid(raw: &str) -> SessionId {
    SessionId::new(raw).unwrap()
}

fn save(id: &SessionId, answers: QuizAnswers) -> SessionSave {
    SessionSave::from_draft(
        id.clone(),
        SubmissionDraft {
            email: "a@b.com".to_owned(),
            name: Some("Ada".to_owned()),
            quiz_answers: answers,
            privacy_consent: true,
            marketing_consent: false,
        },
        fixed_now(),
        fixed_now() + Duration::minutes(4),
    )
}

#[tokio::test]
async fn create_twice_leaves_one_row() {
    let repo = open("memdb_create_twice").await;
    let id = sid("session_1_abc");
    assert!(repo.create_initial_session(&id, fixed_now()).await.unwrap());
    assert!(!repo.create_initial_session(&id, fixed_now()).await.unwrap());

    let rows = repo.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.session_id, id);
    assert_eq!(row.email, None);
    assert_eq!(row.is_lead, LeadStatus::No);
    assert_eq!(row.drop_off_page, "quiz_start");
    assert_eq!(row.created_at, fixed_now());
    assert!(row.quiz_answers.is_empty());
}

#[tokio::test]
async fn drop_off_upserts_and_lead_skips_missing_rows() {
    let repo = open("memdb_partial_updates").await;
    repo.update_drop_off_page(&sid("s1"), "question_3", fixed_now())
        .await
        .unwrap();
    assert!(!repo
        .update_lead_status(&sid("missing"), LeadStatus::Yes)
        .await
        .unwrap());

    let rows = repo.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].drop_off_page, "question_3");

    repo.update_drop_off_page(&sid("s1"), "teaser_page", fixed_now())
        .await
        .unwrap();
    let rows = repo.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].drop_off_page, "teaser_page");
}

#[tokio::test]
async fn tracking_scenario_keeps_lead_and_drop_off() {
    let repo = open("memdb_scenario").await;
    let id = sid("s1");
    repo.create_initial_session(&id, fixed_now()).await.unwrap();
    repo.update_drop_off_page(&id, "question_3", fixed_now())
        .await
        .unwrap();
    assert!(repo.update_lead_status(&id, LeadStatus::Yes).await.unwrap());
    repo.save_session(&save(&id, QuizAnswers::new())).await.unwrap();

    let row = repo.list_submissions().await.unwrap().remove(0);
    assert_eq!(row.drop_off_page, "question_3");
    assert_eq!(row.email.as_deref(), Some("a@b.com"));
    assert_eq!(row.name.as_deref(), Some("Ada"));
    assert_eq!(row.is_lead, LeadStatus::Yes);
    assert!(row.privacy_consent);
    assert!(!row.marketing_consent);
    assert_eq!(row.submitted_at, Some(fixed_now() + Duration::minutes(4)));
}

#[tokio::test]
async fn answers_round_trip_exactly() {
    let repo = open("memdb_answers").await;
    let id = sid("s1");
    let mut answers = QuizAnswers::new();
    answers.record(0, "25-34");
    answers.record(4, "some text");
    answers.record(18, vec!["salt".to_owned(), "sugar".to_owned()]);
    repo.save_session(&save(&id, answers.clone())).await.unwrap();

    let row = repo.list_submissions().await.unwrap().remove(0);
    assert_eq!(row.quiz_answers, answers);
    assert_eq!(
        row.quiz_answers.get("18"),
        Some(&AnswerValue::Choices(vec!["salt".into(), "sugar".into()]))
    );
}

#[tokio::test]
async fn explicit_lead_and_page_on_save_win() {
    let repo = open("memdb_save_overrides").await;
    let id = sid("s1");
    let mut full = save(&id, QuizAnswers::new());
    full.is_lead = Some(LeadStatus::Yes);
    full.drop_off_page = Some("selling_page".to_owned());
    repo.save_session(&full).await.unwrap();

    let row = repo.list_submissions().await.unwrap().remove(0);
    assert_eq!(row.is_lead, LeadStatus::Yes);
    assert_eq!(row.drop_off_page, "selling_page");
}

#[tokio::test]
async fn corrupt_answers_read_as_empty() {
    let repo = open("memdb_corrupt").await;
    sqlx::query(
        "INSERT INTO submissions (session_id, created_at, quiz_answers) VALUES ('s1', ?1, '{broken')",
    )
    .bind("2023-11-14T22:13:20.000Z")
    .execute(repo.pool())
    .await
    .unwrap();

    let rows = repo.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].quiz_answers.is_empty());
}

#[tokio::test]
async fn listing_is_newest_first_with_stats() {
    let repo = open("memdb_listing").await;
    for raw in ["s1", "s2", "s3"] {
        repo.create_initial_session(&sid(raw), fixed_now()).await.unwrap();
    }
    repo.save_session(&save(&sid("s2"), QuizAnswers::new()))
        .await
        .unwrap();
    repo.update_lead_status(&sid("s2"), LeadStatus::Yes)
        .await
        .unwrap();

    let rows = repo.list_submissions().await.unwrap();
    let order: Vec<&str> = rows.iter().map(|r| r.session_id.as_str()).collect();
    assert_eq!(order, vec!["s3", "s2", "s1"]);

    let stats = repo.submission_stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.unique_emails, 1);
    assert_eq!(stats.privacy_consents, 1);
    assert_eq!(stats.leads, 1);
    assert_eq!(stats.non_leads, 2);
}

#[tokio::test]
async fn legacy_table_is_upgraded_in_place() {
    let url = "sqlite:file:memdb_legacy?mode=memory&cache=shared";
    let repo = SqliteRepository::connect(url).await.expect("connect");
    sqlx::query(
        r"
        CREATE TABLE submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            quiz_answers TEXT,
            privacy_consent INTEGER DEFAULT 0,
            marketing_consent INTEGER DEFAULT 0,
            created_at TEXT NOT NULL,
            submitted_at TEXT,
            created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        ",
    )
    .execute(repo.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"
        INSERT INTO submissions (session_id, email, quiz_answers, privacy_consent, created_at)
        VALUES ('old_1', 'x@y.com', '{"0":"18-24"}', 1, '2024-01-01T00:00:00.000Z'),
               ('old_2', 'z@y.com', '{}', 0, '2024-01-02T00:00:00.000Z')
        "#,
    )
    .execute(repo.pool())
    .await
    .unwrap();

    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate is a no-op");

    let rows = repo.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.is_lead, LeadStatus::No);
        assert_eq!(row.drop_off_page, "quiz_start");
        assert_eq!(row.name, None);
    }
    let old = rows.iter().find(|r| r.session_id.as_str() == "old_1").unwrap();
    assert_eq!(old.quiz_answers.get("0"), Some(&AnswerValue::Text("18-24".into())));
    assert!(old.privacy_consent);

    // email is nullable after the rebuild
    assert!(repo
        .create_initial_session(&sid("fresh"), fixed_now())
        .await
        .unwrap());
    assert_eq!(repo.list_submissions().await.unwrap().len(), 3);
}

#[tokio::test]
async fn rows_with_sqlite_style_timestamps_still_list() {
    let repo = open("memdb_legacy_timestamps").await;
    repo.create_initial_session(&sid("fresh"), fixed_now())
        .await
        .unwrap();
    sqlx::query(
        r"
        INSERT INTO submissions (session_id, created_at, submitted_at, created_timestamp)
        VALUES ('legacy', '2024-01-01 10:00:00', 'yesterday', '2024-01-01 10:00:05'),
               ('unreadable', 'last tuesday', NULL, '2024-01-02 08:30:00')
        ",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    let rows = repo.list_submissions().await.unwrap();
    assert_eq!(rows.len(), 3);

    let legacy = rows.iter().find(|r| r.session_id.as_str() == "legacy").unwrap();
    assert_eq!(legacy.created_at.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    assert_eq!(legacy.submitted_at, None);
    assert_eq!(
        legacy.created_timestamp.map(|t| t.to_rfc3339()).as_deref(),
        Some("2024-01-01T10:00:05+00:00")
    );

    // An unreadable client time falls back to the insert time.
    let unreadable = rows
        .iter()
        .find(|r| r.session_id.as_str() == "unreadable")
        .unwrap();
    assert_eq!(unreadable.created_at.to_rfc3339(), "2024-01-02T08:30:00+00:00");

    let fresh = rows.iter().find(|r| r.session_id.as_str() == "fresh").unwrap();
    assert_eq!(fresh.created_at, fixed_now());
    assert!(fresh.created_timestamp.is_some());
}
