use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::SqliteInitError;

/// Columns of the current `submissions` layout, in table order.
const SUBMISSION_COLUMNS: [&str; 12] = [
    "id",
    "session_id",
    "email",
    "name",
    "quiz_answers",
    "privacy_consent",
    "marketing_consent",
    "created_at",
    "submitted_at",
    "is_lead",
    "drop_off_page",
    "created_timestamp",
];

fn submissions_table_sql(table: &str) -> String {
    format!(
        r"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL UNIQUE,
            email TEXT,
            name TEXT,
            quiz_answers TEXT,
            privacy_consent INTEGER DEFAULT 0,
            marketing_consent INTEGER DEFAULT 0,
            created_at TEXT NOT NULL,
            submitted_at TEXT,
            is_lead TEXT DEFAULT 'N',
            drop_off_page TEXT DEFAULT 'quiz_start',
            created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "
    )
}

struct ColumnInfo {
    name: String,
    not_null: bool,
}

async fn table_columns(pool: &SqlitePool) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows = sqlx::query("PRAGMA table_info(submissions)")
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| {
            Ok(ColumnInfo {
                name: row.try_get("name")?,
                not_null: row.try_get::<i64, _>("notnull")? == 1,
            })
        })
        .collect()
}

/// Adds a column that older databases lack, backfilling existing rows.
///
/// A "duplicate column name" failure means another process got there first.
async fn add_column(
    pool: &SqlitePool,
    column: &str,
    definition: &str,
    backfill: Option<&str>,
) -> Result<(), sqlx::Error> {
    let alter = format!("ALTER TABLE submissions ADD COLUMN {column} {definition}");
    match sqlx::query(&alter).execute(pool).await {
        Ok(_) => tracing::info!(column, "added missing submissions column"),
        Err(err) if err.to_string().contains("duplicate column name") => {
            tracing::debug!(column, "column already present");
            return Ok(());
        }
        Err(err) => return Err(err),
    }
    if let Some(value) = backfill {
        let update = format!("UPDATE submissions SET {column} = ?1 WHERE {column} IS NULL");
        sqlx::query(&update).bind(value).execute(pool).await?;
    }
    Ok(())
}

/// Brings any earlier `submissions` layout up to the current schema.
///
/// Safe to run on every start: each step checks the live schema first.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: current table, plus the columns added after the first release.
    if !is_applied(pool, 1).await? {
        sqlx::query(&submissions_table_sql("submissions"))
            .execute(pool)
            .await?;
        mark_applied(pool, 1).await?;
    }

    let columns = table_columns(pool).await?;
    let has = |name: &str| columns.iter().any(|c| c.name == name);
    if !has("name") {
        add_column(pool, "name", "TEXT", None).await?;
    }
    if !has("is_lead") {
        add_column(pool, "is_lead", "TEXT DEFAULT 'N'", Some("N")).await?;
    }
    if !has("drop_off_page") {
        add_column(pool, "drop_off_page", "TEXT DEFAULT 'quiz_start'", Some("quiz_start"))
            .await?;
    }

    // Version 2: rebuild tables whose shape cannot be altered in place
    // (NOT NULL email, or no server insert timestamp).
    if !is_applied(pool, 2).await? {
        let columns = table_columns(pool).await?;
        let email_required = columns.iter().any(|c| c.name == "email" && c.not_null);
        let missing_timestamp = !columns.iter().any(|c| c.name == "created_timestamp");
        if email_required || missing_timestamp {
            rebuild_submissions(pool, &columns).await?;
        } else {
            mark_applied(pool, 2).await?;
        }
    }

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_session_id ON submissions(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_email ON submissions(email)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_session_id_unique ON submissions(session_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

async fn mark_applied(pool: &SqlitePool, version: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Copies every row into a freshly created table with the current layout.
///
/// Only columns present in the legacy table are copied; the rest take defaults.
async fn rebuild_submissions(
    pool: &SqlitePool,
    legacy: &[ColumnInfo],
) -> Result<(), sqlx::Error> {
    let copied: Vec<&str> = SUBMISSION_COLUMNS
        .into_iter()
        .filter(|col| legacy.iter().any(|c| c.name == *col))
        .collect();
    let select: Vec<String> = copied
        .iter()
        .map(|col| match *col {
            "is_lead" => "COALESCE(is_lead, 'N')".to_owned(),
            "drop_off_page" => "COALESCE(drop_off_page, 'quiz_start')".to_owned(),
            other => other.to_owned(),
        })
        .collect();

    let mut tx = pool.begin().await?;
    sqlx::query("DROP TABLE IF EXISTS submissions_new")
        .execute(&mut *tx)
        .await?;
    sqlx::query(&submissions_table_sql("submissions_new"))
        .execute(&mut *tx)
        .await?;
    let copy = format!(
        "INSERT INTO submissions_new ({}) SELECT {} FROM submissions",
        copied.join(", "),
        select.join(", ")
    );
    let copied_rows = sqlx::query(&copy).execute(&mut *tx).await?.rows_affected();
    sqlx::query("DROP TABLE submissions")
        .execute(&mut *tx)
        .await?;
    sqlx::query("ALTER TABLE submissions_new RENAME TO submissions")
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(2_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(rows = copied_rows, "rebuilt submissions table");
    Ok(())
}
