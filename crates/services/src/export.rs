//! Spreadsheet export of every stored session.
//!
//! Written as CSV so any spreadsheet tool opens it. One `Quiz Q<key>` column is
//! added per answer key seen in any row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use funnel_core::model::{SessionRecord, compare_question_keys};
use funnel_core::time::iso_timestamp;
use storage::repository::SubmissionStats;

use crate::error::ExportError;
use crate::tracking::TrackingService;

pub const BASE_COLUMNS: [&str; 10] = [
    "Session ID",
    "Email",
    "Name",
    "Privacy Consent",
    "Marketing Consent",
    "Is Lead",
    "Drop-off Page",
    "Created At",
    "Submitted At",
    "Created Timestamp",
];

const QUIZ_COLUMN_PREFIX: &str = "Quiz Q";

/// What an export run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Every answer key across `records`, in question order.
#[must_use]
pub fn quiz_keys(records: &[SessionRecord]) -> Vec<String> {
    let mut keys: Vec<String> = records
        .iter()
        .flat_map(|r| r.quiz_answers.keys().map(str::to_owned))
        .collect();
    keys.sort_by(|a, b| compare_question_keys(a, b));
    keys.dedup();
    keys
}

#[must_use]
pub fn export_columns(quiz_keys: &[String]) -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .map(|c| (*c).to_owned())
        .chain(quiz_keys.iter().map(|k| format!("{QUIZ_COLUMN_PREFIX}{k}")))
        .collect()
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn row_cells(record: &SessionRecord, quiz_keys: &[String]) -> Vec<String> {
    let mut cells = vec![
        record.session_id.to_string(),
        record.email.clone().unwrap_or_default(),
        record.name.clone().unwrap_or_default(),
        yes_no(record.privacy_consent).to_owned(),
        yes_no(record.marketing_consent).to_owned(),
        record.is_lead.as_str().to_owned(),
        record.drop_off_page.clone(),
        iso_timestamp(record.created_at),
        record.submitted_at.map(iso_timestamp).unwrap_or_default(),
        record.created_timestamp.map(iso_timestamp).unwrap_or_default(),
    ];
    cells.extend(quiz_keys.iter().map(|key| {
        record
            .quiz_answers
            .get(key)
            .map(|v| v.display())
            .unwrap_or_default()
    }));
    cells
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_owned()
    }
}

fn write_line<W: Write>(out: &mut W, cells: &[String]) -> std::io::Result<()> {
    let line: Vec<String> = cells.iter().map(|c| csv_field(c)).collect();
    writeln!(out, "{}", line.join(","))
}

/// Writes `records` as CSV: a header line, then one line per record.
///
/// # Errors
///
/// Returns any I/O error from `out`.
pub fn write_csv<W: Write>(
    records: &[SessionRecord],
    out: &mut W,
) -> std::io::Result<ExportSummary> {
    let keys = quiz_keys(records);
    let columns = export_columns(&keys);
    write_line(out, &columns)?;
    for record in records {
        write_line(out, &row_cells(record, &keys))?;
    }
    out.flush()?;
    Ok(ExportSummary {
        rows: records.len(),
        columns,
    })
}

/// Reads every session (newest first) and writes the spreadsheet to `path`.
///
/// # Errors
///
/// Returns `ExportError::Tracking` if rows cannot be read and
/// `ExportError::Io` if the file cannot be written.
pub async fn export_submissions(
    tracking: &TrackingService,
    path: &Path,
) -> Result<ExportSummary, ExportError> {
    let records = tracking.list_submissions().await?;
    let mut out = BufWriter::new(File::create(path)?);
    let summary = write_csv(&records, &mut out)?;
    tracing::info!(rows = summary.rows, path = %path.display(), "exported submissions");
    Ok(summary)
}

/// Human-readable summary: totals and ratios, the leads, then every record.
#[must_use]
pub fn render_report(stats: &SubmissionStats, records: &[SessionRecord]) -> String {
    let ratio = |part: u64| format!("{part}/{} ({:.1}%)", stats.total, stats.percent(part));
    let mut out = String::new();
    out.push_str("Summary Statistics\n");
    out.push_str(&format!("  Total Submissions: {}\n", stats.total));
    out.push_str(&format!("  Unique Emails: {}\n", stats.unique_emails));
    out.push_str(&format!("  Privacy Consent: {}\n", ratio(stats.privacy_consents)));
    out.push_str(&format!("  Marketing Consent: {}\n", ratio(stats.marketing_consents)));
    out.push_str(&format!("  Leads: {}\n", ratio(stats.leads)));
    out.push_str(&format!("  Non-Leads: {}\n", ratio(stats.non_leads)));

    let leads: Vec<&SessionRecord> = records.iter().filter(|r| r.is_lead.is_lead()).collect();
    if !leads.is_empty() {
        out.push_str("\nLeads\n");
        for (index, lead) in leads.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} ({}) - {}\n",
                index + 1,
                lead.email.as_deref().unwrap_or("no email"),
                lead.name.as_deref().unwrap_or("No name"),
                iso_timestamp(lead.created_at),
            ));
        }
    }

    if !records.is_empty() {
        out.push_str("\nAll Records\n");
        for (index, record) in records.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} {} ({}) lead={} page={} at {}\n",
                index + 1,
                record.session_id,
                record.email.as_deref().unwrap_or("no email"),
                record.name.as_deref().unwrap_or("No name"),
                record.is_lead.as_str(),
                record.drop_off_page,
                iso_timestamp(record.created_at),
            ));
            for (key, value) in record.quiz_answers.ordered() {
                out.push_str(&format!("     Q{key}: {}\n", value.display()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::model::{LeadStatus, QuizAnswers, SessionId};
    use funnel_core::time::fixed_now;

    fn record(id: &str, answers: QuizAnswers) -> SessionRecord {
        let mut record = SessionRecord::initial(1, SessionId::new(id).unwrap(), fixed_now());
        record.quiz_answers = answers;
        record
    }

    #[test]
    fn columns_follow_base_then_sorted_quiz_keys() {
        let mut a = QuizAnswers::new();
        a.record(10, "x");
        a.record(2, "y");
        let mut b = QuizAnswers::new();
        b.record(2, "z");
        b.insert("bonus", "w");
        let keys = quiz_keys(&[record("s1", a), record("s2", b)]);
        assert_eq!(keys, vec!["2", "10", "bonus"]);

        let columns = export_columns(&keys);
        assert_eq!(columns.len(), BASE_COLUMNS.len() + 3);
        assert_eq!(columns[0], "Session ID");
        assert_eq!(columns[8], "Submitted At");
        assert_eq!(columns[9], "Created Timestamp");
        assert_eq!(&columns[10..], ["Quiz Q2", "Quiz Q10", "Quiz Qbonus"]);
    }

    #[test]
    fn rows_join_choices_and_quote_commas() {
        let mut answers = QuizAnswers::new();
        answers.record(0, "25-34");
        answers.record(18, vec!["salt".to_owned(), "sugar".to_owned()]);
        let mut row = record("s1", answers);
        row.email = Some("a@b.com".into());
        row.privacy_consent = true;
        row.is_lead = LeadStatus::Yes;

        let mut out = Vec::new();
        let summary = write_csv(&[row, record("s2", QuizAnswers::new())], &mut out).unwrap();
        assert_eq!(summary.rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("Submitted At,Created Timestamp,Quiz Q0,Quiz Q18"));
        assert_eq!(
            lines[1],
            "s1,a@b.com,,Yes,No,Y,quiz_start,2023-11-14T22:13:20.000Z,,2023-11-14T22:13:20.000Z,25-34,\"salt, sugar\""
        );
        assert!(lines[2].starts_with("s2,,,No,No,N,quiz_start,"));
        assert!(lines[2].ends_with(",,"));
    }

    #[test]
    fn report_lists_leads_with_ratios() {
        let mut lead = record("s1", QuizAnswers::new());
        lead.email = Some("a@b.com".into());
        lead.is_lead = LeadStatus::Yes;
        let stats = SubmissionStats {
            total: 4,
            unique_emails: 1,
            privacy_consents: 1,
            marketing_consents: 0,
            leads: 1,
            non_leads: 3,
        };
        let report = render_report(&stats, &[lead]);
        assert!(report.contains("Leads: 1/4 (25.0%)"));
        assert!(report.contains("1. a@b.com (No name)"));
    }

    #[test]
    fn report_lists_every_record_with_its_answers() {
        let mut answers = QuizAnswers::new();
        answers.record(10, "daily");
        answers.record(2, vec!["tea".to_owned(), "coffee".to_owned()]);
        let mut visitor = record("s1", answers);
        visitor.drop_off_page = "question_11".into();
        let mut legacy = record("s2", QuizAnswers::new());
        legacy.created_timestamp = None;
        let stats = SubmissionStats {
            total: 2,
            non_leads: 2,
            ..SubmissionStats::default()
        };

        let report = render_report(&stats, &[visitor, legacy]);
        let section = report.split("All Records\n").nth(1).unwrap();
        let lines: Vec<&str> = section.lines().collect();
        assert_eq!(
            lines,
            vec![
                "  1. s1 no email (No name) lead=N page=question_11 at 2023-11-14T22:13:20.000Z",
                "     Q2: tea, coffee",
                "     Q10: daily",
                "  2. s2 no email (No name) lead=N page=quiz_start at 2023-11-14T22:13:20.000Z",
            ]
        );
        assert!(!report.contains("\nLeads\n"));
    }
}
