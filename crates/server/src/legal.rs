//! Static legal documents served as plain text from one directory.

use std::path::{Path, PathBuf};

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::AppState;
use crate::error::ApiError;

pub const MONEYBACK_SLUG: &str = "moneyback";
pub const MONEYBACK_FILE: &str = "side_bar_money_back_guarantee.txt";

const MAX_SLUG_LEN: usize = 64;

/// Maps a document slug onto its file, or `None` when the slug is malformed.
///
/// Only `[a-z0-9_-]` is accepted, so a slug can never leave `dir`.
#[must_use]
pub fn resolve_doc(dir: &Path, slug: &str) -> Option<PathBuf> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if !valid {
        return None;
    }
    let file = if slug == MONEYBACK_SLUG {
        MONEYBACK_FILE.to_owned()
    } else {
        format!("{slug}.txt")
    };
    Some(dir.join(file))
}

pub async fn legal_doc(
    State(state): State<AppState>,
    UrlPath(doc): UrlPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let not_found = ApiError::NotFound("File not found");
    let Some(path) = resolve_doc(&state.legal_dir, &doc) else {
        tracing::debug!(doc, "rejected legal doc slug");
        return Err(not_found);
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "legal doc unavailable");
            Err(not_found)
        }
    }
}
