//! Form parameters and their validation.
//!
//! All parameters arrive as optional strings so that a missing field is
//! reported with the same 400 message as a malformed one, rather than as
//! an extractor rejection.

use axum::extract::rejection::FormRejection;
use axum::Form;
use serde::Deserialize;

use crate::http::response::ApiError;

/// Longest search query sent to the backend, in characters.
pub const MAX_QUERY_CHARS: usize = 100;

/// Result of extracting a form body; see [`form_or_default`].
pub type FormResult<T> = Result<Form<T>, FormRejection>;

/// Treat an absent or unreadable form as an empty one.
///
/// Validation then reports the missing field with its usual message.
pub fn form_or_default<T: Default>(form: FormResult<T>) -> T {
    match form {
        Ok(Form(inner)) => inner,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Form body not usable, treating as empty");
            T::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SeekForm {
    pub position: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VolumeForm {
    pub volume: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UriForm {
    pub uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PositionForm {
    pub position: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Digits with at most one decimal point, and at least one digit.
fn is_unsigned_decimal(raw: &str) -> bool {
    let mut digits = 0;
    let mut dots = 0;
    for ch in raw.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn is_unsigned_integer(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// MPD ends a command at the first line break.
fn has_line_break(raw: &str) -> bool {
    raw.contains(|c: char| c == '\n' || c == '\r')
}

/// Seek offset in seconds.
pub fn seek_position(raw: Option<&str>) -> Result<f64, ApiError> {
    const INVALID: ApiError = ApiError::BadRequest("Invalid position value");

    match raw.filter(|raw| is_unsigned_decimal(raw)).map(str::parse::<f64>) {
        Some(Ok(position)) if position.is_finite() => Ok(position),
        _ => Err(INVALID),
    }
}

/// Song id for `seekid`. Anything that is not a plain number is ignored.
pub fn song_id(raw: Option<&str>) -> Option<u32> {
    raw.filter(|raw| is_unsigned_integer(raw))
        .and_then(|raw| raw.parse().ok())
}

/// Volume percentage, 0 to 100 inclusive.
pub fn volume(raw: Option<&str>) -> Result<u8, ApiError> {
    const INVALID: ApiError = ApiError::BadRequest("Invalid volume value");

    let raw = raw.filter(|raw| is_unsigned_integer(raw)).ok_or(INVALID)?;
    match raw.parse::<u8>() {
        Ok(volume) if volume <= 100 => Ok(volume),
        _ => Err(INVALID),
    }
}

/// Track URI for `add`.
///
/// Rejects parent-directory segments, absolute paths and line breaks.
pub fn uri(raw: Option<&str>) -> Result<String, ApiError> {
    let raw = raw
        .filter(|raw| !raw.is_empty())
        .ok_or(ApiError::BadRequest("URI is required"))?;

    if raw.contains("../") || raw.starts_with('/') || has_line_break(raw) {
        return Err(ApiError::BadRequest("Invalid URI format"));
    }
    Ok(raw.to_string())
}

/// Zero-based playlist position.
pub fn playlist_position(raw: Option<&str>) -> Result<u32, ApiError> {
    const INVALID: ApiError = ApiError::BadRequest("Invalid position");

    raw.filter(|raw| is_unsigned_integer(raw))
        .and_then(|raw| raw.parse().ok())
        .ok_or(INVALID)
}

/// Search text, truncated. `None` means there is nothing to search for.
pub fn search_query(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    match raw.filter(|raw| !raw.is_empty()) {
        Some(raw) if has_line_break(raw) => Err(ApiError::BadRequest("Invalid search query")),
        Some(raw) => Ok(Some(raw.chars().take(MAX_QUERY_CHARS).collect())),
        None => Ok(None),
    }
}
