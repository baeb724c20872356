//! Opaque list cursors and the query continuation contract.
//!
//! A cursor is the URL-safe base64 of `{"sortValue": ..., "id": ...}`. The sort
//! value is the last item's sort field as a string; the id breaks ties.

use crate::core::errors::SplitifydError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub sort_value: String,
    pub id: String,
}

impl Cursor {
    pub fn new(sort_value: impl Into<String>, id: impl Into<String>) -> Self {
        Cursor {
            sort_value: sort_value.into(),
            id: id.into(),
        }
    }
}

pub fn encode_cursor(cursor: &Cursor) -> String {
    let payload = json!({ "sortValue": cursor.sort_value, "id": cursor.id }).to_string();
    base64_url::encode(&payload)
}

pub fn decode_cursor(raw: &str) -> Result<Cursor, SplitifydError> {
    let bytes = base64_url::decode(raw.trim())
        .map_err(|_| SplitifydError::InvalidCursorFormat("cursor is not valid base64".to_string()))?;
    serde_json::from_slice::<Cursor>(&bytes)
        .map_err(|e| SplitifydError::InvalidCursorFormat(format!("cursor payload is malformed: {}", e)))
}

/// Sort value for timestamp-ordered lists. Fixed-width UTC, so string order is time order.
pub fn timestamp_sort_value(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// A list query a store knows how to run.
pub trait PageableQuery: Sized {
    fn order_by(self, field: &str, direction: SortDirection) -> Self;
    fn limit(self, limit: usize) -> Self;
    fn start_after(self, sort_value: &str, id: &str) -> Self;
}

/// Orders and limits unconditionally; continues after `cursor` only when one is given.
pub fn apply_pagination<Q: PageableQuery>(
    query: Q,
    sort_field: &str,
    cursor: Option<&Cursor>,
    direction: SortDirection,
    limit: usize,
) -> Q {
    let query = query.order_by(sort_field, direction).limit(limit);
    match cursor {
        Some(cursor) => query.start_after(&cursor.sort_value, &cursor.id),
        None => query,
    }
}

/// Parses the `limit` query parameter; absent means `default`.
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> Result<usize, SplitifydError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| SplitifydError::InvalidQueryParams(format!("limit must be a number, got {:?}", raw)))?;
    if limit <= 0 || limit as u64 > max as u64 {
        return Err(SplitifydError::InvalidQueryParams(format!(
            "limit must be between 1 and {}",
            max
        )));
    }
    Ok(limit as usize)
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page from a query that fetched `limit + 1` rows.
    pub fn from_overfetch(mut items: Vec<T>, limit: usize, cursor_of: impl Fn(&T) -> Cursor) -> Self {
        let has_more = items.len() > limit;
        items.truncate(limit);
        let next_cursor = if has_more {
            items.last().map(|last| encode_cursor(&cursor_of(last)))
        } else {
            None
        };
        Page {
            items,
            has_more,
            next_cursor,
        }
    }
}
