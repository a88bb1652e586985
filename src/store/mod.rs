pub mod pool;
pub mod postgres;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::pipeline::TimeWindow;

pub use pool::create_pool;
pub use postgres::{PgRecordStore, TableName};

/// One captive-portal registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub date: DateTime<Utc>,
    pub email: String,
    /// Client MAC address reported by the portal.
    pub client_id: Option<String>,
    pub access_point: Option<String>,
    pub ssid: Option<String>,
}

/// Keyset position of the last record returned in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub date: DateTime<Utc>,
    pub seq: i64,
}

#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub items: Vec<RecordEntry>,
    /// `None` once the range is exhausted.
    pub next: Option<Cursor>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("record {record} is missing `{field}`")]
    MalformedRecord { record: String, field: &'static str },

    #[error("pagination failed: {0}")]
    Pagination(String),

    #[error("invalid table name: {0}")]
    InvalidTable(String),
}

/// Range queries over the `date` attribute of registration records.
///
/// Implementations return at most `limit` items per call, in a stable order,
/// and a continuation cursor whenever more items remain. Both window bounds
/// are inclusive.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn query_page(
        &self,
        window: &TimeWindow,
        after: Option<&Cursor>,
        limit: u32,
    ) -> Result<RecordPage, StoreError>;
}

/// Splits a `limit + 1` fetch into the page to return and its continuation.
///
/// The extra row only signals that more remain; the cursor points at the last
/// row kept so the next page starts right after it.
pub(crate) fn split_page<R>(
    mut rows: Vec<R>,
    limit: u32,
    cursor_of: impl Fn(&R) -> Cursor,
) -> Result<(Vec<R>, Option<Cursor>), StoreError> {
    if limit == 0 {
        return Err(StoreError::Pagination("page limit must be greater than zero".into()));
    }

    let limit = limit as usize;
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    let next = if has_more { rows.last().map(cursor_of) } else { None };

    Ok((rows, next))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn rows(n: i64) -> Vec<(DateTime<Utc>, i64)> {
        let base = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        (0..n).map(|seq| (base + Duration::minutes(seq), seq)).collect()
    }

    fn cursor(row: &(DateTime<Utc>, i64)) -> Cursor {
        Cursor {
            date: row.0,
            seq: row.1,
        }
    }

    #[test]
    fn test_exactly_full_page_has_no_cursor() {
        let (items, next) = split_page(rows(3), 3, cursor).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(next, None);
    }

    #[test]
    fn test_extra_row_yields_cursor_at_last_kept_row() {
        let fetched = rows(4);
        let expected = cursor(&fetched[2]);

        let (items, next) = split_page(fetched, 3, cursor).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items.last().map(|r| r.1), Some(2));
        assert_eq!(next, Some(expected));
    }

    #[test]
    fn test_short_page_has_no_cursor() {
        let (items, next) = split_page(rows(2), 3, cursor).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(next, None);
    }

    #[test]
    fn test_empty_fetch_is_exhausted() {
        let (items, next) = split_page(rows(0), 3, cursor).unwrap();
        assert!(items.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let err = split_page(rows(1), 0, cursor).unwrap_err();
        assert!(matches!(err, StoreError::Pagination(_)));
    }
}
