use crate::error::AppError;
use crate::store::{Cursor, RecordEntry, RecordStore, StoreError};

use super::TimeWindow;

#[derive(Debug)]
pub struct RetrieveResult {
    pub records: Vec<RecordEntry>,
    pub pages: usize,
}

/// Fetches every record in `window`, following continuation cursors until
/// the store reports none.
#[tracing::instrument(
    name = "pipeline_stage retrieve",
    skip(store, window),
    fields(
        pipeline.stage = "retrieve",
        report.records,
        report.pages,
    )
)]
pub async fn retrieve(
    store: &dyn RecordStore,
    window: &TimeWindow,
    page_size: u32,
) -> Result<RetrieveResult, AppError> {
    if page_size == 0 {
        return Err(AppError::Config("store page size must be greater than zero".into()));
    }

    let mut records = Vec::new();
    let mut cursor: Option<Cursor> = None;
    let mut pages = 0usize;

    loop {
        let page = store.query_page(window, cursor.as_ref(), page_size).await?;
        pages += 1;
        records.extend(page.items);

        match page.next {
            Some(next) if cursor.as_ref() == Some(&next) => {
                return Err(StoreError::Pagination(format!(
                    "cursor did not advance past page {pages}"
                ))
                .into());
            }
            Some(next) => {
                tracing::debug!(page = pages, fetched = records.len(), "Following continuation");
                cursor = Some(next);
            }
            None => break,
        }
    }

    let span = tracing::Span::current();
    span.record("report.records", records.len());
    span.record("report.pages", pages);

    Ok(RetrieveResult { records, pages })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::store::RecordPage;
    use crate::testing::MemoryStore;

    fn window() -> TimeWindow {
        TimeWindow::lookback(Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap(), 7).unwrap()
    }

    #[tokio::test]
    async fn test_aggregates_every_page() {
        let window = window();
        let store = MemoryStore::new();
        for i in 0..25 {
            store.insert(window.end - Duration::hours(i), &format!("guest{i}@example.com"));
        }

        let result = retrieve(&store, &window, 10).await.unwrap();

        assert_eq!(result.records.len(), 25);
        assert_eq!(result.pages, 3);
        assert_eq!(store.queries(), 3);
        let mut emails: Vec<&str> = result.records.iter().map(|r| r.email.as_str()).collect();
        emails.sort_unstable();
        emails.dedup();
        assert_eq!(emails.len(), 25);
    }

    #[tokio::test]
    async fn test_exact_page_multiple_has_no_trailing_empty_page() {
        let window = window();
        let store = MemoryStore::new();
        for i in 0..20 {
            store.insert(window.end - Duration::minutes(i), "guest@example.com");
        }

        let result = retrieve(&store, &window, 10).await.unwrap();
        assert_eq!(result.records.len(), 20);
        assert_eq!(result.pages, 2);
    }

    #[tokio::test]
    async fn test_empty_range_is_one_page() {
        let store = MemoryStore::new();
        let result = retrieve(&store, &window(), 10).await.unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.pages, 1);
    }

    #[tokio::test]
    async fn test_failure_on_later_page_propagates() {
        let window = window();
        let store = MemoryStore::new().fail_on_query(2);
        for i in 0..15 {
            store.insert(window.end - Duration::minutes(i), "guest@example.com");
        }

        let err = retrieve(&store, &window, 10).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected_before_querying() {
        let window = window();
        let store = MemoryStore::new();
        store.insert(window.end - Duration::days(1), "guest@example.com");

        let err = retrieve(&store, &window, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(store.queries(), 0);
    }

    struct StuckStore;

    #[async_trait::async_trait]
    impl RecordStore for StuckStore {
        async fn query_page(
            &self,
            window: &TimeWindow,
            _after: Option<&Cursor>,
            _limit: u32,
        ) -> Result<RecordPage, StoreError> {
            Ok(RecordPage {
                items: vec![],
                next: Some(Cursor {
                    date: window.start,
                    seq: 0,
                }),
            })
        }
    }

    #[tokio::test]
    async fn test_non_advancing_cursor_is_an_error() {
        let err = retrieve(&StuckStore, &window(), 10).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Pagination(_))));
    }
}
