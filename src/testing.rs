//! In-memory collaborators for pipeline tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use lettre::Address;

use crate::mail::{MailError, MailSender};
use crate::pipeline::{Clock, ReportGenerator, ReportSettings, TimeWindow};
use crate::store::{Cursor, RecordEntry, RecordPage, RecordStore, StoreError, split_page};

#[derive(Debug, Clone)]
struct StoredRecord {
    seq: i64,
    date: DateTime<Utc>,
    email: Option<String>,
}

/// Keyset-paged store over a vector, mirroring the PostgreSQL query.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
    queries: AtomicUsize,
    fail_on_query: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`th query (1-based) fail with a pool timeout.
    pub fn fail_on_query(mut self, n: usize) -> Self {
        self.fail_on_query = Some(n);
        self
    }

    pub fn insert(&self, date: DateTime<Utc>, email: &str) {
        self.push(date, Some(email.to_string()));
    }

    pub fn insert_without_email(&self, date: DateTime<Utc>) {
        self.push(date, None);
    }

    fn push(&self, date: DateTime<Utc>, email: Option<String>) {
        let mut records = self.records.lock().unwrap();
        let seq = records.len() as i64 + 1;
        records.push(StoredRecord { seq, date, email });
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn query_page(
        &self,
        window: &TimeWindow,
        after: Option<&Cursor>,
        limit: u32,
    ) -> Result<RecordPage, StoreError> {
        let query = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_query == Some(query) {
            return Err(StoreError::Query(sqlx::Error::PoolTimedOut));
        }

        let mut matching: Vec<StoredRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| window.contains(r.date))
            .filter(|r| after.is_none_or(|c| (r.date, r.seq) > (c.date, c.seq)))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.date, r.seq));

        let (matching, next) = split_page(matching, limit, |r| Cursor {
            date: r.date,
            seq: r.seq,
        })?;

        let items = matching
            .into_iter()
            .map(|r| {
                let email = r.email.ok_or_else(|| StoreError::MalformedRecord {
                    record: r.seq.to_string(),
                    field: "email",
                })?;
                Ok(RecordEntry {
                    date: r.date,
                    email,
                    client_id: None,
                    access_point: None,
                    ssid: None,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(RecordPage { items, next })
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub source: String,
    pub destinations: Vec<String>,
    pub raw: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    reject: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MailSender for RecordingMailer {
    async fn send_raw(
        &self,
        source: &Address,
        destinations: &[Address],
        raw: &[u8],
    ) -> Result<(), MailError> {
        if self.reject {
            return Err(MailError::Smtp("554 5.7.1 message rejected".into()));
        }

        self.sent.lock().unwrap().push(SentMail {
            source: source.to_string(),
            destinations: destinations.iter().map(ToString::to_string).collect(),
            raw: String::from_utf8_lossy(raw).into_owned(),
        });
        Ok(())
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn generator(
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
    now: DateTime<Utc>,
    tmp_dir: &Path,
    page_size: u32,
) -> ReportGenerator {
    ReportGenerator::new(
        store,
        mailer,
        ReportSettings {
            page_size,
            tmp_dir: tmp_dir.to_path_buf(),
        },
    )
    .with_clock(Arc::new(FixedClock(now)))
}
