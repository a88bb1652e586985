use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{Cursor, RecordEntry, RecordPage, RecordStore, StoreError, split_page};
use crate::pipeline::TimeWindow;

const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated, optionally schema-qualified table identifier.
///
/// The table name comes from configuration and is interpolated into SQL, so
/// only plain identifiers are accepted and every part is quoted on output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let parts: Vec<&str> = raw.split('.').collect();
        let (schema, table) = match parts.as_slice() {
            [table] => (None, *table),
            [schema, table] => (Some(*schema), *table),
            _ => return Err(StoreError::InvalidTable(raw.to_string())),
        };

        if !schema.is_none_or(is_identifier) || !is_identifier(table) {
            return Err(StoreError::InvalidTable(raw.to_string()));
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    part.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "\"{}\".\"{}\"", schema, self.table),
            None => write!(f, "\"{}\"", self.table),
        }
    }
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    seq: i64,
    date: DateTime<Utc>,
    email: Option<String>,
    id: Option<String>,
    ap: Option<String>,
    ssid: Option<String>,
}

impl TryFrom<RegistrationRow> for RecordEntry {
    type Error = StoreError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let email = row.email.ok_or_else(|| StoreError::MalformedRecord {
            record: row.seq.to_string(),
            field: "email",
        })?;

        Ok(RecordEntry {
            date: row.date,
            email,
            client_id: row.id,
            access_point: row.ap,
            ssid: row.ssid,
        })
    }
}

pub struct PgRecordStore {
    pool: PgPool,
    table: TableName,
    select_sql: String,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, table: TableName) -> Self {
        let select_sql = page_query(&table);
        Self {
            pool,
            table,
            select_sql,
        }
    }
}

fn page_query(table: &TableName) -> String {
    format!(
        "SELECT seq, date, email, id, ap, ssid \
         FROM {table} \
         WHERE date BETWEEN $1 AND $2 \
           AND ($3::timestamptz IS NULL OR (date, seq) > ($3::timestamptz, $4::bigint)) \
         ORDER BY date, seq \
         LIMIT $5"
    )
}

#[async_trait::async_trait]
impl RecordStore for PgRecordStore {
    #[tracing::instrument(
        name = "db.registrations.query_page",
        skip(self, window, after),
        fields(db.table = %self.table, page.items, page.has_more)
    )]
    async fn query_page(
        &self,
        window: &TimeWindow,
        after: Option<&Cursor>,
        limit: u32,
    ) -> Result<RecordPage, StoreError> {
        // One extra row tells us whether another page exists.
        let rows = sqlx::query_as::<_, RegistrationRow>(&self.select_sql)
            .bind(window.start)
            .bind(window.end)
            .bind(after.map(|c| c.date))
            .bind(after.map(|c| c.seq))
            .bind(i64::from(limit) + 1)
            .fetch_all(&self.pool)
            .await?;

        let (rows, next) = split_page(rows, limit, |row| Cursor {
            date: row.date,
            seq: row.seq,
        })?;

        let items = rows
            .into_iter()
            .map(RecordEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let span = tracing::Span::current();
        span.record("page.items", items.len());
        span.record("page.has_more", next.is_some());

        Ok(RecordPage { items, next })
    }
}
