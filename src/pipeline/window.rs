use chrono::{DateTime, Days, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::{AppError, AppResult};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Lookback window ending at the invocation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    #[serde(serialize_with = "serialize_iso8601")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_iso8601")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn lookback(end: DateTime<Utc>, days: u32) -> AppResult<Self> {
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| AppError::Validation(format!("days is out of range (got {days})")))?;

        Ok(Self { start, end })
    }

    pub fn start_iso(&self) -> String {
        iso8601(self.start)
    }

    pub fn end_iso(&self) -> String {
        iso8601(self.end)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_iso8601<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&iso8601(*instant))
}

#[tracing::instrument(
    name = "pipeline_stage window",
    skip(clock),
    fields(pipeline.stage = "window", report.start, report.end)
)]
pub fn compute_window(clock: &dyn Clock, days: u32) -> AppResult<TimeWindow> {
    let window = TimeWindow::lookback(clock.now(), days)?;

    let span = tracing::Span::current();
    span.record("report.start", window.start_iso());
    span.record("report.end", window.end_iso());

    Ok(window)
}
