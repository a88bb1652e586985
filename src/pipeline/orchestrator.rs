use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use lettre::Message;
use opentelemetry::KeyValue;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppResult, current_trace_id};
use crate::mail::MailSender;
use crate::store::RecordStore;
use crate::telemetry::metrics::{
    REPORT_EMAILS_SENT, REPORT_FAILURES, REPORT_GENERATION_DURATION, REPORT_RECORDS,
    REPORT_STORE_PAGES,
};

use super::request::{ReportRequest, ValidatedRequest};
use super::window::{Clock, SystemClock, TimeWindow};
use super::{compose, render, retrieve, window};

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub page_size: u32,
    pub tmp_dir: PathBuf,
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.store_page_size,
            tmp_dir: config.report_tmp_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub id: Uuid,
    pub window: TimeWindow,
    pub records: usize,
    pub pages: usize,
    pub recipients: usize,
    pub duration_ms: u64,
    pub trace_id: String,
}

pub struct ReportGenerator {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn MailSender>,
    clock: Arc<dyn Clock>,
    settings: ReportSettings,
}

impl ReportGenerator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn MailSender>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one report invocation. Any failure aborts the whole invocation
    /// and no email is sent unless every earlier stage succeeded.
    #[tracing::instrument(
        name = "pipeline report",
        skip(self, request),
        fields(
            report.id,
            report.days,
            report.records,
            report.duration_ms,
        )
    )]
    pub async fn generate(&self, request: &ReportRequest) -> AppResult<ReportOutcome> {
        let result = self.run(request).await;

        if let Err(e) = &result {
            REPORT_FAILURES.add(1, &[KeyValue::new("error.kind", e.kind())]);
            tracing::error!(error = %e, error.kind = e.kind(), "Report generation failed");
        }

        result
    }

    async fn run(&self, request: &ReportRequest) -> AppResult<ReportOutcome> {
        let started = Instant::now();
        let id = Uuid::new_v4();

        let span = tracing::Span::current();
        span.record("report.id", id.to_string());

        let request = request.validate()?;
        span.record("report.days", request.days);

        // Stage 1: Compute the lookback window
        let window = window::compute_window(self.clock.as_ref(), request.days)?;

        // Stage 2: Fetch every matching record, all pages
        let data =
            retrieve::retrieve(self.store.as_ref(), &window, self.settings.page_size).await?;

        // Stage 3: Render the CSV into a scoped temporary file
        let csv = render::render_csv(&data.records, &self.settings.tmp_dir)?;

        // Stage 4: Compose the MIME message
        let message = compose::compose(&request, &window, csv.contents()?)?;

        // Stage 5: Hand off to the mail relay
        self.send(&request, message).await?;

        let rows = csv.rows();
        drop(csv);

        let duration = started.elapsed();
        REPORT_GENERATION_DURATION.record(duration.as_secs_f64(), &[]);
        REPORT_RECORDS.record(rows as f64, &[]);
        REPORT_STORE_PAGES.record(data.pages as f64, &[]);

        span.record("report.records", rows);
        span.record("report.duration_ms", duration.as_millis() as u64);

        tracing::info!(
            records = rows,
            pages = data.pages,
            recipients = request.to.len(),
            start = %window.start_iso(),
            end = %window.end_iso(),
            "Report sent"
        );

        Ok(ReportOutcome {
            id,
            window,
            records: rows,
            pages: data.pages,
            recipients: request.to.len(),
            duration_ms: duration.as_millis() as u64,
            trace_id: current_trace_id().unwrap_or_default(),
        })
    }

    #[tracing::instrument(
        name = "pipeline_stage send",
        skip_all,
        fields(pipeline.stage = "send", report.recipients = request.to.len())
    )]
    async fn send(&self, request: &ValidatedRequest, message: Message) -> AppResult<()> {
        let raw = message.formatted();

        self.mailer
            .send_raw(request.source(), &request.destinations(), &raw)
            .await?;

        REPORT_EMAILS_SENT.add(1, &[]);

        Ok(())
    }
}
