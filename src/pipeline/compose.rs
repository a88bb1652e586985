use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};

use crate::mail::MailError;

use super::TimeWindow;
use super::request::ValidatedRequest;

pub const REPORT_FILENAME: &str = "emails.csv";

pub fn report_body(window: &TimeWindow) -> String {
    format!(
        "Attached is your captive portal email report from {} to {}.",
        window.start_iso(),
        window.end_iso()
    )
}

/// Builds the `multipart/mixed` report message: a plain text part naming the
/// window, then the CSV as an `emails.csv` attachment.
#[tracing::instrument(
    name = "pipeline_stage compose",
    skip_all,
    fields(
        pipeline.stage = "compose",
        report.recipients = request.to.len(),
        report.attachment_bytes = csv.len(),
    )
)]
pub fn compose(
    request: &ValidatedRequest,
    window: &TimeWindow,
    csv: Vec<u8>,
) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .subject(request.subject.clone())
        .from(request.from.clone());

    for recipient in &request.to {
        builder = builder.to(recipient.clone());
    }

    let csv = String::from_utf8(csv)
        .map_err(|e| MailError::Build(format!("report is not valid UTF-8: {e}")))?;
    let content_type = ContentType::parse("text/csv; charset=utf-8")
        .map_err(|e| MailError::Build(e.to_string()))?;

    let attachment = Attachment::new(REPORT_FILENAME.to_string()).body(csv, content_type);

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(report_body(window)))
                .singlepart(attachment),
        )
        .map_err(|e| MailError::Build(e.to_string()))
}
