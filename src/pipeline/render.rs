use std::io::Read;
use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tempfile::NamedTempFile;

use crate::error::AppResult;
use crate::store::RecordEntry;

/// The report's CSV, backed by a temporary file that is removed when this
/// value is dropped.
#[derive(Debug)]
pub struct CsvReport {
    file: NamedTempFile,
    rows: usize,
}

impl CsvReport {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Reads the written file back through a fresh handle.
    pub fn contents(&self) -> AppResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file.reopen()?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Writes one row per record holding only its email. Every field is quoted,
/// so values that look numeric stay text. No header row.
#[tracing::instrument(
    name = "pipeline_stage render",
    skip(records),
    fields(pipeline.stage = "render", report.rows = records.len())
)]
pub fn render_csv(records: &[RecordEntry], dir: &Path) -> AppResult<CsvReport> {
    let mut file = tempfile::Builder::new()
        .prefix("emails-")
        .suffix(".csv")
        .tempfile_in(dir)?;

    {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .from_writer(file.as_file_mut());

        for record in records {
            writer.write_record([record.email.as_str()])?;
        }

        writer.flush()?;
    }

    file.as_file().sync_all()?;

    Ok(CsvReport {
        file,
        rows: records.len(),
    })
}
