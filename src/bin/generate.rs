//! One-shot report invocation for cron-style schedulers.
//!
//! Reads a report request document from `--request <path>` (or stdin), runs
//! the pipeline once and exits non-zero on any failure.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use captive_portal_report::Config;
use captive_portal_report::mail::SmtpMailSender;
use captive_portal_report::pipeline::{ReportGenerator, ReportRequest, ReportSettings};
use captive_portal_report::store::{PgRecordStore, TableName, create_pool};
use captive_portal_report::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "generate", about = "Send one captive portal email report")]
struct Cli {
    /// Request document; read from stdin when omitted.
    #[arg(short, long, value_name = "PATH")]
    request: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let telemetry_guard = match init_telemetry(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&cli, &config).await;

    let code = match &result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Report invocation failed");
            ExitCode::FAILURE
        }
    };

    telemetry_guard.shutdown();
    code
}

async fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let body = read_request(cli.request.as_ref())?;
    let request = ReportRequest::from_json(&body)?;
    // Reject bad documents before opening any connection.
    request.validate()?;

    let table = TableName::parse(&config.records_table)?;
    let pool = create_pool(&config.database_url)
        .await
        .context("connecting to record store")?;
    let store = Arc::new(PgRecordStore::new(pool, table));
    let mailer = Arc::new(SmtpMailSender::from_config(&config.smtp)?);

    let generator = ReportGenerator::new(store, mailer, ReportSettings::from_config(config));
    let outcome = generator.generate(&request).await?;

    tracing::info!(
        report.id = %outcome.id,
        records = outcome.records,
        recipients = outcome.recipients,
        "Report invocation finished"
    );

    Ok(())
}

fn read_request(path: Option<&PathBuf>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("reading request from stdin")?;
            Ok(body)
        }
    }
}
