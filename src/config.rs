use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    StartTls,
    Tls,
    None,
}

impl FromStr for SmtpTls {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" => Ok(Self::Tls),
            "none" => Ok(Self::None),
            other => Err(AppError::Config(format!(
                "SMTP_TLS must be one of starttls, tls, none (got {other})"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: SmtpTls,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub database_url: String,
    pub records_table: String,
    pub store_page_size: u32,
    pub report_tmp_dir: PathBuf,
    pub smtp: SmtpConfig,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, so tests don't
    /// have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key).ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };

        let store_page_size: u32 = parse(&var("STORE_PAGE_SIZE", "1000"), "STORE_PAGE_SIZE")?;
        if store_page_size == 0 {
            return Err(AppError::Config(
                "STORE_PAGE_SIZE must be greater than zero".into(),
            ));
        }

        Ok(Self {
            port: parse(&var("APP_PORT", "8080"), "APP_PORT")?,
            environment: var("SCOUT_ENVIRONMENT", "development"),
            database_url: required("DATABASE_URL")?,
            records_table: var("RECORDS_TABLE", "portal_registrations"),
            store_page_size,
            report_tmp_dir: lookup("REPORT_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            smtp: SmtpConfig {
                host: required("SMTP_HOST")?,
                port: parse(&var("SMTP_PORT", "587"), "SMTP_PORT")?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
                tls: var("SMTP_TLS", "starttls").parse()?,
                timeout_secs: parse(&var("SMTP_TIMEOUT_SECS", "10"), "SMTP_TIMEOUT_SECS")?,
            },
            otel_service_name: var("OTEL_SERVICE_NAME", "captive-portal-report"),
            otel_exporter_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse<T: FromStr>(value: &str, key: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} must be a number (got {value:?})")))
}
