use lettre::Address;
use lettre::message::Mailbox;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Lookback size as it arrives from schedulers: a JSON number or a numeric
/// string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Days {
    Count(i64),
    Text(String),
}

impl Days {
    fn value(&self) -> AppResult<u32> {
        let count = match self {
            Days::Count(n) => *n,
            Days::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                AppError::Validation(format!("days must be an integer (got {s:?})"))
            })?,
        };

        if count < 0 {
            return Err(AppError::Validation(format!(
                "days must not be negative (got {count})"
            )));
        }

        u32::try_from(count)
            .map_err(|_| AppError::Validation(format!("days is out of range (got {count})")))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailSettings {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<Vec<String>>,
}

/// Invocation document as delivered by the scheduler.
///
/// Every field is optional at the serde level so that a missing field is
/// reported as a validation error naming the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    pub days: Option<Days>,
    pub email: Option<EmailSettings>,
}

#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub days: u32,
    pub subject: String,
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
}

impl ValidatedRequest {
    pub fn source(&self) -> &Address {
        &self.from.email
    }

    pub fn destinations(&self) -> Vec<Address> {
        self.to.iter().map(|mailbox| mailbox.email.clone()).collect()
    }
}

impl ReportRequest {
    pub fn from_json(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("malformed report request: {e}")))
    }

    pub fn validate(&self) -> AppResult<ValidatedRequest> {
        let days = self
            .days
            .as_ref()
            .ok_or_else(|| missing("days"))?
            .value()?;

        let email = self.email.as_ref().ok_or_else(|| missing("email"))?;
        let subject = email.subject.clone().ok_or_else(|| missing("email.subject"))?;
        let from = parse_mailbox(email.from.as_deref().ok_or_else(|| missing("email.from"))?)?;

        let to = email.to.as_ref().ok_or_else(|| missing("email.to"))?;
        if to.is_empty() {
            return Err(AppError::Validation("email.to must not be empty".into()));
        }
        let to = to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(ValidatedRequest {
            days,
            subject,
            from,
            to,
        })
    }
}

fn missing(field: &str) -> AppError {
    AppError::Validation(format!("{field} is required"))
}

fn parse_mailbox(raw: &str) -> AppResult<Mailbox> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid email address: {raw:?}")))
}
