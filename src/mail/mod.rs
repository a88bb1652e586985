//! Outbound delivery of raw MIME messages.
//!
//! The generator composes the full message itself; a [`MailSender`] only
//! forwards the bytes with an explicit envelope, so delivery targets never
//! depend on header parsing.

pub mod smtp;

use lettre::Address;
use thiserror::Error;

pub use smtp::SmtpMailSender;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to build message: {0}")]
    Build(String),

    #[error("invalid envelope: {0}")]
    Envelope(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

#[async_trait::async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver `raw` from `source` to exactly `destinations`.
    async fn send_raw(
        &self,
        source: &Address,
        destinations: &[Address],
        raw: &[u8],
    ) -> Result<(), MailError>;
}
