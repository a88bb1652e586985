use std::time::Duration;

use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::{MailError, MailSender};
use crate::config::{SmtpConfig, SmtpTls};

/// SMTP relay delivery using lettre.
#[derive(Clone)]
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailSender {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let mut builder = match config.tls {
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Smtp(e.to_string()))?,
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Smtp(e.to_string()))?,
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(
            smtp.host = %config.host,
            smtp.port = config.port,
            smtp.tls = ?config.tls,
            "SMTP mail sender configured"
        );

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
        })
    }
}

#[async_trait::async_trait]
impl MailSender for SmtpMailSender {
    #[tracing::instrument(
        name = "smtp.send_raw",
        skip_all,
        fields(
            server.address = %self.host,
            mail.recipients = destinations.len(),
            mail.size_bytes = raw.len(),
        )
    )]
    async fn send_raw(
        &self,
        source: &Address,
        destinations: &[Address],
        raw: &[u8],
    ) -> Result<(), MailError> {
        let envelope = Envelope::new(Some(source.clone()), destinations.to_vec())
            .map_err(|e| MailError::Envelope(e.to_string()))?;

        let response = self
            .transport
            .send_raw(&envelope, raw)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        tracing::debug!(code = %response.code(), "SMTP relay accepted message");

        Ok(())
    }
}
