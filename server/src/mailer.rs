//! Transactional mail over SMTP.
//!
//! Used for password-reset links and forwarded issue reports. SMTP is
//! optional at deploy time; callers fall back to logging when no mailer
//! is configured.

use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Mailer {
            transport,
            from: config.from_address.clone(),
        })
    }

    /// Send one message with plain-text and HTML alternatives.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            ))?;

        self.transport.send(message).await?;
        tracing::info!("mail sent to {}", recipient);
        Ok(())
    }
}
