//! Outbound email delivery.
//!
//! The [`Mailer`] trait decouples handlers and the task worker from the
//! transport. Production uses [`SmtpMailer`] over lettre's async SMTP
//! transport; when no SMTP host is configured, [`LogMailer`] writes the
//! message to the log instead so local setups work without a mail server.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// Connection settings for the SMTP transport.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_email: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Abstraction over email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Mailer backed by an async SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        let from: Mailbox = config.from_email.parse().map_err(EmailError::Address)?;

        // Plain-text SMTP, suitable for local relays like Mailpit. STARTTLS
        // upgrades are handled by the relay when credentials are set.
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(EmailError::Address)?)
            .subject(subject)
            .body(body.to_string())
            .map_err(EmailError::Build)?;

        self.transport
            .send(message)
            .await
            .map_err(EmailError::Transport)?;
        Ok(())
    }
}

/// Mailer that logs messages instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        info!(to, subject, body, "Email delivery skipped (no SMTP host configured)");
        Ok(())
    }
}

/// Errors that can occur while building or sending an email.
#[derive(Debug)]
pub enum EmailError {
    Address(lettre::address::AddressError),
    Build(lettre::error::Error),
    Transport(lettre::transport::smtp::Error),
}

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailError::Address(e) => write!(f, "Invalid email address: {}", e),
            EmailError::Build(e) => write!(f, "Failed to build message: {}", e),
            EmailError::Transport(e) => write!(f, "SMTP transport error: {}", e),
        }
    }
}

impl std::error::Error for EmailError {}
