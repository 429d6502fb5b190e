//! SMTP dispatcher.
//!
//! Turns a [`RenderedMessage`] into a `multipart/alternative` email and hands
//! it to a [`MailTransport`]. A fresh SMTP transport is built for every send,
//! so configuration changes on the relay side never leave a stale pooled
//! connection behind.
//!
//! # Testability
//!
//! - Production: [`SmtpMailer`] over `AsyncSmtpTransport<Tokio1Executor>`
//! - Testing: any `MailTransport` that records what it receives

use crate::config::{SecretString, SmtpConfig, TlsMode, resolve_env_vars};
use crate::error::{ConfigError, NotifyError};
use crate::template::RenderedMessage;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::Instrument;

/// Upper bound for a single SMTP exchange.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP credentials handed to the transport.
#[derive(Debug, Clone)]
pub struct SmtpAuth {
    pub user: String,
    pub pass: SecretString,
}

/// Connection descriptor for one send.
///
/// `auth` is only present when both a username and a password are configured.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub tls_verify: bool,
    pub auth: Option<SmtpAuth>,
}

impl TransportSettings {
    /// Build the descriptor from configuration, resolving `${VAR}` placeholders
    /// in the credentials.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidSmtp`] when a placeholder names an
    /// undefined environment variable.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, ConfigError> {
        let username = config
            .username
            .as_deref()
            .map(resolve_env_vars)
            .transpose()
            .map_err(|e| ConfigError::InvalidSmtp {
                field: "username",
                message: e.to_string(),
            })?;

        let password = config
            .password
            .as_ref()
            .map(|p| resolve_env_vars(p.expose()))
            .transpose()
            .map_err(|e| ConfigError::InvalidSmtp {
                field: "password",
                message: e.to_string(),
            })?;

        let auth = match (username, password) {
            (Some(user), Some(pass)) => Some(SmtpAuth {
                user,
                pass: SecretString::new(pass),
            }),
            _ => None,
        };

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            tls: config.tls,
            tls_verify: config.tls_verify,
            auth,
        })
    }
}

/// Mail-sending capability.
///
/// Implementations receive the connection descriptor with every call and must
/// not keep connections open between sends.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_mail(
        &self,
        settings: &TransportSettings,
        message: &RenderedMessage,
    ) -> Result<(), NotifyError>;
}

/// Real SMTP transport over lettre.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_SMTP_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build SMTP transport based on TLS mode, credentials, and tls_verify setting.
    fn build_transport(
        &self,
        settings: &TransportSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let host = settings.host.as_str();

        let tls = match settings.tls {
            TlsMode::None => Tls::None,
            mode => {
                let mut tls_builder = TlsParameters::builder(host.to_string());
                if !settings.tls_verify {
                    // Self-signed relay certificates
                    tls_builder = tls_builder.dangerous_accept_invalid_certs(true);
                }
                let params = tls_builder
                    .build()
                    .map_err(|e| NotifyError::Transport(format!("TLS configuration error: {}", e)))?;
                match mode {
                    TlsMode::Starttls => Tls::Required(params),
                    TlsMode::Tls => Tls::Wrapper(params),
                    _ => Tls::Opportunistic(params),
                }
            }
        };

        let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(settings.port)
            .tls(tls)
            .timeout(Some(self.timeout));

        let builder = match &settings.auth {
            Some(auth) => builder.credentials(Credentials::new(
                auth.user.clone(),
                auth.pass.expose().to_string(),
            )),
            None => builder,
        };

        Ok(builder.build())
    }
}

impl Default for SmtpMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send_mail(
        &self,
        settings: &TransportSettings,
        message: &RenderedMessage,
    ) -> Result<(), NotifyError> {
        let email = build_message(message)?;
        let transport = self.build_transport(settings)?;
        transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::SendFailed(e.to_string()))
    }
}

/// Build the MIME message: one envelope for every recipient, with plain text
/// and HTML alternatives.
///
/// # Errors
/// Returns [`NotifyError::InvalidMessage`] for unparseable addresses or an
/// empty recipient list.
pub fn build_message(message: &RenderedMessage) -> Result<Message, NotifyError> {
    let from: Mailbox = message.from.parse().map_err(|e| {
        NotifyError::InvalidMessage(format!("invalid 'from' address '{}': {}", message.from, e))
    })?;

    let mut builder = Message::builder().from(from).subject(message.subject.as_str());
    for addr in &message.to {
        let mailbox: Mailbox = addr.parse().map_err(|e| {
            NotifyError::InvalidMessage(format!("invalid recipient '{}': {}", addr, e))
        })?;
        builder = builder.to(mailbox);
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            message.text.clone(),
            message.html.clone(),
        ))
        .map_err(|e| NotifyError::InvalidMessage(e.to_string()))
}

/// Send one message and log the outcome.
///
/// Failures are returned to the caller; nothing is retried.
pub async fn dispatch(
    transport: &dyn MailTransport,
    settings: &TransportSettings,
    message: &RenderedMessage,
) -> Result<(), NotifyError> {
    let span = tracing::info_span!(
        "send_email",
        host = %settings.host,
        port = settings.port,
        recipients = message.to.len(),
    );

    async {
        match transport.send_mail(settings, message).await {
            Ok(()) => {
                tracing::info!(subject = %message.subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    to = %message.to.join(","),
                    error = %e,
                    "Failed to notify email"
                );
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}
