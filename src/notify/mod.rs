//! Email notification pipeline for build events.
//!
//! # Architecture
//!
//! ```text
//! EventBus -> EmailNotifier -> settings -> filter -> template -> email (dispatch)
//! ```
//!
//! Everything up to rendering runs synchronously on the emitter's thread.
//! The send itself is spawned on the Tokio runtime, so a slow relay never
//! blocks the event source and several sends may be in flight at once.
//! Failures end in a log line and a counter; nothing is retried.

pub mod email;

use crate::bus::{EventBus, ListenerHandle};
use crate::config::SmtpConfig;
use crate::error::{ConfigError, EventError, NotifyError, SettingsError};
use crate::event::{EventKind, EventPayload};
use crate::filter::decide;
use crate::settings::{self, EmailSettings, normalize};
use crate::status::StatusName;
use crate::template::{RenderedMessage, TemplateEngine};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

pub use email::{
    DEFAULT_SMTP_TIMEOUT, MailTransport, SmtpAuth, SmtpMailer, TransportSettings, build_message,
    dispatch,
};

/// Why an event produced no email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The effective status is not in the subscriber's status set.
    NotSubscribed {
        status: StatusName,
        effective_status: StatusName,
    },
    /// The subscription lists no addresses.
    NoRecipients,
}

impl SkipReason {
    /// Short label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SkipReason::NotSubscribed { .. } => "not_subscribed",
            SkipReason::NoRecipients => "no_recipients",
        }
    }
}

/// Outcome of the synchronous part of a notification cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    Dispatch(RenderedMessage),
    Skipped(SkipReason),
}

/// Build-event email notifier.
///
/// Construction validates the SMTP configuration; an instance is always
/// ready to listen.
pub struct EmailNotifier {
    from: String,
    transport_settings: Arc<TransportSettings>,
    transport: Arc<dyn MailTransport>,
    templates: TemplateEngine,
    in_flight: TaskTracker,
}

impl EmailNotifier {
    /// Create a notifier sending through [`SmtpMailer`].
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for an invalid SMTP configuration or an
    /// undefined `${VAR}` in the credentials.
    pub fn new(config: &SmtpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport_settings = TransportSettings::from_config(config)?;

        tracing::debug!(
            host = %transport_settings.host,
            port = transport_settings.port,
            auth = transport_settings.auth.is_some(),
            "Email notifier configured"
        );

        Ok(Self {
            from: config.from.clone(),
            transport_settings: Arc::new(transport_settings),
            transport: Arc::new(SmtpMailer::new()),
            templates: TemplateEngine::default(),
            in_flight: TaskTracker::new(),
        })
    }

    /// Create a notifier from an untyped SMTP configuration.
    ///
    /// # Errors
    /// Same as [`new`](Self::new), plus shape and type errors of the value.
    pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
        Self::new(&SmtpConfig::from_value(config)?)
    }

    /// Replace the mail transport (tests, alternative relays).
    pub fn with_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Set the product name used in subjects.
    pub fn with_product_name(mut self, product_name: impl Into<String>) -> Self {
        self.templates = TemplateEngine::new(product_name);
        self
    }

    pub fn transport_settings(&self) -> &TransportSettings {
        &self.transport_settings
    }

    pub fn product_name(&self) -> &str {
        self.templates.product_name()
    }

    /// Validate a subscriber's `settings` object without a notifier instance.
    pub fn validate_settings(raw: &Value) -> Result<EmailSettings, SettingsError> {
        settings::validate_settings(raw)
    }

    /// Run one cycle up to (not including) the send.
    ///
    /// # Errors
    /// Returns [`EventError::Payload`] for malformed payloads and
    /// [`EventError::Template`] if rendering fails.
    pub fn prepare(&self, kind: EventKind, payload: &Value) -> Result<Prepared, EventError> {
        let event = EventPayload::from_value(kind, payload)?;
        let subscription = normalize(event.settings());
        let decision = decide(event.status(), event.is_fixed(), &subscription);

        if !decision.fire {
            return Ok(Prepared::Skipped(SkipReason::NotSubscribed {
                status: event.status(),
                effective_status: decision.effective_status,
            }));
        }
        if subscription.addresses.is_empty() {
            return Ok(Prepared::Skipped(SkipReason::NoRecipients));
        }

        let content = self.templates.render(&event, decision.effective_status)?;
        Ok(Prepared::Dispatch(
            content.addressed(self.from.clone(), subscription.addresses),
        ))
    }

    /// Handle one event. Returns the spawned send task when an email goes out.
    ///
    /// Never fails: every error is logged and counted here.
    pub fn notify(
        &self,
        kind: EventKind,
        payload: &Value,
    ) -> Option<JoinHandle<Result<(), NotifyError>>> {
        metrics::counter!("buildmail_events_received_total", "event" => kind.as_str())
            .increment(1);

        let message = match self.prepare(kind, payload) {
            Ok(Prepared::Dispatch(message)) => message,
            Ok(Prepared::Skipped(reason)) => {
                tracing::debug!(event = %kind, reason = ?reason, "Notification skipped");
                metrics::counter!(
                    "buildmail_notifications_skipped_total",
                    "event" => kind.as_str(),
                    "reason" => reason.as_label()
                )
                .increment(1);
                return None;
            }
            Err(EventError::Payload(e)) => {
                tracing::warn!(event = %kind, error = %e, "Invalid event payload, skipping notification");
                metrics::counter!("buildmail_payload_errors_total", "event" => kind.as_str())
                    .increment(1);
                return None;
            }
            Err(e) => {
                tracing::error!(event = %kind, error = %e, "Failed to render notification");
                metrics::counter!("buildmail_notify_errors_total", "event" => kind.as_str())
                    .increment(1);
                return None;
            }
        };

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(event = %kind, error = %e, "No async runtime, dropping notification");
                metrics::counter!("buildmail_notify_errors_total", "event" => kind.as_str())
                    .increment(1);
                return None;
            }
        };

        let transport = Arc::clone(&self.transport);
        let settings = Arc::clone(&self.transport_settings);
        Some(self.in_flight.spawn_on(
            async move {
                let result = dispatch(transport.as_ref(), &settings, &message).await;
                match &result {
                    Ok(()) => metrics::counter!(
                        "buildmail_notifications_sent_total",
                        "event" => kind.as_str()
                    )
                    .increment(1),
                    Err(_) => metrics::counter!(
                        "buildmail_notify_errors_total",
                        "event" => kind.as_str()
                    )
                    .increment(1),
                }
                result
            },
            &runtime,
        ))
    }

    /// Number of sends still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every spawned send to finish. Sends started afterwards are
    /// still tracked.
    pub async fn drain(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    /// Attach to `bus`, one handler per distinct kind in `kinds`.
    pub fn listen(self: &Arc<Self>, bus: &EventBus, kinds: &[EventKind]) -> Vec<ListenerHandle> {
        let mut handles: Vec<ListenerHandle> = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if handles.iter().any(|h| h.kind() == kind) {
                continue;
            }
            let notifier = Arc::clone(self);
            handles.push(bus.on(kind, move |payload| {
                notifier.notify(kind, payload);
            }));
            tracing::info!(event = %kind, "Listening for events");
        }
        handles
    }
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("from", &self.from)
            .field("transport_settings", &self.transport_settings)
            .field("product_name", &self.templates.product_name())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
