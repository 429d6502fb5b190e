// src/lib.rs
//! buildmail - Email notifications for CI build and job status events.

pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod metrics;
pub mod notify;
pub mod settings;
pub mod source;
pub mod status;
pub mod template;

// Re-export commonly used types
pub use bus::{EventBus, ListenerHandle};
pub use cli::LogFormat;
pub use event::{EventKind, EventPayload};
pub use filter::{Decision, decide};
pub use metrics::{MetricsServer, initialize_metrics, register_metric_descriptions};
pub use notify::{EmailNotifier, MailTransport, Prepared, SkipReason, SmtpMailer, TransportSettings};
pub use settings::{EmailSettings, Subscription, normalize, validate_settings};
pub use status::StatusName;
pub use template::{RenderedContent, RenderedMessage, TemplateEngine};
