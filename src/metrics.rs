//! Prometheus metrics exposition.
//!
//! Counters are emitted through the `metrics` facade everywhere in the crate;
//! they are only collected once [`MetricsServer::run`] installs the
//! Prometheus recorder.

use crate::event::EventKind;
use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register HELP text for every buildmail metric.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        "buildmail_events_received_total",
        "Total number of build and job events handed to the notifier"
    );
    describe_counter!(
        "buildmail_notifications_sent_total",
        "Total number of emails accepted by the SMTP relay"
    );
    describe_counter!(
        "buildmail_notifications_skipped_total",
        "Total number of events that produced no email (not subscribed, no recipients)"
    );
    describe_counter!(
        "buildmail_notify_errors_total",
        "Total number of notifications lost to render or delivery failures"
    );
    describe_counter!(
        "buildmail_payload_errors_total",
        "Total number of malformed events or event lines"
    );
    describe_gauge!(
        "buildmail_build_info",
        "Build information with version label (always 1)"
    );
}

/// Metrics server for Prometheus exposition on `/metrics`.
pub struct MetricsServer {
    port: u16,
    /// Signalled once the recorder is installed, so callers can avoid
    /// emitting metrics that would otherwise be lost.
    ready_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MetricsServer {
    /// Use port 0 to let the OS assign an available port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ready_tx: None,
        }
    }

    pub fn with_ready_signal(port: u16, ready_tx: tokio::sync::oneshot::Sender<()>) -> Self {
        Self {
            port,
            ready_tx: Some(ready_tx),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Install the global recorder, serve until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be installed (port in use,
    /// recorder already installed).
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();

        // The recorder can only be installed once per process
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

        register_metric_descriptions();

        if let Some(tx) = self.ready_tx {
            let _ = tx.send(());
        }

        info!(port = self.port, "Metrics server started on /metrics");

        cancel.cancelled().await;

        info!("Metrics server shutting down");

        Ok(())
    }
}

/// Zero every per-event counter so `/metrics` is complete from startup.
pub fn initialize_metrics(events: &[EventKind]) {
    use metrics::{counter, gauge};

    gauge!("buildmail_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    for kind in events {
        let event = kind.as_str();
        counter!("buildmail_events_received_total", "event" => event).absolute(0);
        counter!("buildmail_notifications_sent_total", "event" => event).absolute(0);
        counter!("buildmail_notify_errors_total", "event" => event).absolute(0);
        counter!("buildmail_payload_errors_total", "event" => event).absolute(0);
    }

    tracing::info!(event_count = events.len(), "Metrics initialized to zero");
}
