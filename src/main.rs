//! buildmail - Email notifications for CI build and job status events.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use buildmail::cli::{Cli, LogFormat};
use buildmail::config::Config;
use buildmail::settings::normalize;
use buildmail::{EmailNotifier, EventBus, MetricsServer, initialize_metrics, source};

/// How long in-flight sends may take once the event stream has ended.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs go to stderr so stdout stays free for command output.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    if let Some(raw) = &cli.check_settings {
        return check_settings(raw);
    }

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            return Ok(ExitCode::FAILURE);
        }
    };

    // Fail fast, reporting every problem at once
    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(error_count = errors.len(), "Configuration validation failed");
        return Ok(ExitCode::FAILURE);
    }

    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        println!("  SMTP: {}:{} ({:?})", config.smtp.host, config.smtp.port, config.smtp.tls);
        println!("  From: {}", config.smtp.from);
        println!(
            "  Auth: {}",
            if config.smtp.username.is_some() { "enabled" } else { "disabled" }
        );
        println!("  Product: {}", config.product_name);
        println!(
            "  Events: {}",
            config
                .events
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  Metrics: {} (port {})",
            if config.metrics.enabled { "enabled" } else { "disabled" },
            config.metrics.port
        );
        return Ok(ExitCode::SUCCESS);
    }

    info!(config_path = %cli.config.display(), "buildmail starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))?;
    Ok(ExitCode::SUCCESS)
}

/// Validate a settings blob and print the normalized subscription as JSON.
fn check_settings(raw: &str) -> Result<ExitCode> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("--check-settings expects a JSON object")?;

    match EmailNotifier::validate_settings(&value) {
        Ok(settings) => {
            let subscription = normalize(&settings);
            println!("{}", serde_json::to_string_pretty(&subscription)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Invalid settings: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Main async entry point.
async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let metrics_handle = if config.metrics.enabled {
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let server = MetricsServer::with_ready_signal(config.metrics.port, ready_tx);
        let cancel_metrics = cancel.clone();
        info!(port = config.metrics.port, "Starting metrics server");
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run(cancel_metrics).await {
                error!(error = %e, "Metrics server error");
            }
        });
        if ready_rx.await.is_ok() {
            initialize_metrics(&config.events);
        }
        Some(handle)
    } else {
        info!("Metrics server disabled");
        None
    };

    let notifier = Arc::new(
        EmailNotifier::new(&config.smtp)
            .context("invalid SMTP configuration")?
            .with_product_name(config.product_name.as_str()),
    );

    let bus = EventBus::new();
    let listeners = notifier.listen(&bus, &config.events);

    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c signal");
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown");
        cancel_signal.cancel();
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let result = source::run(stdin, &bus, cancel.clone()).await;

    for listener in &listeners {
        listener.cancel();
    }

    if notifier.in_flight() > 0 {
        info!(pending = notifier.in_flight(), "Waiting for in-flight emails");
    }
    if tokio::time::timeout(DRAIN_TIMEOUT, notifier.drain()).await.is_err() {
        warn!(pending = notifier.in_flight(), "Timed out waiting for in-flight emails");
    }

    cancel.cancel();
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    let stats = result.context("event stream failed")?;
    info!(
        lines = stats.lines,
        emitted = stats.emitted,
        invalid = stats.invalid,
        "buildmail shutdown complete"
    );
    Ok(())
}
