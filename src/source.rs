//! Newline-delimited JSON event source.
//!
//! Each line carries one envelope:
//!
//! ```text
//! {"event": "build_status", "payload": {...}}
//! ```
//!
//! Valid envelopes are published on the [`EventBus`]. Malformed lines are
//! logged, counted and skipped; they never stop the stream.

use crate::bus::EventBus;
use crate::error::SourceError;
use crate::event::EventKind;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

/// One event read from the stream.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub event: EventKind,
    pub payload: Value,
}

/// Counters for one run of the source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    /// Non-blank lines read.
    pub lines: u64,
    /// Envelopes published on the bus.
    pub emitted: u64,
    /// Lines skipped as malformed.
    pub invalid: u64,
}

/// Parse a single line into an [`Envelope`].
pub fn parse_envelope(line: &str) -> Result<Envelope, SourceError> {
    serde_json::from_str(line).map_err(|e| SourceError::InvalidEnvelope(e.to_string()))
}

/// Log and count a rejected line.
pub fn record_envelope_error(line_number: u64, error: &SourceError) {
    tracing::warn!(line = line_number, error = %error, "Skipping malformed event line");
    metrics::counter!("buildmail_payload_errors_total", "event" => "unknown").increment(1);
}

/// Read envelopes from `reader` until EOF or cancellation and publish them.
///
/// # Errors
/// Returns [`SourceError::Read`] if the underlying reader fails. Lines that
/// are not UTF-8 or not a valid envelope are skipped.
pub async fn run<R>(
    mut reader: R,
    bus: &EventBus,
    cancel: CancellationToken,
) -> Result<SourceStats, SourceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut stats = SourceStats::default();
    let mut line_number: u64 = 0;

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Event source cancelled");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };

        if read == 0 {
            tracing::info!(lines = stats.lines, emitted = stats.emitted, "Event stream closed");
            break;
        }
        line_number += 1;

        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(e) => {
                stats.lines += 1;
                stats.invalid += 1;
                record_envelope_error(line_number, &SourceError::from(e));
                continue;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;

        match parse_envelope(line) {
            Ok(envelope) => {
                let handlers = bus.emit(envelope.event, &envelope.payload);
                tracing::debug!(
                    line = line_number,
                    event = %envelope.event,
                    handlers,
                    "Event published"
                );
                stats.emitted += 1;
            }
            Err(e) => {
                record_envelope_error(line_number, &e);
                stats.invalid += 1;
            }
        }
    }

    Ok(stats)
}
