//! Batch delivery to the target's line-protocol write endpoint.
//!
//! Encoded text is split into request bodies of bounded line count and each
//! body is POSTed separately. Delivery is best-effort and at-least-once: a
//! rejected or undeliverable batch is logged and skipped, never aborting
//! the run. Re-running the migration is safe because the target
//! deduplicates identical points by timestamp and tag set.

use crate::error::TargetError;

/// Accepts newline-separated line-protocol text for delivery.
pub trait LineSink {
    /// Delivers one request body to the target.
    ///
    /// # Errors
    ///
    /// Returns a [`TargetError`] when the body is rejected or cannot be
    /// delivered. Callers log and continue.
    fn write(&self, body: &str) -> Result<(), TargetError>;
}

/// HTTP sink POSTing to `{target}/write?db={bucket}`.
pub struct HttpSink {
    client: reqwest::blocking::Client,
    endpoint: String,
    db: String,
}

impl HttpSink {
    /// Creates a sink for one target server and bucket.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::ClientCreate`] if the HTTP client cannot be
    /// built.
    pub fn new(target_url: &str, bucket: &str) -> Result<Self, TargetError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TargetError::ClientCreate { source: e })?;
        Ok(Self {
            client,
            endpoint: format!("{}/write", target_url.trim_end_matches('/')),
            db: bucket.to_string(),
        })
    }
}

impl LineSink for HttpSink {
    fn write(&self, body: &str) -> Result<(), TargetError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("db", self.db.as_str())])
            .body(body.to_string())
            .send()
            .map_err(|e| TargetError::Request { source: e })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TargetError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Sink for runs where delivery is bypassed entirely.
///
/// Accepts and discards everything. Used to satisfy the orchestrator's sink
/// parameter in dry-run mode, where batches are printed instead of sent.
pub struct NullSink;

impl LineSink for NullSink {
    fn write(&self, _body: &str) -> Result<(), TargetError> {
        Ok(())
    }
}

/// Splits encoded text into request bodies of at most `max_lines` lines.
///
/// Empty input produces no bodies.
pub fn split_batches(encoded: &str, max_lines: usize) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = encoded.lines().collect();
    lines
        .chunks(max_lines.max(1))
        .map(|group| group.join("\n"))
        .collect()
}

/// Sends encoded text in bounded batches, absorbing delivery failures.
///
/// Returns the number of write requests issued. Failed batches are logged
/// with the response status and body and do not stop the run.
pub fn send_batches(sink: &dyn LineSink, encoded: &str, max_lines: usize) -> usize {
    let mut requests = 0;
    for batch in split_batches(encoded, max_lines) {
        requests += 1;
        match sink.write(&batch) {
            Ok(()) => {}
            Err(TargetError::Status { status, body }) => {
                tracing::warn!("target rejected batch ({status}): {body}");
            }
            Err(e) => {
                tracing::warn!("batch delivery failed: {e}");
            }
        }
    }
    requests
}
