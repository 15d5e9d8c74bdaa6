//! Byte and line throughput accounting for one migration run.

use serde::Serialize;

/// Running totals for one migration run.
///
/// `lines` counts non-empty protocol lines produced by the encoder and
/// `bytes` counts the UTF-8 length of every encoded batch. Both totals only
/// ever grow; the value lives for one run and is owned by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThroughputStats {
    /// Total UTF-8 bytes of encoded output.
    pub bytes: u64,
    /// Total non-empty protocol lines produced.
    pub lines: u64,
}

impl ThroughputStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts one encoded batch and returns the number of lines it added.
    pub fn record_batch(&mut self, encoded: &str) -> u64 {
        let lines = count_lines(encoded);
        self.lines += lines;
        self.bytes += encoded.len() as u64;
        lines
    }

    /// The byte total as a human-readable size.
    pub fn humanized_bytes(&self) -> String {
        format_bytes(self.bytes)
    }
}

/// Counts the non-empty lines of an encoded batch.
fn count_lines(encoded: &str) -> u64 {
    encoded.lines().filter(|line| !line.is_empty()).count() as u64
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
