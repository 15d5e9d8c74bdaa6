//! Migration orchestration: discovery, per-series pagination, delivery.
//!
//! A run moves through fixed phases: discover the series set once, then for
//! each series page through its points, encode every chunk, and hand the
//! encoded text to the sink (or stdout in dry-run mode) before requesting
//! the next chunk. Series and chunks are processed strictly sequentially —
//! each series' pagination cursor depends on the exact row count of the
//! chunk before it, so nothing here is concurrent.
//!
//! Nothing rolls back: a rejected batch is logged by the sender and the run
//! keeps going. Re-running after an abort is safe since the target
//! deduplicates identical points.

use serde::Serialize;

use crate::config::MigrationConfig;
use crate::discovery::{apply_whitelist, discover_series};
use crate::encode::encode_chunk;
use crate::error::Result;
use crate::reader::ChunkReader;
use crate::send::{LineSink, send_batches};
use crate::source::FluxQuerier;
use crate::stats::ThroughputStats;

/// Final counters reported after a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Number of series processed.
    pub series: usize,
    /// Total UTF-8 bytes of encoded output.
    pub bytes: u64,
    /// Total non-empty protocol lines produced.
    pub lines: u64,
    /// Number of write requests issued (always 0 in dry-run mode).
    pub requests: usize,
}

/// Drives one migration run against a connected source.
///
/// Constructing a `Migrator` requires an already-connected querier (for the
/// production client, [`crate::source::InfluxClient::connect`] verifies the
/// server before returning), so a run can never start without a connection.
/// The querier and throughput counters live exactly as long as the
/// `Migrator` itself.
pub struct Migrator<Q> {
    querier: Q,
    config: MigrationConfig,
    stats: ThroughputStats,
}

impl<Q: FluxQuerier> Migrator<Q> {
    /// Creates a migrator over a connected source.
    pub fn new(querier: Q, config: MigrationConfig) -> Self {
        Self {
            querier,
            config,
            stats: ThroughputStats::new(),
        }
    }

    /// The throughput counters accumulated so far.
    pub fn stats(&self) -> ThroughputStats {
        self.stats
    }

    /// Runs the full migration and returns the final counters.
    ///
    /// An empty discovery result is not an error: the run completes
    /// immediately with zeroed counters.
    ///
    /// # Errors
    ///
    /// Fails on discovery or pagination query errors, which are fatal for
    /// the run. Rejected write batches are not errors; they are logged and
    /// skipped.
    pub fn migrate(&mut self, sink: &dyn LineSink) -> Result<MigrationReport> {
        eprintln!("Finding unique time series.");
        let mut series = discover_series(
            &self.querier,
            &self.config.bucket,
            self.config.grouping.key_column(),
        )?;
        if let Some(path) = self.config.whitelist.clone() {
            series = apply_whitelist(series, &path);
        }
        eprintln!("Found {} unique time series", series.len());

        let total = series.len();
        let mut requests = 0;
        for (index, series_id) in series.iter().enumerate() {
            requests += self.migrate_series(sink, series_id, index + 1, total)?;
        }

        tracing::info!(
            "migration of '{}' complete: {} series, {} lines, {} bytes",
            self.config.bucket,
            total,
            self.stats.lines,
            self.stats.bytes
        );
        Ok(MigrationReport {
            series: total,
            bytes: self.stats.bytes,
            lines: self.stats.lines,
            requests,
        })
    }

    /// Pages through one series until the source returns an empty chunk.
    ///
    /// Returns the number of write requests issued for this series.
    fn migrate_series(
        &mut self,
        sink: &dyn LineSink,
        series_id: &str,
        position: usize,
        total: usize,
    ) -> Result<usize> {
        let mut reader = ChunkReader::new(
            &self.querier,
            &self.config.bucket,
            self.config.grouping.key_column(),
            series_id,
            self.config.range,
            self.config.chunk_size,
        );

        let mut requests = 0;
        let mut series_lines: u64 = 0;
        loop {
            let records = reader.next_chunk()?;
            if records.is_empty() {
                break;
            }

            let encoded = encode_chunk(&records, self.config.grouping);
            if encoded.is_empty() {
                // All rows of this chunk were dropped; keep paginating.
                tracing::debug!("chunk for '{series_id}' produced no lines");
                continue;
            }

            series_lines += self.stats.record_batch(&encoded);
            if self.config.dry_run {
                println!("{encoded}");
            } else {
                requests += send_batches(sink, &encoded, self.config.max_lines_per_request);
            }

            eprint!(
                "\rWrote {series_lines} lines to db={} for {series_id}. Total: {} ({position}/{total})",
                self.config.bucket,
                self.stats.humanized_bytes(),
            );
        }
        if series_lines > 0 {
            eprintln!();
        }
        tracing::info!(
            "series '{series_id}' done: {series_lines} lines, {} rows read",
            reader.offset()
        );
        Ok(requests)
    }
}
