//! Chunked, offset-paginated reads of a single series.
//!
//! A [`ChunkReader`] owns the pagination cursor for one series. Every call
//! to [`ChunkReader::next_chunk`] issues one range-filtered, offset/limit
//! bounded query and advances the cursor by the number of rows actually
//! returned — never by the configured chunk size, since the source may
//! return fewer rows than the limit near the end of a series. The series is
//! exhausted exactly when a query returns no rows at all.

use crate::config::DateRange;
use crate::error::Result;
use crate::record::Record;
use crate::source::{FluxQuerier, escape_flux_literal};

/// Paginated reader over one series' points.
pub struct ChunkReader<'a> {
    querier: &'a dyn FluxQuerier,
    bucket: &'a str,
    grouping_key: &'a str,
    series: &'a str,
    range: DateRange,
    chunk_size: usize,
    offset: usize,
}

impl<'a> ChunkReader<'a> {
    /// Creates a reader for one series with a fresh cursor.
    pub fn new(
        querier: &'a dyn FluxQuerier,
        bucket: &'a str,
        grouping_key: &'a str,
        series: &'a str,
        range: DateRange,
        chunk_size: usize,
    ) -> Self {
        Self {
            querier,
            bucket,
            grouping_key,
            series,
            range,
            chunk_size,
            offset: 0,
        }
    }

    /// The number of rows consumed so far for this series.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Fetches the next chunk of rows and advances the cursor.
    ///
    /// Rows from all tables of the response are flattened in response
    /// order. An empty return value means the series is exhausted and the
    /// caller must move on.
    ///
    /// # Errors
    ///
    /// Propagates query failures from the source.
    pub fn next_chunk(&mut self) -> Result<Vec<Record>> {
        let tables = self.querier.query(&self.chunk_query())?;
        let records: Vec<Record> = tables
            .into_iter()
            .flat_map(|table| table.records)
            .collect();
        self.offset += records.len();
        Ok(records)
    }

    /// Builds the range/filter/limit query for the current cursor position.
    fn chunk_query(&self) -> String {
        let (start, stop) = self.range.to_flux_bounds();
        format!(
            "from(bucket: \"{bucket}\")\n  \
             |> range(start: {start}, stop: {stop})\n  \
             |> filter(fn: (r) => r[\"{key}\"] == \"{series}\")\n  \
             |> limit(n: {limit}, offset: {offset})",
            bucket = escape_flux_literal(self.bucket),
            key = escape_flux_literal(self.grouping_key),
            series = escape_flux_literal(self.series),
            limit = self.chunk_size,
            offset = self.offset,
        )
    }
}
