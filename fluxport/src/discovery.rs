//! Series discovery: finding every distinct series in a bucket.
//!
//! One query reads the first recorded point of every series over all time;
//! the configured grouping-key column of the result names the series. The
//! deduplicated set drives the per-series migration loop.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;
use crate::source::{FluxQuerier, escape_flux_literal};

/// Builds the first-point-of-every-series query for a bucket.
fn first_point_query(bucket: &str) -> String {
    format!(
        "from(bucket: \"{}\")\n  |> range(start: 0, stop: now())\n  |> first()",
        escape_flux_literal(bucket)
    )
}

/// Discovers the distinct set of series identifiers in a bucket.
///
/// Tables missing the grouping-key column are skipped with a warning; rows
/// with a null or empty key contribute nothing. An empty set is a valid
/// result meaning the bucket has nothing to migrate.
///
/// # Errors
///
/// Propagates query failures, including an unrecognizable result shape,
/// which callers must treat as fatal.
pub fn discover_series(
    querier: &dyn FluxQuerier,
    bucket: &str,
    grouping_key: &str,
) -> Result<BTreeSet<String>> {
    let tables = querier.query(&first_point_query(bucket))?;

    let mut series = BTreeSet::new();
    for table in &tables {
        if !table.is_empty()
            && table
                .records
                .iter()
                .all(|record| record.get(grouping_key).is_none())
        {
            tracing::warn!("result table lacks a '{grouping_key}' column, skipping");
            continue;
        }
        for record in &table.records {
            if let Some(id) = record.get_str(grouping_key)
                && !id.is_empty()
            {
                series.insert(id.to_string());
            }
        }
    }

    tracing::info!("discovered {} unique series in '{bucket}'", series.len());
    Ok(series)
}

/// Restricts a discovered series set to the identifiers named in a file.
///
/// The file lists one series identifier per line; blank lines and lines
/// starting with `#` are ignored. An unreadable file, or one naming no
/// series at all, leaves the set unchanged (with a warning), matching the
/// tool's best-effort posture.
pub fn apply_whitelist(series: BTreeSet<String>, path: &Path) -> BTreeSet<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("problem reading whitelist '{}', skipping: {e}", path.display());
            return series;
        }
    };

    let allowed: BTreeSet<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    if allowed.is_empty() {
        tracing::warn!("whitelist '{}' names no series, skipping", path.display());
        return series;
    }

    let filtered: BTreeSet<String> = series
        .into_iter()
        .filter(|id| allowed.contains(id.as_str()))
        .collect();
    tracing::info!(
        "whitelist '{}' kept {} series",
        path.display(),
        filtered.len()
    );
    filtered
}
