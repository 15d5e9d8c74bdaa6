//! # fluxport
//!
//! Bucket migration from InfluxDB 2.x into time-series stores that accept
//! the textual line protocol over HTTP (VictoriaMetrics and compatible).
//!
//! fluxport discovers every distinct series in a source bucket, pages
//! through each series' points in bounded chunks against the live dataset,
//! converts each chunk into protocol lines, and pushes the result to the
//! target's write endpoint — tracking byte and line throughput as it goes.
//!
//! Delivery is best-effort and at-least-once: rejected write batches are
//! logged and skipped, and re-running a migration is safe because the
//! target deduplicates identical points by timestamp and tag set.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fluxport::{HttpSink, InfluxClient, MigrationConfig, Migrator, SourceConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SourceConfig::resolve(
//!     Some("http://localhost:8086".to_string()),
//!     Some("my-org".to_string()),
//!     Some("my-token".to_string()),
//! )?;
//!
//! let client = InfluxClient::connect(&source)?;
//! let sink = HttpSink::new("http://localhost:8428", "home")?;
//!
//! let mut migrator = Migrator::new(client, MigrationConfig::new("home"));
//! let report = migrator.migrate(&sink)?;
//! println!("migrated {} lines", report.lines);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Migrator`] — drives discovery and the per-series read/encode/send loop
//! - [`InfluxClient`] — source collaborator speaking the Flux query API
//! - [`HttpSink`] — target collaborator POSTing line-protocol batches
//! - [`Grouping`] — measurement-naming strategy (native or pivoted entity)
//! - [`ThroughputStats`] — byte/line counters owned by the orchestrator
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`migrate`] — orchestration loop and run report
//! - [`discovery`] — series discovery and whitelisting
//! - [`reader`] — per-series chunked pagination
//! - [`encode`] — line-protocol encoding
//! - [`send`] — batch splitting and delivery
//! - [`source`] — query collaborator and response parsing
//! - [`record`] — tabular result model
//! - [`config`] — run configuration and date bounds
//! - [`stats`] — throughput counters
//! - [`error`] — error types

pub mod config;
pub mod discovery;
pub mod encode;
pub mod error;
pub mod migrate;
pub mod reader;
pub mod record;
pub mod send;
pub mod source;
pub mod stats;

// Re-export primary API types at crate root for convenience.
pub use config::{DateRange, MigrationConfig, SourceConfig};
pub use encode::Grouping;
pub use error::{FluxportError, Result};
pub use migrate::{MigrationReport, Migrator};
pub use record::{Record, Table, Value};
pub use send::{HttpSink, LineSink, NullSink};
pub use source::{FluxQuerier, InfluxClient};
pub use stats::ThroughputStats;
