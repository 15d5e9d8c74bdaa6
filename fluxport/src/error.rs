//! Error types for the fluxport migration pipeline.

use thiserror::Error;

/// The main error type for all fluxport operations.
///
/// Every variant wraps a category enum; construction happens in the module
/// that detects the condition and `?` carries it up to the caller. Anything
/// that reaches the caller of [`crate::migrate::Migrator::migrate`] is fatal
/// for the run — recoverable conditions (skipped rows, rejected write
/// batches) are absorbed and logged where they occur and never surface here.
#[derive(Error, Debug)]
pub enum FluxportError {
    /// Error resolving run configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error talking to the source database.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Error setting up the target write client.
    #[error("target error: {0}")]
    Target(#[from] TargetError),
}

/// Errors that can occur while resolving run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required connection setting was neither passed explicitly nor found
    /// in the environment.
    #[error("missing source setting: pass it on the command line or set {env_var}")]
    MissingSetting {
        /// The environment variable that would have supplied the value.
        env_var: &'static str,
    },

    /// A date bound could not be parsed as `YYYY-MM-DD`.
    #[error("invalid date '{input}' (expected YYYY-MM-DD): {source}")]
    InvalidDate {
        /// The rejected input string.
        input: String,
        /// The underlying parse error.
        #[source]
        source: chrono::ParseError,
    },
}

/// Errors that can occur while querying the source database.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to construct the HTTP client.
    #[error("failed to create HTTP client: {source}")]
    ClientCreate {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A request could not be delivered at all.
    #[error("request to source failed: {source}")]
    Request {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The source answered with a non-success status.
    #[error("source returned status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body text.
        body: String,
    },

    /// The response body was not well-formed CSV.
    #[error("malformed query response: {source}")]
    Csv {
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The response parsed but did not have the expected tabular shape.
    ///
    /// This indicates a configuration or connectivity problem (wrong
    /// endpoint, incompatible server version) and aborts the run.
    #[error("unexpected query result shape: {reason}")]
    UnexpectedShape {
        /// Description of what was wrong with the result.
        reason: String,
    },
}

/// Errors that can occur while writing to the target store.
#[derive(Error, Debug)]
pub enum TargetError {
    /// Failed to construct the HTTP client.
    #[error("failed to create HTTP client: {source}")]
    ClientCreate {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A write request could not be delivered at all.
    #[error("write request failed: {source}")]
    Request {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The target answered with a non-success status.
    #[error("target returned status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body text.
        body: String,
    },
}

/// Type alias for `Result<T, FluxportError>`.
pub type Result<T> = std::result::Result<T, FluxportError>;
