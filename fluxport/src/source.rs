//! Source query collaborator: Flux queries over the InfluxDB 2.x HTTP API.
//!
//! The [`FluxQuerier`] trait is the seam the rest of the pipeline talks
//! through; [`InfluxClient`] is the production implementation. Queries are
//! POSTed to `/api/v2/query` and the annotated-CSV response is parsed into
//! [`Table`]s of typed [`Record`]s, following the column types declared in
//! the `#datatype` annotation.
//!
//! A response that does not carry the expected annotations is a fatal
//! [`SourceError::UnexpectedShape`]: it means the endpoint is wrong or the
//! server is not speaking the query API this tool expects.

use chrono::{DateTime, Utc};

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::record::{Record, Table, Value};

/// Executes Flux queries against the source database.
pub trait FluxQuerier {
    /// Runs one Flux script and returns the resulting tables.
    ///
    /// An empty result is a valid, empty `Vec`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] wrapped in [`crate::error::FluxportError`]
    /// when the request fails or the response cannot be understood.
    fn query(&self, flux: &str) -> Result<Vec<Table>>;
}

impl<Q: FluxQuerier + ?Sized> FluxQuerier for &Q {
    fn query(&self, flux: &str) -> Result<Vec<Table>> {
        (**self).query(flux)
    }
}

/// HTTP client for the InfluxDB 2.x query API.
///
/// Holds a long-lived blocking HTTP client; constructing it via
/// [`InfluxClient::connect`] probes the server, so owning a value of this
/// type means the connection has been verified.
pub struct InfluxClient {
    client: reqwest::blocking::Client,
    url: String,
    org: String,
    token: String,
}

impl InfluxClient {
    /// Connects to the source server and verifies it responds to `/ping`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ClientCreate`] if the HTTP client cannot be
    /// built, [`SourceError::Request`] if the server is unreachable, or
    /// [`SourceError::Status`] if the ping is rejected.
    pub fn connect(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| SourceError::ClientCreate { source: e })?;

        let url = config.url.trim_end_matches('/').to_string();
        let response = client
            .get(format!("{url}/ping"))
            .send()
            .map_err(|e| SourceError::Request { source: e })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            }
            .into());
        }
        tracing::info!("connected to source at {url}");

        Ok(Self {
            client,
            url,
            org: config.org.clone(),
            token: config.token.clone(),
        })
    }

    /// Runs one Flux script and returns the raw annotated-CSV response body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Request`] or [`SourceError::Status`] when the
    /// query cannot be executed.
    pub fn query_raw(&self, flux: &str) -> Result<String> {
        tracing::debug!("running query: {flux}");
        let response = self
            .client
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/csv")
            .header("Content-Type", "application/vnd.flux")
            .body(flux.to_string())
            .send()
            .map_err(|e| SourceError::Request { source: e })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            }
            .into());
        }

        Ok(response
            .text()
            .map_err(|e| SourceError::Request { source: e })?)
    }
}

impl FluxQuerier for InfluxClient {
    fn query(&self, flux: &str) -> Result<Vec<Table>> {
        let body = self.query_raw(flux)?;
        parse_annotated_csv(&body)
    }
}

/// Escapes a string for embedding in a double-quoted Flux literal.
///
/// Backslashes and double quotes are backslash-escaped so that bucket and
/// series names taken from user input or discovery results cannot break out
/// of the literal they are interpolated into.
pub fn escape_flux_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

/// Parses an annotated-CSV response body into tables.
///
/// Each `#datatype` annotation opens a new table; the following unannotated
/// row is the column header, and every further row is data. An empty body
/// is an empty result, but a body with data rows and no annotations is an
/// [`SourceError::UnexpectedShape`].
///
/// Exposed for callers that obtain response bodies through their own
/// transport.
pub fn parse_annotated_csv(body: &str) -> Result<Vec<Table>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut tables = Vec::new();
    let mut datatypes: Option<Vec<String>> = None;
    let mut defaults: Vec<String> = Vec::new();
    let mut header: Option<Vec<String>> = None;
    let mut current = Table::default();

    for row in reader.records() {
        let row = row.map_err(|source| SourceError::Csv { source })?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let annotation = row.get(0).unwrap_or_default();
        match annotation {
            "#datatype" => {
                if !current.is_empty() {
                    tables.push(std::mem::take(&mut current));
                }
                datatypes = Some(row.iter().skip(1).map(str::to_string).collect());
                defaults.clear();
                header = None;
            }
            "#default" => {
                defaults = row.iter().skip(1).map(str::to_string).collect();
            }
            other if other.starts_with('#') => {
                // #group and any future annotations carry nothing we need.
            }
            _ => {
                let cells: Vec<&str> = row.iter().skip(1).collect();
                let Some(types) = datatypes.as_deref() else {
                    return Err(SourceError::UnexpectedShape {
                        reason: "data rows without a #datatype annotation".to_string(),
                    }
                    .into());
                };
                match header.as_deref() {
                    None => {
                        if cells.len() != types.len() {
                            return Err(SourceError::UnexpectedShape {
                                reason: format!(
                                    "header has {} columns but #datatype declares {}",
                                    cells.len(),
                                    types.len()
                                ),
                            }
                            .into());
                        }
                        header = Some(cells.iter().map(|c| (*c).to_string()).collect());
                    }
                    Some(columns) => {
                        if cells.len() != columns.len() {
                            return Err(SourceError::UnexpectedShape {
                                reason: format!(
                                    "row has {} cells but header has {} columns",
                                    cells.len(),
                                    columns.len()
                                ),
                            }
                            .into());
                        }
                        let mut record = Record::new();
                        for (index, column) in columns.iter().enumerate() {
                            let raw = match cells[index] {
                                "" => defaults.get(index).map_or("", String::as_str),
                                cell => cell,
                            };
                            record.insert(column.clone(), parse_cell(raw, &types[index])?);
                        }
                        current.records.push(record);
                    }
                }
            }
        }
    }

    if !current.is_empty() {
        tables.push(current);
    }

    // Query failures arrive as a 200 response carrying an error table.
    if let Some(first) = tables.first()
        && let Some(record) = first.records.first()
        && record.get("reference").is_some()
        && let Some(message) = record.get_str("error")
    {
        return Err(SourceError::UnexpectedShape {
            reason: format!("query error: {message}"),
        }
        .into());
    }

    Ok(tables)
}

/// Parses one cell according to its declared datatype.
fn parse_cell(raw: &str, datatype: &str) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    let value = match datatype {
        "string" => Value::String(raw.to_string()),
        "boolean" => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => return Err(shape_error(format!("invalid boolean cell '{other}'"))),
        },
        "double" => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| shape_error(format!("invalid double cell '{raw}': {e}")))?,
        "long" => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| shape_error(format!("invalid long cell '{raw}': {e}")))?,
        "unsignedLong" => raw
            .parse::<u64>()
            .map(Value::UInt)
            .map_err(|e| shape_error(format!("invalid unsignedLong cell '{raw}': {e}")))?,
        dt if dt.starts_with("dateTime") => DateTime::parse_from_rfc3339(raw)
            .map(|t| Value::Time(t.with_timezone(&Utc)))
            .map_err(|e| shape_error(format!("invalid timestamp cell '{raw}': {e}")))?,
        // Durations and other exotic column types pass through as text.
        _ => Value::String(raw.to_string()),
    };
    Ok(value)
}

fn shape_error(reason: String) -> crate::error::FluxportError {
    SourceError::UnexpectedShape { reason }.into()
}
