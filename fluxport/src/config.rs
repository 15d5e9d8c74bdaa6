//! Run configuration: source connection, migration options, and date bounds.
//!
//! Source connection settings follow the InfluxDB 2.x client convention:
//! explicit values win, otherwise the `INFLUXDB_V2_URL`, `INFLUXDB_V2_ORG`
//! and `INFLUXDB_V2_TOKEN` environment variables are consulted.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::encode::Grouping;
use crate::error::ConfigError;

/// Default number of rows fetched per paginated query.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Default maximum number of protocol lines per write request.
pub const DEFAULT_MAX_LINES_PER_REQUEST: usize = 10_000;

/// Default backfill horizon when no date bounds are given.
const DEFAULT_LOOKBACK: &str = "-100d";

/// Environment variable supplying the source server URL.
pub const ENV_URL: &str = "INFLUXDB_V2_URL";
/// Environment variable supplying the source organization.
pub const ENV_ORG: &str = "INFLUXDB_V2_ORG";
/// Environment variable supplying the source access token.
pub const ENV_TOKEN: &str = "INFLUXDB_V2_TOKEN";

/// Connection settings for the source InfluxDB 2.x server.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the source server, e.g. `http://localhost:8086`.
    pub url: String,
    /// Organization name the token belongs to.
    pub org: String,
    /// API access token.
    pub token: String,
}

impl SourceConfig {
    /// Resolves connection settings from explicit values with environment
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when a setting is neither
    /// passed explicitly nor present (non-empty) in the environment.
    pub fn resolve(
        url: Option<String>,
        org: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            url: setting(url, ENV_URL)?,
            org: setting(org, ENV_ORG)?,
            token: setting(token, ENV_TOKEN)?,
        })
    }
}

/// Returns the explicit value if given, otherwise a non-empty environment value.
fn setting(explicit: Option<String>, env_var: &'static str) -> Result<String, ConfigError> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
        .ok_or(ConfigError::MissingSetting { env_var })
}

/// Inclusive day bounds restricting the migration window.
///
/// Resolution policy:
///
/// - both bounds set: the half-open range `[start 00:00:00Z, end+1d 00:00:00Z)`
/// - only `start` set: from `start 00:00:00Z` with an open end (`now()`)
/// - neither set: the trailing 100-day window ending now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day to migrate.
    pub start: Option<NaiveDate>,
    /// Last day to migrate, inclusive.
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Parses `YYYY-MM-DD` day bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDate`] for any bound that is present but
    /// not a valid `YYYY-MM-DD` date. Callers treat this as fatal before the
    /// migration starts.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            start: start.map(parse_day).transpose()?,
            end: end.map(parse_day).transpose()?,
        })
    }

    /// Resolves the bounds into `start`/`stop` expressions for a range clause.
    ///
    /// The returned strings are either RFC3339 instants, a relative duration
    /// (`-100d`), or the literal `now()`.
    pub fn to_flux_bounds(&self) -> (String, String) {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                let stop = match end.succ_opt() {
                    Some(next) => day_start_rfc3339(next),
                    None => "now()".to_string(),
                };
                (day_start_rfc3339(start), stop)
            }
            (Some(start), None) => (day_start_rfc3339(start), "now()".to_string()),
            (None, _) => (DEFAULT_LOOKBACK.to_string(), "now()".to_string()),
        }
    }
}

fn parse_day(input: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|source| ConfigError::InvalidDate {
        input: input.to_string(),
        source,
    })
}

fn day_start_rfc3339(day: NaiveDate) -> String {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Options controlling one migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Source bucket to migrate.
    pub bucket: String,
    /// Rows fetched per paginated query.
    pub chunk_size: usize,
    /// Maximum protocol lines per write request.
    pub max_lines_per_request: usize,
    /// Print encoded batches to stdout instead of writing to the target.
    pub dry_run: bool,
    /// How rows are grouped into output measurements.
    pub grouping: Grouping,
    /// Day bounds restricting the migration window.
    pub range: DateRange,
    /// Optional series whitelist file.
    pub whitelist: Option<PathBuf>,
}

impl MigrationConfig {
    /// Creates a config for migrating `bucket` with default options.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_lines_per_request: DEFAULT_MAX_LINES_PER_REQUEST,
            dry_run: false,
            grouping: Grouping::Native,
            range: DateRange::default(),
            whitelist: None,
        }
    }

    /// Sets the pagination chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the maximum number of lines per write request.
    #[must_use]
    pub fn with_max_lines_per_request(mut self, max_lines: usize) -> Self {
        self.max_lines_per_request = max_lines;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the grouping strategy.
    #[must_use]
    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Sets the migration date bounds.
    #[must_use]
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    /// Sets the series whitelist file.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: Option<PathBuf>) -> Self {
        self.whitelist = whitelist;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_explicit_wins() {
        let value = setting(Some("http://a:8086".to_string()), ENV_URL).unwrap();
        assert_eq!(value, "http://a:8086");
    }

    #[test]
    fn test_setting_missing() {
        let result = setting(None, "FLUXPORT_TEST_UNSET_SETTING");
        assert!(matches!(
            result,
            Err(ConfigError::MissingSetting {
                env_var: "FLUXPORT_TEST_UNSET_SETTING"
            })
        ));
    }

    #[test]
    fn test_setting_empty_explicit_is_missing() {
        let result = setting(Some(String::new()), "FLUXPORT_TEST_UNSET_SETTING");
        assert!(result.is_err());
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 31));
    }

    #[test]
    fn test_date_range_parse_rejects_malformed() {
        let result = DateRange::parse(Some("01/02/2024"), None);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDate { ref input, .. }) if input == "01/02/2024"
        ));

        let result = DateRange::parse(None, Some("2024-13-01"));
        assert!(result.is_err());
    }

    #[test]
    fn test_bounds_both_given_are_half_open_days() {
        let range = DateRange::parse(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        let (start, stop) = range.to_flux_bounds();
        assert_eq!(start, "2024-01-01T00:00:00Z");
        assert_eq!(stop, "2024-02-01T00:00:00Z");
    }

    #[test]
    fn test_bounds_start_only_is_open_ended() {
        let range = DateRange::parse(Some("2024-06-15"), None).unwrap();
        let (start, stop) = range.to_flux_bounds();
        assert_eq!(start, "2024-06-15T00:00:00Z");
        assert_eq!(stop, "now()");
    }

    #[test]
    fn test_bounds_default_lookback() {
        let (start, stop) = DateRange::default().to_flux_bounds();
        assert_eq!(start, "-100d");
        assert_eq!(stop, "now()");
    }

    #[test]
    fn test_migration_config_builder() {
        let config = MigrationConfig::new("home")
            .with_chunk_size(100)
            .with_max_lines_per_request(50)
            .with_dry_run(true)
            .with_grouping(Grouping::PivotedEntity)
            .with_whitelist(Some(PathBuf::from("whitelist.txt")));

        assert_eq!(config.bucket, "home");
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.max_lines_per_request, 50);
        assert!(config.dry_run);
        assert_eq!(config.grouping, Grouping::PivotedEntity);
        assert_eq!(config.whitelist, Some(PathBuf::from("whitelist.txt")));
    }

    #[test]
    fn test_migration_config_defaults() {
        let config = MigrationConfig::new("home");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.max_lines_per_request, DEFAULT_MAX_LINES_PER_REQUEST);
        assert!(!config.dry_run);
        assert_eq!(config.grouping, Grouping::Native);
        assert!(config.whitelist.is_none());
    }
}
