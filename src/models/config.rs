//! Application configuration structures.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::IndicatorTables;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Region codes to pull, in order (`US-XX` or a country code)
    #[serde(default = "defaults::regions")]
    pub regions: Vec<String>,

    /// API endpoints and HTTP client settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pagination, retry and throttling settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Secondary (openEPD) lookup settings
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Output layout
    #[serde(default)]
    pub output: OutputConfig,

    /// CSV projection settings
    #[serde(default)]
    pub csv: CsvConfig,

    /// Tariff classification table
    #[serde(default)]
    pub tariff: TariffConfig,

    /// Where credentials come from
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Canonical indicator synonym tables
    #[serde(default)]
    pub indicators: IndicatorTables,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(&path) {
            Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::warn!("Config {:?} not found. Using defaults.", path.as_ref());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(AppError::validation("No regions defined"));
        }
        if let Some(region) = self.regions.iter().find(|r| r.trim().is_empty()) {
            return Err(AppError::validation(format!(
                "Region code {region:?} is empty"
            )));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.api.base_url)?;
        url::Url::parse(&self.api.openepd_base_url)?;
        if self.fetch.page_size == 0 {
            return Err(AppError::validation("fetch.page_size must be > 0"));
        }
        if self.fetch.max_retries == 0 {
            return Err(AppError::validation("fetch.max_retries must be > 0"));
        }
        if self.lookup.max_pages == 0 || self.lookup.page_size == 0 {
            return Err(AppError::validation(
                "lookup.max_pages and lookup.page_size must be > 0",
            ));
        }
        if self.output.root.trim().is_empty() {
            return Err(AppError::validation("output.root is empty"));
        }
        if self.csv.cement_keyword.trim().is_empty() {
            return Err(AppError::validation("csv.cement_keyword is empty"));
        }
        if let Some(entry) = self.tariff.keywords.iter().find(|k| k.keyword.trim().is_empty()) {
            return Err(AppError::validation(format!(
                "tariff keyword with {}% has no text",
                entry.percent
            )));
        }
        self.indicators.validate()
    }

    /// Output root as a path.
    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(&self.output.root)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: defaults::regions(),
            api: ApiConfig::default(),
            fetch: FetchConfig::default(),
            lookup: LookupConfig::default(),
            output: OutputConfig::default(),
            csv: CsvConfig::default(),
            tariff: TariffConfig::default(),
            credentials: CredentialsConfig::default(),
            indicators: IndicatorTables::default(),
        }
    }
}

/// API endpoints and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// EC3 API root (login and EPD listing live under it)
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// openEPD API root, used for secondary lookups
    #[serde(default = "defaults::openepd_base_url")]
    pub openepd_base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            openepd_base_url: defaults::openepd_base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Pagination, retry and throttling settings for the EPD listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Records per page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Attempts per page before it is skipped
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Constant added to the exponential backoff, in seconds
    #[serde(default = "defaults::backoff_offset")]
    pub backoff_offset_secs: u64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Delay between regions in seconds
    #[serde(default = "defaults::region_delay")]
    pub region_delay_secs: u64,
}

impl FetchConfig {
    /// Backoff before retrying after the given 0-based attempt: `2^attempt + offset` seconds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt);
        Duration::from_secs(exp.saturating_add(self.backoff_offset_secs))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn region_delay(&self) -> Duration {
        Duration::from_secs(self.region_delay_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            max_retries: defaults::max_retries(),
            backoff_offset_secs: defaults::backoff_offset(),
            page_delay_ms: defaults::page_delay(),
            region_delay_secs: defaults::region_delay(),
        }
    }
}

/// Settings for searching the openEPD listing by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Pages scanned before giving up
    #[serde(default = "defaults::lookup_pages")]
    pub max_pages: u32,

    /// Records per lookup page
    #[serde(default = "defaults::lookup_page_size")]
    pub page_size: u32,

    /// Attempts per lookup page
    #[serde(default = "defaults::lookup_retries")]
    pub max_retries: u32,

    /// Delay between lookup pages in milliseconds
    #[serde(default = "defaults::lookup_delay")]
    pub page_delay_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::lookup_pages(),
            page_size: defaults::lookup_page_size(),
            max_retries: defaults::lookup_retries(),
            page_delay_ms: defaults::lookup_delay(),
        }
    }
}

/// Directory layout used for per-record YAML files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathScheme {
    /// `US/<category>` for US states, `<country>/<category>` otherwise
    #[default]
    Flat,
    /// `<region>/<zip prefix>/<zip suffix>/<category>`
    ZipBucketed,
}

/// Output layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for YAML and CSV output
    #[serde(default = "defaults::output_root")]
    pub root: String,

    /// Directory scheme for YAML files
    #[serde(default)]
    pub path_scheme: PathScheme,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: defaults::output_root(),
            path_scheme: PathScheme::default(),
        }
    }
}

/// How a CSV file is written when it already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Append rows; header only when the file is new
    #[default]
    Append,
    /// Truncate and rewrite header and rows
    Replace,
}

/// CSV projection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Write mode for the per-region cement file
    #[serde(default)]
    pub cement_mode: PersistMode,

    /// Case-insensitive category substring that selects the cement track
    #[serde(default = "defaults::cement_keyword")]
    pub cement_keyword: String,

    /// Optional second location receiving cement CSVs and minimal YAMLs
    #[serde(default)]
    pub cement_mirror_dir: Option<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            cement_mode: PersistMode::default(),
            cement_keyword: defaults::cement_keyword(),
            cement_mirror_dir: None,
        }
    }
}

/// Column set of the tariff CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TariffLayout {
    /// `region1, region2, category_id, tariff_percent`
    #[default]
    Compact,
    /// Compact columns plus keyword, identifiers and location
    Highlight,
}

/// A keyword and the tariff it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffKeyword {
    pub keyword: String,
    pub percent: u32,
}

/// Tariff classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    /// Region whose records are classified
    #[serde(default = "defaults::tariff_region")]
    pub region: String,

    /// Value written to the `region2` column
    #[serde(default = "defaults::tariff_counterpart")]
    pub counterpart_region: String,

    /// Column layout
    #[serde(default)]
    pub layout: TariffLayout,

    /// Ordered keyword table; the first keyword found wins
    #[serde(default = "defaults::tariff_keywords")]
    pub keywords: Vec<TariffKeyword>,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            region: defaults::tariff_region(),
            counterpart_region: defaults::tariff_counterpart(),
            layout: TariffLayout::default(),
            keywords: defaults::tariff_keywords(),
        }
    }
}

/// Names of the environment variables holding the login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "defaults::email_env")]
    pub email_env: String,

    #[serde(default = "defaults::password_env")]
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            email_env: defaults::email_env(),
            password_env: defaults::password_env(),
        }
    }
}

mod defaults {
    use super::TariffKeyword;

    const US_STATES: [&str; 51] = [
        "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
        "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
        "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
        "VA", "WA", "WV", "WI", "WY", "DC",
    ];
    const COUNTRIES: [&str; 7] = ["IN", "GB", "DE", "NL", "CA", "MX", "CN"];

    pub fn regions() -> Vec<String> {
        US_STATES
            .iter()
            .map(|s| format!("US-{s}"))
            .chain(COUNTRIES.iter().map(|c| c.to_string()))
            .collect()
    }

    // API defaults
    pub fn base_url() -> String {
        "https://buildingtransparency.org/api".into()
    }
    pub fn openepd_base_url() -> String {
        "https://openepd.buildingtransparency.org/api".into()
    }
    pub fn user_agent() -> String {
        "epd-pull/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Fetch defaults
    pub fn page_size() -> u32 {
        250
    }
    pub fn max_retries() -> u32 {
        5
    }
    pub fn backoff_offset() -> u64 {
        5
    }
    pub fn page_delay() -> u64 {
        1000
    }
    pub fn region_delay() -> u64 {
        10
    }

    // Lookup defaults
    pub fn lookup_pages() -> u32 {
        10
    }
    pub fn lookup_page_size() -> u32 {
        100
    }
    pub fn lookup_retries() -> u32 {
        3
    }
    pub fn lookup_delay() -> u64 {
        500
    }

    // Output defaults
    pub fn output_root() -> String {
        "products-data".into()
    }
    pub fn cement_keyword() -> String {
        "cement".into()
    }

    // Tariff defaults
    pub fn tariff_region() -> String {
        "IN".into()
    }
    pub fn tariff_counterpart() -> String {
        "US".into()
    }
    pub fn tariff_keywords() -> Vec<TariffKeyword> {
        [
            ("kitchen cabinet", 50),
            ("kitchen cabinets", 50),
            ("bathroom vanity", 50),
            ("bathroom vanities", 50),
            ("upholstered furniture", 30),
            ("furniture", 30),
            ("tables", 30),
            ("wardrobes", 30),
        ]
        .into_iter()
        .map(|(keyword, percent)| TariffKeyword {
            keyword: keyword.to_string(),
            percent,
        })
        .collect()
    }

    // Credential defaults
    pub fn email_env() -> String {
        "EC3_EMAIL".into()
    }
    pub fn password_env() -> String {
        "EC3_PASSWORD".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_regions_cover_states_and_countries() {
        let config = Config::default();
        assert_eq!(config.regions.len(), 58);
        assert_eq!(config.regions.first().map(String::as_str), Some("US-AL"));
        assert!(config.regions.iter().any(|r| r == "US-DC"));
        assert_eq!(config.regions.last().map(String::as_str), Some("CN"));
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.fetch.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_regions() {
        let mut config = Config::default();
        config.regions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_is_exponential_plus_offset() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.backoff(0), Duration::from_secs(6));
        assert_eq!(fetch.backoff(1), Duration::from_secs(7));
        assert_eq!(fetch.backoff(4), Duration::from_secs(21));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.regions.len(), 58);
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "regions = [\"US-ME\"\n[fetch]\npage_size = 10\n").unwrap();

        assert!(matches!(
            Config::load_or_default(&path),
            Err(AppError::Toml(_))
        ));
    }

    #[test]
    fn existing_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.toml");
        fs::write(&path, "regions = [\"US-ME\"]\n").unwrap();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.regions, vec!["US-ME"]);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            regions = ["US-ME", "IN"]

            [output]
            root = "out"
            path_scheme = "zip_bucketed"

            [csv]
            cement_mode = "replace"
            "#,
        )
        .unwrap();

        assert_eq!(config.regions, vec!["US-ME", "IN"]);
        assert_eq!(config.output.path_scheme, PathScheme::ZipBucketed);
        assert_eq!(config.csv.cement_mode, PersistMode::Replace);
        assert_eq!(config.fetch.page_size, 250);
        assert_eq!(config.tariff.keywords.len(), 8);
        assert!(config.validate().is_ok());
    }
}
