// src/models/mod.rs

//! Domain models for the pull pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod credentials;
mod epd;
mod indicators;

// Re-export all public types
pub use config::{
    ApiConfig, Config, CredentialsConfig, CsvConfig, FetchConfig, LookupConfig, OutputConfig,
    PathScheme, PersistMode, TariffConfig, TariffKeyword, TariffLayout,
};
pub use credentials::{CredentialProvider, Credentials, EnvCredentials};
pub use epd::EpdRecord;
pub use indicators::{
    Canonical, IndicatorTables, LciaCategory, ResourceIndicator, SynonymEntry, match_indicators,
};

/// Counters for one region of a pull run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RegionStats {
    pub region: String,
    pub total_pages: u32,
    pub failed_pages: Vec<u32>,
    pub discovery_failed: bool,
    pub retries: u32,
    pub records: usize,
    pub yaml_written: usize,
    pub cement_rows: usize,
    pub other_rows: usize,
    pub tariff_rows: usize,
    pub persistence_failures: usize,
}

impl RegionStats {
    /// Whether anything was lost for this region.
    pub fn is_partial(&self) -> bool {
        self.discovery_failed || !self.failed_pages.is_empty() || self.persistence_failures > 0
    }
}

/// Summary of a pull run, written as `run_summary.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunSummary {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub regions: Vec<RegionStats>,
}

impl RunSummary {
    pub fn record_count(&self) -> usize {
        self.regions.iter().map(|r| r.records).sum()
    }

    pub fn is_partial(&self) -> bool {
        self.regions.iter().any(RegionStats::is_partial)
    }
}
