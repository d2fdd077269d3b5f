// src/pipeline/pull.rs

//! The fetch-and-persist pipeline.
//!
//! Regions are processed one at a time: fetch every page, strip nulls, write
//! one YAML per record, then the tariff and product CSVs. Per-record and
//! per-file failures are counted in the region's stats and never abort the
//! run.

use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, EpdRecord, PersistMode, RegionStats, RunSummary};
use crate::services::{EpdApi, PaginatedFetcher};
use crate::storage::yaml::yaml_file_name;
use crate::storage::{CsvPayload, EpdStorage};

use super::project::{ProductRow, project};
use super::tariff::{empty_payload, tariff_payload};

/// Runs the pipeline over a list of regions.
pub struct PullRunner<'a> {
    config: &'a Config,
    api: &'a dyn EpdApi,
    storage: &'a dyn EpdStorage,
    mirror: Option<&'a dyn EpdStorage>,
}

impl<'a> PullRunner<'a> {
    pub fn new(config: &'a Config, api: &'a dyn EpdApi, storage: &'a dyn EpdStorage) -> Self {
        Self {
            config,
            api,
            storage,
            mirror: None,
        }
    }

    /// Also write cement rows to a second store.
    pub fn with_mirror(mut self, mirror: Option<&'a dyn EpdStorage>) -> Self {
        self.mirror = mirror;
        self
    }

    /// Process `regions` in order and write the run summary.
    pub async fn run(&self, regions: &[String]) -> Result<RunSummary> {
        let start_time = Utc::now();
        let total = regions.len();
        log::info!("Starting processing of {} regions", total);

        let mut stats = Vec::with_capacity(total);
        for (idx, region) in regions.iter().enumerate() {
            log::info!("[{}/{}] Fetching and processing: {}", idx + 1, total, region);
            let region_stats = self.process_region(region).await;
            if region_stats.records > 0 {
                log::info!(
                    "Completed {}: {} EPDs, {} YAML files written",
                    region,
                    region_stats.records,
                    region_stats.yaml_written
                );
            } else {
                log::info!("Skipped {}: no data available", region);
            }
            stats.push(region_stats);

            if idx + 1 < total {
                tokio::time::sleep(self.config.fetch.region_delay()).await;
            }
        }

        let summary = RunSummary {
            start_time,
            end_time: Utc::now(),
            regions: stats,
        };
        self.storage.write_summary(&summary).await?;
        log::info!(
            "All regions processed: {} EPDs{}",
            summary.record_count(),
            if summary.is_partial() { " (partial)" } else { "" }
        );
        Ok(summary)
    }

    async fn process_region(&self, region: &str) -> RegionStats {
        let fetch = PaginatedFetcher::new(self.api, &self.config.fetch)
            .fetch_all(region)
            .await;

        let mut stats = RegionStats {
            region: region.to_string(),
            total_pages: fetch.total_pages,
            failed_pages: fetch.failed_pages,
            discovery_failed: fetch.discovery_failed,
            retries: fetch.retries,
            records: fetch.records.len(),
            ..RegionStats::default()
        };
        if fetch.records.is_empty() {
            return stats;
        }

        let records: Vec<EpdRecord> = fetch
            .records
            .into_iter()
            .map(EpdRecord::without_nulls)
            .collect();

        self.persist_records(region, &records, &mut stats).await;
        self.write_tariff(region, &records, &mut stats).await;
        self.write_products(region, &records, &mut stats).await;
        stats
    }

    async fn persist_records(&self, region: &str, records: &[EpdRecord], stats: &mut RegionStats) {
        for record in records {
            match self.storage.persist_record(region, record).await {
                Ok(path) => {
                    log::debug!("Saved {}", path.display());
                    stats.yaml_written += 1;
                }
                Err(e) => {
                    log::warn!("Failed to save EPD in {}: {}", region, e);
                    stats.persistence_failures += 1;
                }
            }
        }
    }

    /// Tariff CSV for the tariff region; other regions only make sure the
    /// tariff file exists.
    async fn write_tariff(&self, region: &str, records: &[EpdRecord], stats: &mut RegionStats) {
        let tariff = &self.config.tariff;
        let key = format!("{}/products.csv", tariff.region);

        let result: Result<()> = async {
            if region == tariff.region {
                let payload = tariff_payload(records, tariff)?;
                stats.tariff_rows = payload.rows;
                self.storage
                    .write_csv(&key, &payload, PersistMode::Replace)
                    .await?;
            } else {
                self.storage
                    .ensure_csv(&key, &empty_payload(tariff.layout)?)
                    .await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            log::warn!("Failed to write {}: {}", key, e);
            stats.persistence_failures += 1;
        }
    }

    async fn write_products(&self, region: &str, records: &[EpdRecord], stats: &mut RegionStats) {
        let projection = project(records, &self.config.csv.cement_keyword);
        stats.other_rows = projection.others.len();
        stats.cement_rows = projection.cement.len();

        let others_key = format!("{region}.csv");
        if let Err(e) = self
            .write_rows(self.storage, &others_key, &projection.others, PersistMode::Replace)
            .await
        {
            log::warn!("Failed to write {}: {}", others_key, e);
            stats.persistence_failures += 1;
        }

        if projection.cement.is_empty() {
            return;
        }

        let cement_key = format!("{region}/Cement.csv");
        let mode = self.config.csv.cement_mode;
        if let Err(e) = self
            .write_rows(self.storage, &cement_key, &projection.cement, mode)
            .await
        {
            log::warn!("Failed to write {}: {}", cement_key, e);
            stats.persistence_failures += 1;
        }

        if let Some(mirror) = self.mirror {
            if let Err(e) = self
                .mirror_cement(mirror, region, &cement_key, &projection.cement, mode)
                .await
            {
                log::warn!("Failed to mirror cement rows for {}: {}", region, e);
                stats.persistence_failures += 1;
            }
        }
    }

    async fn write_rows(
        &self,
        storage: &dyn EpdStorage,
        key: &str,
        rows: &[ProductRow],
        mode: PersistMode,
    ) -> Result<()> {
        let payload = CsvPayload::encode(rows)?;
        let path = storage.write_csv(key, &payload, mode).await?;
        log::debug!("Wrote {} rows to {}", payload.rows, path.display());
        Ok(())
    }

    /// Cement CSV plus one minimal YAML per row that has a usable key.
    /// Existing YAML files are kept.
    async fn mirror_cement(
        &self,
        mirror: &dyn EpdStorage,
        region: &str,
        cement_key: &str,
        rows: &[ProductRow],
        mode: PersistMode,
    ) -> Result<()> {
        self.write_rows(mirror, cement_key, rows, mode).await?;
        for row in rows {
            let Some(file_name) = row.file_key().and_then(yaml_file_name) else {
                continue;
            };
            let value = serde_json::to_value(row)?;
            mirror
                .persist_if_absent(&format!("{region}/{file_name}"), &value)
                .await?;
        }
        Ok(())
    }
}

/// Run the pipeline over the configured regions.
pub async fn run_pull(
    config: &Config,
    api: &dyn EpdApi,
    storage: &dyn EpdStorage,
    mirror: Option<&dyn EpdStorage>,
) -> Result<RunSummary> {
    PullRunner::new(config, api, storage)
        .with_mirror(mirror)
        .run(&config.regions)
        .await
}
