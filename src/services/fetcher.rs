// src/services/fetcher.rs

//! Paginated EPD fetcher.
//!
//! Discovers the page count for a region, then walks the pages in order with
//! bounded retry. A failed page is logged and skipped; it never aborts the
//! region.
//!
//! ## Page states
//!
//! ```text
//! Requesting ──200──────────────▶ Success
//!     │──429 / timeout / network─▶ backoff 2^attempt + offset ─▶ Requesting
//!     │──other status────────────▶ Rejected (page skipped)
//!     └──attempts exhausted──────▶ Skipped
//! ```

use crate::error::{AppError, Result};
use crate::models::{EpdRecord, FetchConfig};
use crate::services::api::{ApiResponse, EpdApi, PageQuery, rejected};

/// Everything retrieved for one region.
#[derive(Debug, Default)]
pub struct RegionFetch {
    /// Records in page order
    pub records: Vec<EpdRecord>,
    /// Page count declared by the server
    pub total_pages: u32,
    /// Pages skipped after rejection or exhausted retries
    pub failed_pages: Vec<u32>,
    /// Retried attempts across all pages
    pub retries: u32,
    /// The page-count request itself failed
    pub discovery_failed: bool,
}

/// Result of a single attempt at a page.
enum Attempt {
    Success(Vec<EpdRecord>),
    RateLimited,
    Transient(AppError),
    Rejected(AppError),
}

/// Walks every page of the listing for a region.
pub struct PaginatedFetcher<'a> {
    api: &'a dyn EpdApi,
    config: &'a FetchConfig,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(api: &'a dyn EpdApi, config: &'a FetchConfig) -> Self {
        Self { api, config }
    }

    /// Fetch all pages for `region`. Missing pages are reported, not raised.
    pub async fn fetch_all(&self, region: &str) -> RegionFetch {
        let mut fetch = RegionFetch::default();

        let total_pages = match self.discover_pages(region).await {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Page count request for {} failed: {}", region, e);
                fetch.discovery_failed = true;
                return fetch;
            }
        };
        if total_pages == 0 {
            log::info!("No data found for {}", region);
            return fetch;
        }

        log::info!("Found {} pages for {}", total_pages, region);
        fetch.total_pages = total_pages;

        for page in 1..=total_pages {
            match self.fetch_page(region, page, &mut fetch.retries).await {
                Ok(records) => {
                    log::debug!("{} page {}: {} records", region, page, records.len());
                    fetch.records.extend(records);
                }
                Err(e) => {
                    log::warn!("Skipping {} page {}: {}", region, page, e);
                    fetch.failed_pages.push(page);
                }
            }

            if total_pages > 10 && page % 10 == 0 {
                log::info!("Progress: {}/{} pages fetched for {}", page, total_pages, region);
            }
            if page < total_pages {
                tokio::time::sleep(self.config.page_delay()).await;
            }
        }

        log::info!(
            "Fetched {} EPDs for {} ({} of {} pages failed)",
            fetch.records.len(),
            region,
            fetch.failed_pages.len(),
            total_pages
        );
        fetch
    }

    /// Page count from the `X-Total-Pages` header; absent means zero.
    async fn discover_pages(&self, region: &str) -> Result<u32> {
        let query = PageQuery {
            region: Some(region),
            page_size: self.config.page_size,
            page_number: None,
        };
        let response = self.api.list(&query).await?;
        if !response.is_success() {
            return Err(rejected(&response));
        }
        Ok(response.total_pages.unwrap_or(0))
    }

    /// Fetch one page, retrying rate limits and transient failures.
    async fn fetch_page(&self, region: &str, page: u32, retries: &mut u32) -> Result<Vec<EpdRecord>> {
        let max = self.config.max_retries;
        for attempt in 0..max {
            match self.attempt(region, page).await {
                Attempt::Success(records) => return Ok(records),
                Attempt::Rejected(e) => return Err(e),
                Attempt::RateLimited => {
                    log::warn!("Rate limit exceeded for {} page {}", region, page);
                }
                Attempt::Transient(e) => {
                    log::warn!("Request error for {} page {}: {}", region, page, e);
                }
            }

            if attempt + 1 < max {
                *retries += 1;
                let delay = self.config.backoff(attempt);
                log::debug!("Retrying {} page {} in {:?}", region, page, delay);
                tokio::time::sleep(delay).await;
            }
        }
        Err(AppError::transient(format!(
            "gave up after {max} attempts"
        )))
    }

    async fn attempt(&self, region: &str, page: u32) -> Attempt {
        let query = PageQuery {
            region: Some(region),
            page_size: self.config.page_size,
            page_number: Some(page),
        };
        match self.api.list(&query).await {
            Ok(response) => classify(response),
            Err(e) if e.is_transient() => Attempt::Transient(e),
            Err(e) => Attempt::Rejected(e),
        }
    }
}

fn classify(response: ApiResponse) -> Attempt {
    if response.is_rate_limited() {
        return Attempt::RateLimited;
    }
    if !response.is_success() {
        return Attempt::Rejected(rejected(&response));
    }
    match response.records() {
        Ok(records) => Attempt::Success(records),
        Err(e) => Attempt::Rejected(e),
    }
}
