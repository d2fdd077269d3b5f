// src/services/lookup.rs

//! Secondary-source lookup by identifier.
//!
//! openEPD has no direct id lookup, so the first pages of its listing are
//! scanned for a record whose `id`, `material_id` or `open_xpd_uuid` equals
//! the wanted id.

use std::time::Duration;

use crate::error::Result;
use crate::models::{EpdRecord, FetchConfig, LookupConfig};
use crate::services::api::{EpdApi, PageQuery};

/// Scans a listing for one record.
pub struct SecondaryLookup<'a> {
    api: &'a dyn EpdApi,
    config: &'a LookupConfig,
    fetch: &'a FetchConfig,
}

impl<'a> SecondaryLookup<'a> {
    pub fn new(api: &'a dyn EpdApi, config: &'a LookupConfig, fetch: &'a FetchConfig) -> Self {
        Self { api, config, fetch }
    }

    /// Find the record carrying `id` in any identifier field.
    ///
    /// Stops early on a short page. Pages that keep failing are skipped.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<EpdRecord>> {
        for page in 1..=self.config.max_pages {
            match self.scan_page(page, id).await {
                PageScan::Found(record) => return Ok(Some(record)),
                PageScan::LastPage => return Ok(None),
                PageScan::NotHere | PageScan::Failed => {}
            }
            tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
        }
        log::info!(
            "{} not found in the first {} lookup pages",
            id,
            self.config.max_pages
        );
        Ok(None)
    }

    async fn scan_page(&self, page: u32, id: &str) -> PageScan {
        let query = PageQuery {
            region: None,
            page_size: self.config.page_size,
            page_number: Some(page),
        };

        for attempt in 0..self.config.max_retries {
            let last = attempt + 1 == self.config.max_retries;
            match self.api.list(&query).await {
                Ok(response) if response.is_success() => {
                    let records = match response.records() {
                        Ok(records) => records,
                        Err(e) => {
                            log::warn!("Lookup page {} unreadable: {}", page, e);
                            return PageScan::Failed;
                        }
                    };
                    let short = records.len() < self.config.page_size as usize;
                    if let Some(found) = records.into_iter().find(|r| carries_id(r, id)) {
                        return PageScan::Found(found);
                    }
                    return if short {
                        PageScan::LastPage
                    } else {
                        PageScan::NotHere
                    };
                }
                Ok(response) if response.is_rate_limited() => {
                    if last {
                        log::warn!("Lookup page {} still rate limited", page);
                        return PageScan::Failed;
                    }
                    tokio::time::sleep(self.fetch.backoff(attempt)).await;
                }
                Ok(response) => {
                    log::warn!("Lookup page {} rejected with {}", page, response.status);
                    return PageScan::Failed;
                }
                Err(e) => {
                    log::warn!("Lookup page {} failed: {}", page, e);
                    if last || !e.is_transient() {
                        return PageScan::Failed;
                    }
                    tokio::time::sleep(self.fetch.backoff(attempt)).await;
                }
            }
        }
        PageScan::Failed
    }
}

enum PageScan {
    Found(EpdRecord),
    NotHere,
    LastPage,
    Failed,
}

fn carries_id(record: &EpdRecord, id: &str) -> bool {
    [record.id(), record.material_id(), record.open_xpd_uuid()]
        .into_iter()
        .flatten()
        .any(|candidate| candidate == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{Scripted, ScriptedApi, records};
    use serde_json::json;

    fn full_page(page: u32, size: usize) -> Vec<serde_json::Value> {
        records(page, size)
    }

    #[tokio::test(start_paused = true)]
    async fn test_finds_record_on_later_page() {
        let config = LookupConfig {
            page_size: 3,
            ..LookupConfig::default()
        };
        let fetch = FetchConfig::default();
        let mut page2 = full_page(2, 2);
        page2.push(json!({"id": "x", "open_xpd_uuid": "ec3-wanted", "impacts": {"odp": 1}}));
        let api = ScriptedApi::new(None)
            .with_page(1, full_page(1, 3))
            .with_page(2, page2);

        let found = SecondaryLookup::new(&api, &config, &fetch)
            .find_by_id("ec3-wanted")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id(), Some("x"));
        assert_eq!(api.page_calls(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_page_ends_search() {
        let config = LookupConfig {
            page_size: 3,
            ..LookupConfig::default()
        };
        let fetch = FetchConfig::default();
        let api = ScriptedApi::new(None)
            .with_page(1, full_page(1, 3))
            .with_page(2, full_page(2, 1));

        let found = SecondaryLookup::new(&api, &config, &fetch)
            .find_by_id("missing")
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(api.page_calls(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried_then_found() {
        let config = LookupConfig::default();
        let fetch = FetchConfig::default();
        let api = ScriptedApi::new(None)
            .with_page(1, full_page(1, 1))
            .with_script(1, vec![Scripted::Status(429)]);

        let found = SecondaryLookup::new(&api, &config, &fetch)
            .find_by_id("p1-0")
            .await
            .unwrap();

        assert!(found.is_some());
        assert_eq!(api.page_calls(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_bounded() {
        let config = LookupConfig {
            max_pages: 2,
            page_size: 1,
            ..LookupConfig::default()
        };
        let fetch = FetchConfig::default();
        let api = ScriptedApi::new(None)
            .with_page(1, full_page(1, 1))
            .with_page(2, full_page(2, 1))
            .with_page(3, full_page(3, 1));

        let found = SecondaryLookup::new(&api, &config, &fetch)
            .find_by_id("p3-0")
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(api.page_calls(), vec![1, 2]);
    }
}
