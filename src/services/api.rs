// src/services/api.rs

//! EPD listing endpoint.
//!
//! The fetcher only sees the `EpdApi` trait; `HttpEpdApi` is the reqwest
//! implementation used against EC3 and openEPD.

use async_trait::async_trait;
use reqwest::{Client, header::AUTHORIZATION};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::EpdRecord;
use crate::utils::http::endpoint;

/// Response header carrying the page count.
pub const TOTAL_PAGES_HEADER: &str = "X-Total-Pages";

/// One listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery<'a> {
    /// `plant_geography` filter; absent for unfiltered lookups
    pub region: Option<&'a str>,
    pub page_size: u32,
    /// Absent on the page-count discovery request
    pub page_number: Option<u32>,
}

/// Raw listing response: status, page count and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub total_pages: Option<u32>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Parse the body as a JSON array of records.
    pub fn records(&self) -> Result<Vec<EpdRecord>> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Paginated EPD listing.
#[async_trait]
pub trait EpdApi: Send + Sync {
    /// Issue one listing request. Network failures and timeouts are `Err`;
    /// every HTTP status, including errors, is an `Ok` response.
    async fn list(&self, query: &PageQuery<'_>) -> Result<ApiResponse>;
}

/// reqwest-backed listing client carrying a bearer token.
#[derive(Clone)]
pub struct HttpEpdApi {
    client: Client,
    url: Url,
    authorization: String,
}

impl HttpEpdApi {
    /// Listing client for `{base_url}/epds`.
    pub fn new(client: Client, base_url: &str, authorization: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            url: endpoint(base_url, "epds")?,
            authorization: authorization.into(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EpdApi for HttpEpdApi {
    async fn list(&self, query: &PageQuery<'_>) -> Result<ApiResponse> {
        let mut params: Vec<(&str, String)> = Vec::with_capacity(3);
        if let Some(region) = query.region {
            params.push(("plant_geography", region.to_string()));
        }
        params.push(("page_size", query.page_size.to_string()));
        if let Some(page) = query.page_number {
            params.push(("page_number", page.to_string()));
        }

        let response = self
            .client
            .get(self.url.clone())
            .header(AUTHORIZATION, &self.authorization)
            .query(&params)
            .send()
            .await?;

        let status = response.status().as_u16();
        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_total_pages);
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            total_pages,
            body,
        })
    }
}

/// Parse an `X-Total-Pages` value; garbage counts as absent.
pub fn parse_total_pages(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

/// Error for a listing response that will not be retried.
pub(crate) fn rejected(response: &ApiResponse) -> AppError {
    let body: String = response.body.chars().take(200).collect();
    AppError::permanent(response.status, body)
}
