//! Service layer for the pull pipeline.
//!
//! This module contains the network-facing logic:
//! - Login (`AuthClient`)
//! - EPD listing (`EpdApi`, `HttpEpdApi`)
//! - Paginated retrieval with retry (`PaginatedFetcher`)
//! - Secondary lookup by id (`SecondaryLookup`)

pub mod api;
mod auth;
mod fetcher;
mod lookup;
#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiResponse, EpdApi, HttpEpdApi, PageQuery};
pub use auth::{AuthClient, parse_login_response};
pub use fetcher::{PaginatedFetcher, RegionFetch};
pub use lookup::SecondaryLookup;
