//! Storage abstractions for pulled records.
//!
//! ## Directory Structure (flat scheme)
//!
//! ```text
//! products-data/
//! ├── run_summary.json       # Counters of the last run
//! ├── US-ME.csv              # Non-cement rows, rewritten each run
//! ├── US-ME/
//! │   └── Cement.csv         # Cement rows, appended or replaced
//! ├── IN/
//! │   └── products.csv       # Tariff classification
//! └── US/
//!     └── Brick/
//!         └── <material_id>.yaml
//! ```

pub mod local;
pub mod paths;
pub mod yaml;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{EpdRecord, PersistMode, RunSummary};

// Re-export for convenience
pub use local::LocalStorage;

/// A row type with a fixed CSV header.
pub trait CsvRow: Serialize {
    const HEADER: &'static [&'static str];
}

/// Encoded CSV header and rows, kept apart so append mode can drop the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvPayload {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
    pub rows: usize,
}

impl CsvPayload {
    /// Encode `rows` with `R::HEADER` as the header line.
    pub fn encode<R: CsvRow>(rows: &[R]) -> Result<Self> {
        let header = {
            let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());
            wtr.write_record(R::HEADER)?;
            into_bytes(wtr)?
        };
        let body = {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(Vec::new());
            for row in rows {
                wtr.serialize(row)?;
            }
            into_bytes(wtr)?
        };
        Ok(Self {
            header,
            body,
            rows: rows.len(),
        })
    }
}

fn into_bytes(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    wtr.into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

/// Trait for record storage backends.
#[async_trait]
pub trait EpdStorage: Send + Sync {
    /// Write one record as YAML under the directory its region, postal code
    /// and category map to. Returns the file written.
    async fn persist_record(&self, region: &str, record: &EpdRecord) -> Result<PathBuf>;

    /// Write YAML at `key` only if nothing exists there yet. Returns whether it wrote.
    async fn persist_if_absent(&self, key: &str, value: &Value) -> Result<bool>;

    /// Write a CSV file at `key`. `Append` keeps existing rows and writes the
    /// header only for a new file; `Replace` truncates.
    async fn write_csv(&self, key: &str, payload: &CsvPayload, mode: PersistMode) -> Result<PathBuf>;

    /// Write the header-only CSV at `key` if the file does not exist.
    async fn ensure_csv(&self, key: &str, payload: &CsvPayload) -> Result<()>;

    /// Write the run summary.
    async fn write_summary(&self, summary: &RunSummary) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Pair {
        #[serde(rename = "A")]
        a: String,
        #[serde(rename = "B")]
        b: Option<f64>,
    }

    impl CsvRow for Pair {
        const HEADER: &'static [&'static str] = &["A", "B"];
    }

    #[test]
    fn test_encode_splits_header_and_body() {
        let payload = CsvPayload::encode(&[
            Pair {
                a: "x, y".into(),
                b: Some(1.5),
            },
            Pair {
                a: "z".into(),
                b: None,
            },
        ])
        .unwrap();

        assert_eq!(payload.header, b"A,B\n");
        assert_eq!(
            String::from_utf8(payload.body).unwrap(),
            "\"x, y\",1.5\nz,\n"
        );
        assert_eq!(payload.rows, 2);
    }

    #[test]
    fn test_encode_empty_keeps_header() {
        let payload = CsvPayload::encode::<Pair>(&[]).unwrap();
        assert_eq!(payload.header, b"A,B\n");
        assert!(payload.body.is_empty());
    }
}
