//! Pipeline entry points.
//!
//! - `run_pull`: fetch every configured region and persist YAML and CSV files
//! - `merge`: combine a record with its counterpart from a second source
//! - `EmissionsAnalyzer`: report indicator coverage of persisted records

pub mod analyze;
pub mod merge;
pub mod project;
pub mod pull;
pub mod tariff;

pub use analyze::{AnalysisReport, EmissionsAnalyzer};
pub use merge::{compare_records, match_ids, merge, should_fetch_secondary};
pub use pull::{PullRunner, run_pull};
