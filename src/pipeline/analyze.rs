// src/pipeline/analyze.rs

//! Offline scan of persisted YAML records for emissions coverage.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::{AppError, Result};
use crate::models::EpdRecord;
use crate::storage::yaml::load;

const SAMPLE_LIMIT: usize = 5;

const GWP_FIELDS: &[&str] = &[
    "gwp",
    "gwp_per_kg",
    "gwp_per_category_declared_unit",
    "best_practice",
    "conservative_estimate",
    "lowest_plausible_gwp",
    "uncertainty_adjusted_gwp",
    "standard_deviation",
    "gwp_z",
    "biogenic_embodied_carbon_z",
    "stored_carbon_z",
];

const CATEGORY_PERCENTILES: &[&str] = &[
    "pct10", "pct20", "pct30", "pct40", "pct50", "pct60", "pct70", "pct80", "pct90",
];

/// Record counts of one country or category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub total: usize,
    pub with_gwp: usize,
    pub with_impacts: usize,
    pub with_resources: usize,
}

impl Coverage {
    fn add(&mut self, facts: &RecordFacts) {
        self.total += 1;
        self.with_gwp += usize::from(facts.has_gwp);
        self.with_impacts += usize::from(facts.has_impacts);
        self.with_resources += usize::from(facts.has_resources);
    }
}

/// A record shown as an example in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub file: PathBuf,
    pub epd_id: String,
    pub category: String,
    pub values: Map<String, Value>,
}

/// Aggregate result of a scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub files_found: usize,
    pub unreadable: usize,
    pub totals: Coverage,
    pub impact_keys: BTreeMap<String, usize>,
    pub resource_keys: BTreeMap<String, usize>,
    pub gwp_fields: BTreeMap<String, usize>,
    pub by_country: BTreeMap<String, Coverage>,
    pub by_category: BTreeMap<String, Coverage>,
    pub samples_with_impacts: Vec<Sample>,
    pub samples_with_resources: Vec<Sample>,
}

struct RecordFacts {
    has_gwp: bool,
    has_impacts: bool,
    has_resources: bool,
}

/// Scans a products directory.
pub struct EmissionsAnalyzer {
    root: PathBuf,
    countries: HashSet<String>,
    max_files: Option<usize>,
}

impl EmissionsAnalyzer {
    /// `regions` are the configured region codes; the non-US ones name
    /// country directories.
    pub fn new(root: impl Into<PathBuf>, regions: &[String]) -> Self {
        let countries = regions
            .iter()
            .filter(|r| !r.starts_with("US-"))
            .cloned()
            .collect();
        Self {
            root: root.into(),
            countries,
            max_files: None,
        }
    }

    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    /// YAML files under the root, in name order.
    fn yaml_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("yaml"))
            .map(|e| e.into_path())
            .collect()
    }

    pub fn run(&self) -> Result<AnalysisReport> {
        if !self.root.is_dir() {
            return Err(AppError::validation(format!(
                "products directory not found: {}",
                self.root.display()
            )));
        }

        let mut files = self.yaml_files();
        let mut report = AnalysisReport {
            files_found: files.len(),
            ..AnalysisReport::default()
        };
        log::info!("Found {} EPD files to analyze", files.len());

        if let Some(limit) = self.max_files {
            files.truncate(limit);
            log::info!("Limiting analysis to the first {} files", limit);
        }

        for path in files {
            match load(&path) {
                Ok(record) => self.add(&mut report, &path, &record),
                Err(e) => {
                    log::debug!("Skipping {}: {}", path.display(), e);
                    report.unreadable += 1;
                }
            }
        }
        Ok(report)
    }

    fn add(&self, report: &mut AnalysisReport, path: &Path, record: &EpdRecord) {
        let impacts = record.impacts().filter(|m| !m.is_empty());
        let resources = record.resource_uses().filter(|m| !m.is_empty());
        let facts = RecordFacts {
            has_gwp: record.get("gwp").is_some_and(|v| !v.is_null()),
            has_impacts: impacts.is_some(),
            has_resources: resources.is_some(),
        };

        report.totals.add(&facts);
        if facts.has_gwp {
            for field in gwp_fields(record) {
                *report.gwp_fields.entry(field).or_default() += 1;
            }
        }

        let category = record
            .category_display_name()
            .unwrap_or("Unknown")
            .to_string();
        let epd_id = record.id().unwrap_or("Unknown").to_string();
        let sample = |values: &Map<String, Value>| Sample {
            file: path.to_path_buf(),
            epd_id: epd_id.clone(),
            category: category.clone(),
            values: values.clone(),
        };

        if let Some(impacts) = impacts {
            for key in impacts.keys() {
                *report.impact_keys.entry(key.clone()).or_default() += 1;
            }
            if report.samples_with_impacts.len() < SAMPLE_LIMIT {
                report.samples_with_impacts.push(sample(impacts));
            }
        }
        if let Some(resources) = resources {
            for key in resources.keys() {
                *report.resource_keys.entry(key.clone()).or_default() += 1;
            }
            if report.samples_with_resources.len() < SAMPLE_LIMIT {
                report.samples_with_resources.push(sample(resources));
            }
        }

        if let Some(country) = self.country_of(path) {
            report.by_country.entry(country).or_default().add(&facts);
        }
        report.by_category.entry(category).or_default().add(&facts);
    }

    /// First path component below the root naming a country.
    fn country_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().find_map(|c| {
            let part = c.as_os_str().to_str()?;
            if part == "US" || part.starts_with("US-") {
                Some("US".to_string())
            } else if self.countries.contains(part) {
                Some(part.to_string())
            } else {
                None
            }
        })
    }
}

/// GWP-related fields present on the record, category percentiles included.
/// Only counted for records that carry `gwp`.
fn gwp_fields(record: &EpdRecord) -> Vec<String> {
    let top = GWP_FIELDS
        .iter()
        .filter(|f| record.get(f).is_some_and(|v| !v.is_null()))
        .map(|f| f.to_string());
    let percentiles = CATEGORY_PERCENTILES
        .iter()
        .map(|pct| format!("{pct}_gwp"))
        .filter(|f| record.category_field(f).is_some())
        .map(|f| format!("category_{f}"));
    top.chain(percentiles).collect()
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn by_count(counts: &BTreeMap<String, usize>) -> Vec<(&String, &usize)> {
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    sorted
}

/// Log the report at info level.
pub fn log_report(report: &AnalysisReport) {
    let total = report.totals.total;
    log::info!("EPDs analyzed: {} ({} unreadable)", total, report.unreadable);
    log::info!(
        "With GWP: {} ({:.1}%), with impacts: {} ({:.1}%), with resource uses: {} ({:.1}%)",
        report.totals.with_gwp,
        percent(report.totals.with_gwp, total),
        report.totals.with_impacts,
        percent(report.totals.with_impacts, total),
        report.totals.with_resources,
        percent(report.totals.with_resources, total),
    );

    log::info!("GWP fields:");
    for (field, count) in by_count(&report.gwp_fields) {
        log::info!("  {}: {} ({:.1}%)", field, count, percent(*count, total));
    }

    if report.impact_keys.is_empty() {
        log::info!("No impact categories found");
    } else {
        log::info!("Impact categories:");
        for (key, count) in by_count(&report.impact_keys) {
            log::info!("  {}: {}", key, count);
        }
    }

    if report.resource_keys.is_empty() {
        log::info!("No resource use types found");
    } else {
        log::info!("Resource use types:");
        for (key, count) in by_count(&report.resource_keys) {
            log::info!("  {}: {}", key, count);
        }
    }

    log::info!("By country:");
    for (country, c) in &report.by_country {
        log::info!(
            "  {}: {} total, {} GWP, {} impacts, {} resources",
            country,
            c.total,
            c.with_gwp,
            c.with_impacts,
            c.with_resources
        );
    }

    let mut categories: Vec<_> = report.by_category.iter().collect();
    categories.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));
    log::info!("Top categories:");
    for (category, c) in categories.into_iter().take(15) {
        log::info!(
            "  {}: {} total, {} impacts, {} resources",
            category,
            c.total,
            c.with_impacts,
            c.with_resources
        );
    }
}

/// Write the report as pretty JSON.
pub fn save_report(report: &AnalysisReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(report)?)?;
    log::info!("Report saved to {}", path.display());
    Ok(())
}
