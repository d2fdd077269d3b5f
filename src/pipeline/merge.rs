// src/pipeline/merge.rs

//! Cross-API merge of one record with its counterpart from a second source.
//!
//! The primary record always wins where it has a truthy value; the secondary
//! only fills gaps inside `impacts` and `resource_uses`.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::models::{Canonical, EpdRecord, IndicatorTables, match_indicators};
use crate::utils::is_truthy;

pub const IMPACTS: &str = "impacts";
pub const RESOURCE_USES: &str = "resource_uses";
pub const DATA_SOURCES: &str = "_data_sources";

const ID_FIELDS: [&str; 3] = ["id", "material_id", "open_xpd_uuid"];

/// Merge `secondary` into `primary`.
///
/// With no secondary the primary is returned unchanged. Otherwise the
/// result carries a `_data_sources` entry telling which sub-mappings the
/// secondary contributed to.
pub fn merge(primary: &EpdRecord, secondary: Option<&EpdRecord>) -> EpdRecord {
    let Some(secondary) = secondary else {
        return primary.clone();
    };
    let Some(mut merged) = primary.as_value().as_object().cloned() else {
        log::warn!("Primary record is not an object; skipping merge");
        return primary.clone();
    };

    let merged_impacts = merge_section(&mut merged, IMPACTS, secondary.impacts());
    let merged_resources = merge_section(&mut merged, RESOURCE_USES, secondary.resource_uses());

    merged.insert(
        DATA_SOURCES.to_string(),
        json!({
            "ec3": true,
            "openepd": true,
            "merged_impacts": merged_impacts,
            "merged_resources": merged_resources,
        }),
    );
    EpdRecord::new(Value::Object(merged))
}

/// Fill `record[key]` from `source` where the record's value is absent or
/// falsy. Returns whether anything changed.
fn merge_section(
    record: &mut Map<String, Value>,
    key: &str,
    source: Option<&Map<String, Value>>,
) -> bool {
    let mut section = record
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut contributed = false;
    for (k, v) in source.into_iter().flatten() {
        let current = section.get(k);
        if current.is_some_and(is_truthy) {
            continue;
        }
        if current != Some(v) {
            contributed = true;
        }
        section.insert(k.clone(), v.clone());
    }

    record.insert(key.to_string(), Value::Object(section));
    contributed
}

/// LCIA indicator values under canonical names.
pub fn extract_lcia_categories(record: &EpdRecord, tables: &IndicatorTables) -> Map<String, Value> {
    record
        .impacts()
        .map(|impacts| match_indicators(&tables.lcia, impacts))
        .unwrap_or_default()
}

/// Resource-use indicator values under canonical names.
pub fn extract_resource_indicators(
    record: &EpdRecord,
    tables: &IndicatorTables,
) -> Map<String, Value> {
    record
        .resource_uses()
        .map(|resources| match_indicators(&tables.resources, resources))
        .unwrap_or_default()
}

/// Whether the records share any identifier.
pub fn match_ids(a: &EpdRecord, b: &EpdRecord) -> bool {
    ID_FIELDS
        .iter()
        .any(|field| matches!((a.text(field), b.text(field)), (Some(x), Some(y)) if x == y))
}

/// First identifier of `record` worth looking up elsewhere.
pub fn lookup_id(record: &EpdRecord) -> Option<&str> {
    record
        .open_xpd_uuid()
        .or_else(|| record.material_id())
        .or_else(|| record.id())
}

/// Whether the record lacks impact or resource data.
pub fn should_fetch_secondary(record: &EpdRecord) -> bool {
    let empty = |section: Option<&Map<String, Value>>| section.is_none_or(Map::is_empty);
    empty(record.impacts()) || empty(record.resource_uses())
}

/// Side-by-side view of two records' indicator data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordComparison {
    pub ids_match: bool,
    pub primary: SectionSummary,
    pub secondary: SectionSummary,
    pub lcia: Vec<IndicatorPresence>,
    pub resources: Vec<IndicatorPresence>,
}

/// Keys present in a record's indicator sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub impact_keys: Vec<String>,
    pub resource_keys: Vec<String>,
}

impl SectionSummary {
    fn of(record: &EpdRecord) -> Self {
        let keys = |section: Option<&Map<String, Value>>| {
            section
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default()
        };
        Self {
            impact_keys: keys(record.impacts()),
            resource_keys: keys(record.resource_uses()),
        }
    }
}

/// Whether each side has a key for one canonical indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorPresence {
    pub indicator: String,
    pub primary: bool,
    pub secondary: bool,
}

/// Compare indicator coverage of two records.
pub fn compare_records(
    primary: &EpdRecord,
    secondary: &EpdRecord,
    tables: &IndicatorTables,
) -> RecordComparison {
    let presence = |names: Vec<&str>, a: Map<String, Value>, b: Map<String, Value>| {
        names
            .into_iter()
            .map(|name| IndicatorPresence {
                indicator: name.to_string(),
                primary: a.contains_key(name),
                secondary: b.contains_key(name),
            })
            .collect::<Vec<_>>()
    };

    let lcia_names = tables.lcia.iter().map(|e| e.name.as_str()).collect();
    let resource_names = tables.resources.iter().map(|e| e.name.as_str()).collect();

    RecordComparison {
        ids_match: match_ids(primary, secondary),
        primary: SectionSummary::of(primary),
        secondary: SectionSummary::of(secondary),
        lcia: presence(
            lcia_names,
            extract_lcia_categories(primary, tables),
            extract_lcia_categories(secondary, tables),
        ),
        resources: presence(
            resource_names,
            extract_resource_indicators(primary, tables),
            extract_resource_indicators(secondary, tables),
        ),
    }
}

/// Log a comparison at info level.
pub fn log_comparison(comparison: &RecordComparison) {
    log::info!("Identifiers match: {}", comparison.ids_match);
    log::info!(
        "Primary: {} impact keys, {} resource keys",
        comparison.primary.impact_keys.len(),
        comparison.primary.resource_keys.len()
    );
    log::info!(
        "Secondary: {} impact keys, {} resource keys",
        comparison.secondary.impact_keys.len(),
        comparison.secondary.resource_keys.len()
    );
    for row in comparison.lcia.iter().chain(&comparison.resources) {
        log::info!(
            "  {:<30} primary={:<5} secondary={}",
            row.indicator,
            row.primary,
            row.secondary
        );
    }
}
