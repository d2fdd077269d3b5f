// src/pipeline/tariff.rs

//! Keyword-based tariff classification for one region.
//!
//! The search text is `"<category display name> <name> <description>"`,
//! lowercased. Keywords are tried in table order and the first one contained
//! in the text wins, so longer phrases must precede the words they contain.

use serde::Serialize;

use crate::error::Result;
use crate::models::{EpdRecord, TariffConfig, TariffKeyword, TariffLayout};
use crate::storage::{CsvPayload, CsvRow};
use crate::utils::cell;

/// `region1, region2, category_id, tariff_percent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactTariffRow {
    pub region1: String,
    pub region2: String,
    pub category_id: String,
    pub tariff_percent: u32,
}

impl CsvRow for CompactTariffRow {
    const HEADER: &'static [&'static str] =
        &["region1", "region2", "category_id", "tariff_percent"];
}

/// Compact columns plus what matched and where the product comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightTariffRow {
    pub region1: String,
    pub region2: String,
    pub category_id: String,
    pub tariff_percent: u32,
    pub matched_keyword: String,
    pub name: String,
    pub id: String,
    pub material_id: String,
    pub category: String,
    pub address: String,
    pub zip: String,
    pub latitude: String,
    pub longitude: String,
}

impl CsvRow for HighlightTariffRow {
    const HEADER: &'static [&'static str] = &[
        "region1",
        "region2",
        "category_id",
        "tariff_percent",
        "matched_keyword",
        "name",
        "id",
        "material_id",
        "category",
        "address",
        "zip",
        "latitude",
        "longitude",
    ];
}

/// Text the keywords are searched in.
pub fn search_text(record: &EpdRecord) -> String {
    format!(
        "{} {} {}",
        record.category_display_name().unwrap_or(""),
        record.name().unwrap_or(""),
        record.description().unwrap_or("")
    )
    .to_lowercase()
}

/// First keyword of the table found in the record's search text.
pub fn classify<'a>(record: &EpdRecord, keywords: &'a [TariffKeyword]) -> Option<&'a TariffKeyword> {
    let text = search_text(record);
    keywords
        .iter()
        .find(|k| text.contains(&k.keyword.to_lowercase()))
}

/// Encode the tariff CSV for `records` in the configured layout.
///
/// Records matching no keyword are left out.
pub fn tariff_payload(records: &[EpdRecord], config: &TariffConfig) -> Result<CsvPayload> {
    let matches = records
        .iter()
        .filter_map(|r| classify(r, &config.keywords).map(|k| (r, k)));

    match config.layout {
        TariffLayout::Compact => {
            let rows: Vec<_> = matches
                .map(|(record, keyword)| CompactTariffRow {
                    region1: config.region.clone(),
                    region2: config.counterpart_region.clone(),
                    category_id: cell(record.category_field("id")),
                    tariff_percent: keyword.percent,
                })
                .collect();
            CsvPayload::encode(&rows)
        }
        TariffLayout::Highlight => {
            let rows: Vec<_> = matches
                .map(|(record, keyword)| HighlightTariffRow {
                    region1: config.region.clone(),
                    region2: config.counterpart_region.clone(),
                    category_id: cell(record.category_field("id")),
                    tariff_percent: keyword.percent,
                    matched_keyword: keyword.keyword.clone(),
                    name: cell(record.get("name")),
                    id: cell(record.get("id")),
                    material_id: cell(record.get("material_id")),
                    category: cell(record.category_field("display_name")),
                    address: cell(record.plant_field("address")),
                    zip: cell(record.plant_field("postal_code")),
                    latitude: cell(record.plant_field("latitude")),
                    longitude: cell(record.plant_field("longitude")),
                })
                .collect();
            CsvPayload::encode(&rows)
        }
    }
}

/// Header-only payload for the configured layout.
pub fn empty_payload(layout: TariffLayout) -> Result<CsvPayload> {
    match layout {
        TariffLayout::Compact => CsvPayload::encode::<CompactTariffRow>(&[]),
        TariffLayout::Highlight => CsvPayload::encode::<HighlightTariffRow>(&[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(display: &str, name: &str, description: &str) -> EpdRecord {
        EpdRecord::new(json!({
            "name": name,
            "description": description,
            "material_id": "m",
            "category": {"display_name": display, "id": "cat-7"},
        }))
    }

    #[test]
    fn test_first_keyword_in_table_order_wins() {
        let config = TariffConfig::default();
        let r = record("Kitchen Cabinets", "Oak line", "");
        let hit = classify(&r, &config.keywords).unwrap();
        assert_eq!(hit.keyword, "kitchen cabinet");
        assert_eq!(hit.percent, 50);
    }

    #[test]
    fn test_description_is_searched() {
        let config = TariffConfig::default();
        let r = record("Casework", "Line A", "Modular wardrobes and shelving");
        assert_eq!(classify(&r, &config.keywords).unwrap().percent, 30);
    }

    #[test]
    fn test_unmatched_record_is_skipped() {
        let config = TariffConfig::default();
        let records = vec![
            record("Cement", "OPC 53", "Ordinary portland cement"),
            record("Furniture", "Chair", ""),
        ];
        let payload = tariff_payload(&records, &config).unwrap();
        assert_eq!(payload.rows, 1);
        assert_eq!(
            String::from_utf8(payload.body).unwrap(),
            "IN,US,cat-7,30\n"
        );
    }

    #[test]
    fn test_highlight_layout_has_extra_columns() {
        let config = TariffConfig {
            layout: TariffLayout::Highlight,
            ..TariffConfig::default()
        };
        let payload = tariff_payload(&[record("Tables", "Desk", "")], &config).unwrap();
        let header = String::from_utf8(payload.header).unwrap();
        assert!(header.starts_with("region1,region2,category_id,tariff_percent,matched_keyword"));
        let body = String::from_utf8(payload.body).unwrap();
        assert!(body.starts_with("IN,US,cat-7,30,tables,Desk,"));
    }

    #[test]
    fn test_empty_payload_matches_layout() {
        let compact = empty_payload(TariffLayout::Compact).unwrap();
        assert_eq!(compact.header, b"region1,region2,category_id,tariff_percent\n");
        assert_eq!(compact.rows, 0);
    }
}
