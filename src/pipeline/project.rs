// src/pipeline/project.rs

//! Flat CSV projection of records, split into a cement and an
//! everything-else track.

use serde::Serialize;

use crate::models::EpdRecord;
use crate::storage::CsvRow;
use crate::utils::cell;

/// One CSV row describing a product and its plant location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Zip")]
    pub zip: String,
    #[serde(rename = "County")]
    pub county: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    pub longitude: String,
    /// Not a column; names the mirror YAML when `ID` is empty
    #[serde(skip)]
    pub material_id: Option<String>,
}

impl CsvRow for ProductRow {
    const HEADER: &'static [&'static str] =
        &["Name", "ID", "Zip", "County", "Address", "Latitude", "Longitude"];
}

impl ProductRow {
    pub fn from_record(record: &EpdRecord) -> Self {
        Self {
            name: cell(record.get("name")),
            id: cell(record.get("open_xpd_uuid")),
            zip: cell(record.plant_field("postal_code")),
            county: cell(record.plant_field("admin_district2")),
            address: cell(record.plant_field("address")),
            latitude: cell(record.plant_field("latitude")),
            longitude: cell(record.plant_field("longitude")),
            material_id: record.material_id().map(str::to_string),
        }
    }

    /// Key for the row's mirror YAML: `ID`, then the material id.
    pub fn file_key(&self) -> Option<&str> {
        Some(self.id.as_str())
            .filter(|id| !id.is_empty())
            .or(self.material_id.as_deref())
    }
}

/// Rows of one region, partitioned by track.
#[derive(Debug, Default)]
pub struct Projection {
    pub cement: Vec<ProductRow>,
    pub others: Vec<ProductRow>,
}

/// Whether the record's category name contains `keyword`, ignoring case.
pub fn is_cement(record: &EpdRecord, keyword: &str) -> bool {
    record
        .category_name()
        .is_some_and(|name| name.to_lowercase().contains(&keyword.to_lowercase()))
}

/// Project every record to a row and split by the cement keyword.
pub fn project(records: &[EpdRecord], cement_keyword: &str) -> Projection {
    let mut projection = Projection::default();
    for record in records {
        let row = ProductRow::from_record(record);
        if is_cement(record, cement_keyword) {
            projection.cement.push(row);
        } else {
            projection.others.push(row);
        }
    }
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(category: &str) -> EpdRecord {
        EpdRecord::new(json!({
            "name": "Product",
            "material_id": "m1",
            "open_xpd_uuid": "ec3xyz",
            "category": {"openepd_name": category},
            "plant_or_group": {
                "postal_code": "04073",
                "admin_district2": "York",
                "address": "1 Mill Rd",
                "latitude": 43.4,
                "longitude": -70.7,
            },
        }))
    }

    #[test]
    fn test_row_fields() {
        let row = ProductRow::from_record(&record("Masonry"));
        assert_eq!(row.name, "Product");
        assert_eq!(row.id, "ec3xyz");
        assert_eq!(row.zip, "04073");
        assert_eq!(row.county, "York");
        assert_eq!(row.latitude, "43.4");
        assert_eq!(row.longitude, "-70.7");
    }

    #[test]
    fn test_missing_plant_gives_empty_cells() {
        let row = ProductRow::from_record(&EpdRecord::new(json!({"name": "Bare"})));
        assert_eq!(row.name, "Bare");
        assert!(row.id.is_empty());
        assert!(row.zip.is_empty());
        assert!(row.file_key().is_none());
    }

    #[test]
    fn test_cement_match_is_case_insensitive_substring() {
        assert!(is_cement(&record("Cement"), "cement"));
        assert!(is_cement(&record("PortlandCEMENT"), "cement"));
        assert!(is_cement(&record("FiberCementBoard"), "cement"));
        assert!(!is_cement(&record("Masonry"), "cement"));
        assert!(!is_cement(&EpdRecord::new(json!({})), "cement"));
    }

    #[test]
    fn test_project_partitions() {
        let records = vec![record("Cement"), record("Masonry"), record("Steel")];
        let projection = project(&records, "cement");
        assert_eq!(projection.cement.len(), 1);
        assert_eq!(projection.others.len(), 2);
    }
}
