//! EPD record wrapper.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::strip_nulls;

/// One Environmental Product Declaration as returned by the API.
///
/// The payload is kept loosely typed: no field is guaranteed, so every
/// accessor returns an `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpdRecord(Value);

impl EpdRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Copy of this record without null-valued entries.
    pub fn without_nulls(self) -> Self {
        Self(strip_nulls(self.0))
    }

    /// Top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Top-level field as non-empty text.
    pub fn text(&self, key: &str) -> Option<&str> {
        non_empty(self.get(key))
    }

    pub fn id(&self) -> Option<&str> {
        self.text("id")
    }

    pub fn material_id(&self) -> Option<&str> {
        self.text("material_id")
    }

    pub fn open_xpd_uuid(&self) -> Option<&str> {
        self.text("open_xpd_uuid")
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    /// Field of the nested `category` mapping.
    pub fn category_field(&self, key: &str) -> Option<&Value> {
        self.get("category").and_then(|c| c.get(key))
    }

    pub fn category_display_name(&self) -> Option<&str> {
        non_empty(self.category_field("display_name"))
    }

    pub fn category_openepd_name(&self) -> Option<&str> {
        non_empty(self.category_field("openepd_name"))
    }

    /// Category name used for classification: `openepd_name`, then `display_name`.
    pub fn category_name(&self) -> Option<&str> {
        self.category_openepd_name()
            .or_else(|| self.category_display_name())
    }

    /// Field of the nested `plant_or_group` mapping.
    pub fn plant_field(&self, key: &str) -> Option<&Value> {
        self.get("plant_or_group").and_then(|p| p.get(key))
    }

    /// Postal code from `manufacturer`, falling back to `plant_or_group`.
    pub fn postal_code(&self) -> Option<&str> {
        non_empty(self.get("manufacturer").and_then(|m| m.get("postal_code")))
            .or_else(|| non_empty(self.plant_field("postal_code")))
    }

    /// The `impacts` mapping, if present and a mapping.
    pub fn impacts(&self) -> Option<&Map<String, Value>> {
        self.get("impacts").and_then(Value::as_object)
    }

    /// The `resource_uses` mapping, if present and a mapping.
    pub fn resource_uses(&self) -> Option<&Map<String, Value>> {
        self.get("resource_uses").and_then(Value::as_object)
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
