//! Canonical impact/resource indicators and their synonym tables.
//!
//! EC3 and openEPD name the same indicators differently. Each canonical name
//! is backed by an ordered list of substrings; a source key matches when it
//! contains any of them, case-insensitively. The tables are configuration so
//! that upstream renames are a data change.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// A canonical indicator name.
pub trait Canonical: Copy + fmt::Debug {
    fn as_str(&self) -> &'static str;
}

/// LCIA impact categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LciaCategory {
    OzoneDepletion,
    Acidification,
    Eutrophication,
    PhotochemicalOzone,
    AbioticResourceDepletion,
}

impl Canonical for LciaCategory {
    fn as_str(&self) -> &'static str {
        match self {
            Self::OzoneDepletion => "ozone_depletion",
            Self::Acidification => "acidification",
            Self::Eutrophication => "eutrophication",
            Self::PhotochemicalOzone => "photochemical_ozone",
            Self::AbioticResourceDepletion => "abiotic_resource_depletion",
        }
    }
}

/// Resource use indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceIndicator {
    PrimaryEnergyRenewable,
    PrimaryEnergyNonRenewable,
    WaterUse,
    WasteGeneration,
    OutputFlows,
}

impl Canonical for ResourceIndicator {
    fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryEnergyRenewable => "primary_energy_renewable",
            Self::PrimaryEnergyNonRenewable => "primary_energy_non_renewable",
            Self::WaterUse => "water_use",
            Self::WasteGeneration => "waste_generation",
            Self::OutputFlows => "output_flows",
        }
    }
}

/// One canonical name and the substrings accepted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymEntry<K> {
    pub name: K,
    pub synonyms: Vec<String>,
}

impl<K: Canonical> SynonymEntry<K> {
    fn new(name: K, synonyms: &[&str]) -> Self {
        Self {
            name,
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether `key` contains any synonym, ignoring case.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.synonyms
            .iter()
            .any(|s| key.contains(&s.to_lowercase()))
    }

    /// First key of `keys`, in iteration order, that matches.
    pub fn first_match<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Option<&'a String> {
        keys.into_iter().find(|k| self.matches(k))
    }
}

/// Versioned synonym tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorTables {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_lcia")]
    pub lcia: Vec<SynonymEntry<LciaCategory>>,

    #[serde(default = "default_resources")]
    pub resources: Vec<SynonymEntry<ResourceIndicator>>,
}

impl IndicatorTables {
    pub fn validate(&self) -> Result<()> {
        let lcia = self.lcia.iter().map(|e| (e.name.as_str(), e.synonyms.len()));
        let res = self.resources.iter().map(|e| (e.name.as_str(), e.synonyms.len()));
        if let Some((name, _)) = lcia.chain(res).find(|(_, n)| *n == 0) {
            return Err(AppError::validation(format!(
                "indicator {name} has no synonyms"
            )));
        }
        Ok(())
    }
}

impl Default for IndicatorTables {
    fn default() -> Self {
        Self {
            version: default_version(),
            lcia: default_lcia(),
            resources: default_resources(),
        }
    }
}

/// Surface the values of `source` under canonical names.
///
/// For each table entry in order, the first matching key of `source` wins.
/// Indicators whose source names are not covered by a synonym are silently
/// absent from the result.
pub fn match_indicators<K: Canonical>(
    table: &[SynonymEntry<K>],
    source: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for entry in table {
        if let Some(key) = entry.first_match(source.keys()) {
            out.insert(entry.name.as_str().to_string(), source[key].clone());
        }
    }
    out
}

fn default_version() -> u32 {
    1
}

fn default_lcia() -> Vec<SynonymEntry<LciaCategory>> {
    use LciaCategory::*;
    vec![
        SynonymEntry::new(
            OzoneDepletion,
            &["ozone_depletion", "ozone_depletion_potential", "odp"],
        ),
        SynonymEntry::new(
            Acidification,
            &["acidification", "acidification_potential", "ap"],
        ),
        SynonymEntry::new(
            Eutrophication,
            &["eutrophication", "eutrophication_potential", "ep"],
        ),
        SynonymEntry::new(
            PhotochemicalOzone,
            &["photochemical_ozone", "photochemical_ozone_creation", "pocp", "smog"],
        ),
        SynonymEntry::new(
            AbioticResourceDepletion,
            &["abiotic_resource", "abiotic_resource_depletion", "ard"],
        ),
    ]
}

fn default_resources() -> Vec<SynonymEntry<ResourceIndicator>> {
    use ResourceIndicator::*;
    vec![
        SynonymEntry::new(
            PrimaryEnergyRenewable,
            &["renewable", "primary_energy_renewable", "energy_renewable"],
        ),
        SynonymEntry::new(
            PrimaryEnergyNonRenewable,
            &["non_renewable", "primary_energy_non_renewable", "energy_non_renewable"],
        ),
        SynonymEntry::new(WaterUse, &["water", "water_use", "water_consumption"]),
        SynonymEntry::new(
            WasteGeneration,
            &["waste", "waste_generation", "waste_output"],
        ),
        SynonymEntry::new(OutputFlows, &["output_flows", "output"]),
    ]
}
