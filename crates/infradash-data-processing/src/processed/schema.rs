//! Typed attribute records for each layer.
//!
//! Property lookups are explicit: missing or null values fall back to a fixed
//! default (`false` for flags, `None` for free text, [`RoadClass::Unknown`] for
//! road classes). Only municipality boundaries reject a missing name.

use serde_json::Value;
use std::fmt;

pub type JsonObject = serde_json::Map<String, Value>;

/// Converts GeoJSON properties into a typed attribute record.
pub trait FeatureSchema: Sized + Send + Sync {
    /// Build the record; an `Err` carries the reason the feature was rejected.
    fn from_properties(properties: &JsonObject) -> Result<Self, String>;
}

/// Read a property as trimmed, non-empty text. Numbers are stringified.
pub fn text_property(properties: &JsonObject, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// OSM export flags are `"T"` / `"F"`; anything other than `"T"` is false.
pub fn flag_property(properties: &JsonObject, key: &str) -> bool {
    matches!(properties.get(key), Some(Value::String(s)) if s.trim() == "T")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityAttributes {
    pub name: String,
}

impl FeatureSchema for MunicipalityAttributes {
    fn from_properties(properties: &JsonObject) -> Result<Self, String> {
        text_property(properties, "Municipality")
            .map(|name| Self { name })
            .ok_or_else(|| "missing `Municipality` name".to_string())
    }
}

/// OSM `fclass` values of road segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoadClass {
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    TrunkLink,
    PrimaryLink,
    SecondaryLink,
    TertiaryLink,
    Residential,
    Unclassified,
    Service,
    Other(String),
    Unknown,
}

impl RoadClass {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "trunk" => Self::Trunk,
            "primary" => Self::Primary,
            "secondary" => Self::Secondary,
            "tertiary" => Self::Tertiary,
            "trunk_link" => Self::TrunkLink,
            "primary_link" => Self::PrimaryLink,
            "secondary_link" => Self::SecondaryLink,
            "tertiary_link" => Self::TertiaryLink,
            "residential" => Self::Residential,
            "unclassified" => Self::Unclassified,
            "service" => Self::Service,
            "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Trunk => "trunk",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
            Self::TrunkLink => "trunk_link",
            Self::PrimaryLink => "primary_link",
            Self::SecondaryLink => "secondary_link",
            Self::TertiaryLink => "tertiary_link",
            Self::Residential => "residential",
            Self::Unclassified => "unclassified",
            Self::Service => "service",
            Self::Other(s) => s,
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadAttributes {
    pub fclass: RoadClass,
    pub bridge: bool,
    pub tunnel: bool,
    pub name: Option<String>,
}

impl FeatureSchema for RoadAttributes {
    fn from_properties(properties: &JsonObject) -> Result<Self, String> {
        Ok(Self {
            fclass: text_property(properties, "fclass")
                .map_or(RoadClass::Unknown, |s| RoadClass::parse(&s)),
            bridge: flag_property(properties, "bridge"),
            tunnel: flag_property(properties, "tunnel"),
            name: text_property(properties, "name"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RailAttributes {
    pub bridge: bool,
    pub tunnel: bool,
    pub name: Option<String>,
}

impl FeatureSchema for RailAttributes {
    fn from_properties(properties: &JsonObject) -> Result<Self, String> {
        Ok(Self {
            bridge: flag_property(properties, "bridge"),
            tunnel: flag_property(properties, "tunnel"),
            name: text_property(properties, "name"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StationAttributes {
    pub name: Option<String>,
}

impl FeatureSchema for StationAttributes {
    fn from_properties(properties: &JsonObject) -> Result<Self, String> {
        Ok(Self {
            name: text_property(properties, "name"),
        })
    }
}

/// Schools, universities and hospitals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FacilityAttributes {
    pub name: Option<String>,
    /// Free-text facility type, e.g. "school", "University"
    pub kind: Option<String>,
}

impl FacilityAttributes {
    /// A facility is higher education when its type mentions "university".
    #[must_use]
    pub fn is_higher_education(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.to_lowercase().contains("university"))
    }
}

impl FeatureSchema for FacilityAttributes {
    fn from_properties(properties: &JsonObject) -> Result<Self, String> {
        Ok(Self {
            name: text_property(properties, "name"),
            kind: text_property(properties, "type"),
        })
    }
}
