//! Length and count summaries.
//!
//! Sums run sequentially in collection order so repeated runs over the same
//! data give bit-identical totals.

use std::collections::BTreeMap;
use std::fmt;

use geo::{Euclidean, Geometry, Length};
use tracing::warn;

use infradash_data_processing::{
    FacilityAttributes, Feature, RailAttributes, RoadAttributes, RoadClass, StationAttributes,
};

/// Attributes of linear features carrying OSM bridge/tunnel flags.
pub trait LinearAttributes {
    fn is_bridge(&self) -> bool;
    fn is_tunnel(&self) -> bool;
}

impl LinearAttributes for RoadAttributes {
    fn is_bridge(&self) -> bool {
        self.bridge
    }

    fn is_tunnel(&self) -> bool {
        self.tunnel
    }
}

impl LinearAttributes for RailAttributes {
    fn is_bridge(&self) -> bool {
        self.bridge
    }

    fn is_tunnel(&self) -> bool {
        self.tunnel
    }
}

/// Planar length in CRS units. Areal and point geometries measure zero.
#[must_use]
pub fn planar_length(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Line(l) => Euclidean.length(l),
        Geometry::LineString(ls) => Euclidean.length(ls),
        Geometry::MultiLineString(mls) => Euclidean.length(mls),
        Geometry::GeometryCollection(gc) => gc.iter().map(planar_length).sum(),
        _ => 0.0,
    }
}

fn length_km(geometry: &Geometry<f64>) -> f64 {
    let metres = planar_length(geometry);
    if metres.is_finite() {
        metres / 1000.0
    } else {
        warn!("Ignoring geometry with non-finite length");
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LinearStats {
    pub segments: usize,
    pub total_km: f64,
    pub bridges: usize,
    pub tunnels: usize,
}

impl LinearStats {
    pub fn from_features<'a, A, I>(features: I) -> Self
    where
        A: LinearAttributes + 'a,
        I: IntoIterator<Item = &'a Feature<A>>,
    {
        features
            .into_iter()
            .fold(Self::default(), |mut stats, feature| {
                stats.add(feature);
                stats
            })
    }

    fn add<A: LinearAttributes>(&mut self, feature: &Feature<A>) {
        self.segments += 1;
        self.total_km += length_km(&feature.geometry);
        self.bridges += usize::from(feature.attributes.is_bridge());
        self.tunnels += usize::from(feature.attributes.is_tunnel());
    }
}

/// Road classes grouped for reporting. Classes outside every group only
/// count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RoadCategory {
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Link,
    Local,
}

impl RoadCategory {
    pub const ALL: [Self; 6] = [
        Self::Trunk,
        Self::Primary,
        Self::Secondary,
        Self::Tertiary,
        Self::Link,
        Self::Local,
    ];

    #[must_use]
    pub fn from_class(class: &RoadClass) -> Option<Self> {
        match class {
            RoadClass::Trunk => Some(Self::Trunk),
            RoadClass::Primary => Some(Self::Primary),
            RoadClass::Secondary => Some(Self::Secondary),
            RoadClass::Tertiary => Some(Self::Tertiary),
            RoadClass::TrunkLink
            | RoadClass::PrimaryLink
            | RoadClass::SecondaryLink
            | RoadClass::TertiaryLink => Some(Self::Link),
            RoadClass::Residential | RoadClass::Unclassified | RoadClass::Service => {
                Some(Self::Local)
            }
            RoadClass::Other(_) | RoadClass::Unknown => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Trunk => "Trunk",
            Self::Primary => "Primary",
            Self::Secondary => "Secondary",
            Self::Tertiary => "Tertiary",
            Self::Link => "Link",
            Self::Local => "Local",
        }
    }
}

impl fmt::Display for RoadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RoadStats {
    pub linear: LinearStats,
    /// Kilometres per category; every category is present
    pub by_category: BTreeMap<RoadCategory, f64>,
}

impl RoadStats {
    pub fn from_features<'a, I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a Feature<RoadAttributes>>,
    {
        let mut stats = Self {
            linear: LinearStats::default(),
            by_category: RoadCategory::ALL.into_iter().map(|c| (c, 0.0)).collect(),
        };
        for feature in features {
            stats.linear.add(feature);
            if let Some(category) = RoadCategory::from_class(&feature.attributes.fclass) {
                *stats.by_category.entry(category).or_insert(0.0) += length_km(&feature.geometry);
            }
        }
        stats
    }

    #[must_use]
    pub fn category_km(&self, category: RoadCategory) -> f64 {
        self.by_category.get(&category).copied().unwrap_or(0.0)
    }

    /// Sum of the category subtotals, never more than the total.
    #[must_use]
    pub fn categorized_km(&self) -> f64 {
        self.by_category.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RailStats {
    pub linear: LinearStats,
    pub stations: usize,
}

impl RailStats {
    pub fn from_features<'a, R, S>(rails: R, stations: S) -> Self
    where
        R: IntoIterator<Item = &'a Feature<RailAttributes>>,
        S: IntoIterator<Item = &'a Feature<StationAttributes>>,
    {
        Self {
            linear: LinearStats::from_features(rails),
            stations: stations.into_iter().count(),
        }
    }
}

/// Point facility counts, split into higher education and the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FacilityStats {
    pub total: usize,
    pub higher_education: usize,
}

impl FacilityStats {
    pub fn from_features<'a, I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a Feature<FacilityAttributes>>,
    {
        features
            .into_iter()
            .fold(Self::default(), |mut stats, feature| {
                stats.total += 1;
                stats.higher_education += usize::from(feature.attributes.is_higher_education());
                stats
            })
    }

    /// Facilities that are not higher education
    #[must_use]
    pub fn other(&self) -> usize {
        self.total - self.higher_education
    }
}

/// A statistic computed over the whole country and over one municipality.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Scoped<T> {
    pub national: T,
    pub municipality: T,
}
