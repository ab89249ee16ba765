use geo::Geometry;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{DataError, Result};

pub mod crs;
pub mod schema;

use crs::Crs;
use schema::{FeatureSchema, JsonObject};

/// A decoded feature: geometry plus its typed attribute record.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<A> {
    pub geometry: Geometry<f64>,
    pub attributes: A,
}

/// A feature that was dropped while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFeature {
    /// Position in the source `features` array
    pub index: usize,
    pub reason: String,
}

/// Decoded layer, tagged with the CRS its coordinates are in.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection<A> {
    pub name: String,
    pub crs: Crs,
    pub features: Vec<Feature<A>>,
    pub rejected: Vec<RejectedFeature>,
}

impl<A> FeatureCollection<A> {
    #[must_use]
    pub fn new(name: impl Into<String>, crs: Crs, features: Vec<Feature<A>>) -> Self {
        Self {
            name: name.into(),
            crs,
            features,
            rejected: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature<A>> {
        self.features.iter()
    }
}

impl<A: Send> FeatureCollection<A> {
    /// Reproject every geometry into `target`.
    #[instrument(name = "Reproject layer", skip(self), fields(layer = %self.name, from = %self.crs, count = self.features.len()), level = "debug")]
    #[must_use]
    pub fn to_crs(mut self, target: Crs) -> Self {
        if self.crs == target {
            return self;
        }
        let source = self.crs;
        self.features
            .par_iter_mut()
            .for_each(|f| f.geometry = source.transform(target, &f.geometry));
        self.crs = target;
        self
    }
}

impl<'a, A> IntoIterator for &'a FeatureCollection<A> {
    type Item = &'a Feature<A>;
    type IntoIter = std::slice::Iter<'a, Feature<A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Read the legacy `crs` member, e.g.
/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}`.
fn declared_crs(root: &JsonObject) -> Result<Crs> {
    let Some(crs) = root.get("crs") else {
        return Ok(Crs::Wgs84);
    };
    let name = crs
        .pointer("/properties/name")
        .and_then(Value::as_str)
        .or_else(|| crs.pointer("/properties/code").and_then(Value::as_str));
    if let Some(name) = name {
        return Crs::parse(name);
    }
    if let Some(code) = crs.pointer("/properties/code").and_then(Value::as_u64) {
        return Crs::from_epsg(u32::try_from(code).unwrap_or(u32::MAX));
    }
    Err(DataError::UnsupportedCrs(crs.to_string()))
}

/// Decode a GeoJSON `FeatureCollection` into typed features.
///
/// Features without geometry, with geometry that does not convert, or whose
/// properties the schema rejects are skipped and listed in
/// [`FeatureCollection::rejected`]. The document itself must be a
/// `FeatureCollection` in a supported CRS.
#[instrument(name = "Decode layer", skip(bytes), fields(bytes = bytes.len()), level = "info")]
pub fn decode_feature_collection<A: FeatureSchema>(
    name: &str,
    bytes: &[u8],
) -> Result<FeatureCollection<A>> {
    let root: Value = serde_json::from_slice(bytes)?;
    let Value::Object(root) = root else {
        return Err(DataError::NotAFeatureCollection(name.to_string()));
    };
    if root.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(DataError::NotAFeatureCollection(name.to_string()));
    }
    let crs = declared_crs(&root)?;
    let raw: geojson::FeatureCollection = serde_json::from_value(Value::Object(root))?;

    let decoded: Vec<std::result::Result<Feature<A>, RejectedFeature>> = raw
        .features
        .into_par_iter()
        .enumerate()
        .map(|(index, feature)| {
            let reject = |reason: String| RejectedFeature { index, reason };
            let geometry = feature
                .geometry
                .ok_or_else(|| reject("feature has no geometry".to_string()))?;
            let geometry = Geometry::<f64>::try_from(geometry).map_err(|e| reject(e.to_string()))?;
            let properties = feature.properties.unwrap_or_default();
            let attributes = A::from_properties(&properties).map_err(reject)?;
            Ok(Feature {
                geometry,
                attributes,
            })
        })
        .collect();

    let mut features = Vec::with_capacity(decoded.len());
    let mut rejected = Vec::new();
    for item in decoded {
        match item {
            Ok(feature) => features.push(feature),
            Err(rejection) => {
                debug!(layer = name, index = rejection.index, reason = %rejection.reason, "Skipping feature");
                rejected.push(rejection);
            }
        }
    }
    if !rejected.is_empty() {
        warn!(layer = name, rejected = rejected.len(), "Some features were skipped");
    }
    info!(layer = name, %crs, features = features.len(), "Decoded layer");

    Ok(FeatureCollection {
        name: name.to_string(),
        crs,
        features,
        rejected,
    })
}
