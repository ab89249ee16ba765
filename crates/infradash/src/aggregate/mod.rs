//! Spatial joins of infrastructure layers against municipality boundaries.
//!
//! Both sides must be in the same CRS. Joins are inner joins on
//! `intersects`: a feature that touches a boundary belongs to that
//! municipality, and a feature crossing several boundaries belongs to each.

use geo::{BoundingRect, Geometry, Intersects, MultiPolygon, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use tracing::{debug, instrument};

use infradash_data_processing::{Crs, Feature, FeatureCollection};

use crate::error::{InfraDashError, Result};
use crate::municipality::{Municipality, MunicipalitySet};

pub mod stats;

pub use stats::{
    FacilityStats, LinearAttributes, LinearStats, RailStats, RoadCategory, RoadStats, Scoped,
    planar_length,
};

type EnvelopeItem = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn envelope(rect: Rect<f64>) -> Rectangle<[f64; 2]> {
    Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

fn check_crs(layer: &str, expected: Crs, found: Crs) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(InfraDashError::CrsMismatch {
            layer: layer.to_string(),
            expected,
            found,
        })
    }
}

fn intersects(boundary: &MultiPolygon<f64>, bounds: Rect<f64>, geometry: &Geometry<f64>) -> bool {
    geometry
        .bounding_rect()
        .is_some_and(|r| r.intersects(&bounds))
        && geometry.intersects(boundary)
}

/// Features of `features` intersecting `municipality`, in collection order.
#[instrument(name = "Spatial join", skip_all, fields(layer = %features.name, municipality = %municipality.name), level = "debug")]
pub fn spatial_join<'a, A>(
    features: &'a FeatureCollection<A>,
    municipality: &Municipality,
) -> Vec<&'a Feature<A>> {
    let Some(bounds) = municipality.bounds() else {
        return Vec::new();
    };
    let joined: Vec<&Feature<A>> = features
        .iter()
        .filter(|f| intersects(&municipality.boundary, bounds, &f.geometry))
        .collect();
    debug!(joined = joined.len(), "Joined features");
    joined
}

/// Join `features` against the municipality called `name`.
///
/// Fails when the name is not in the reference set or the layers are in
/// different CRSs.
pub fn join_municipality<'a, A>(
    features: &'a FeatureCollection<A>,
    municipalities: &MunicipalitySet,
    name: &str,
) -> Result<Vec<&'a Feature<A>>> {
    check_crs(&features.name, municipalities.crs(), features.crs)?;
    let municipality = municipalities.get(name)?;
    Ok(spatial_join(features, municipality))
}

/// One row of a join against every municipality.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedFeature<'a, A> {
    pub municipality: &'a str,
    pub feature: &'a Feature<A>,
}

/// Join `features` against every municipality.
///
/// A feature intersecting k boundaries appears k times. Rows are ordered by
/// municipality, then by feature position.
#[instrument(name = "Join all municipalities", skip_all, fields(layer = %features.name, count = features.len()), level = "info")]
pub fn join_municipalities<'a, A>(
    features: &'a FeatureCollection<A>,
    municipalities: &'a MunicipalitySet,
) -> Result<Vec<JoinedFeature<'a, A>>> {
    check_crs(&features.name, municipalities.crs(), features.crs)?;

    let items: Vec<EnvelopeItem> = features
        .iter()
        .enumerate()
        .filter_map(|(idx, f)| {
            f.geometry
                .bounding_rect()
                .map(|rect| GeomWithData::new(envelope(rect), idx))
        })
        .collect();
    let tree = RTree::bulk_load(items);

    let mut rows = Vec::new();
    for municipality in municipalities {
        let Some(bounds) = municipality.bounds() else {
            continue;
        };
        let query = AABB::from_corners(
            [bounds.min().x, bounds.min().y],
            [bounds.max().x, bounds.max().y],
        );
        let mut hits: Vec<usize> = tree
            .locate_in_envelope_intersecting(&query)
            .map(|item| item.data)
            .filter(|&idx| features.features[idx].geometry.intersects(&municipality.boundary))
            .collect();
        hits.sort_unstable();
        rows.extend(hits.into_iter().map(|idx| JoinedFeature {
            municipality: municipality.name.as_str(),
            feature: &features.features[idx],
        }));
    }
    debug!(rows = rows.len(), "Joined against all municipalities");
    Ok(rows)
}
