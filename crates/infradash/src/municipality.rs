use ahash::AHashMap as HashMap;
use geo::{BoundingRect, Geometry, MultiPolygon, Rect};
use tracing::{debug, info, warn};

use infradash_data_processing::{Crs, FeatureCollection, MunicipalityAttributes};

use crate::error::{InfraDashError, Result};
use crate::resolve::MunicipalityNames;

/// A municipality boundary under its canonical display name.
#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    pub name: String,
    pub boundary: MultiPolygon<f64>,
}

impl Municipality {
    /// Bounding box in the set's CRS, `None` for an empty boundary.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.boundary.bounding_rect()
    }
}

/// The municipality reference set, loaded once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct MunicipalitySet {
    crs: Crs,
    municipalities: Vec<Municipality>,
    by_name: HashMap<String, usize>,
    names: MunicipalityNames,
}

impl MunicipalitySet {
    /// Build the set from decoded boundary features.
    ///
    /// Features sharing a display name are merged into one multipolygon.
    /// Non-areal geometries are skipped.
    pub fn from_collection(collection: FeatureCollection<MunicipalityAttributes>) -> Self {
        let crs = collection.crs;
        let mut municipalities: Vec<Municipality> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for feature in collection.features {
            let polygons = match feature.geometry {
                Geometry::Polygon(p) => vec![p],
                Geometry::MultiPolygon(mp) => mp.0,
                other => {
                    warn!(name = %feature.attributes.name, geometry = geometry_kind(&other), "Municipality boundary is not areal, skipping");
                    continue;
                }
            };
            let name = feature.attributes.name;
            if let Some(&idx) = by_name.get(&name) {
                debug!(%name, "Merging repeated municipality boundary");
                municipalities[idx].boundary.0.extend(polygons);
            } else {
                by_name.insert(name.clone(), municipalities.len());
                municipalities.push(Municipality {
                    name,
                    boundary: MultiPolygon(polygons),
                });
            }
        }

        let names = MunicipalityNames::new(municipalities.iter().map(|m| m.name.as_str()));
        info!(count = municipalities.len(), %crs, "Loaded municipalities");
        Self {
            crs,
            municipalities,
            by_name,
            names,
        }
    }

    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    #[must_use]
    pub fn names(&self) -> &MunicipalityNames {
        &self.names
    }

    /// Look a municipality up by exact display name.
    pub fn get(&self, name: &str) -> Result<&Municipality> {
        self.by_name
            .get(name)
            .map(|&idx| &self.municipalities[idx])
            .ok_or_else(|| InfraDashError::MunicipalityNotFound(name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Municipality> {
        self.municipalities.iter()
    }
}

impl<'a> IntoIterator for &'a MunicipalitySet {
    type Item = &'a Municipality;
    type IntoIter = std::slice::Iter<'a, Municipality>;

    fn into_iter(self) -> Self::IntoIter {
        self.municipalities.iter()
    }
}

pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, polygon};
    use infradash_data_processing::Feature;

    fn boundary(name: &str, geometry: Geometry<f64>) -> Feature<MunicipalityAttributes> {
        Feature {
            geometry,
            attributes: MunicipalityAttributes {
                name: name.to_string(),
            },
        }
    }

    fn unit_square(x: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0), (x: x, y: 0.0)
        ])
    }

    #[test]
    fn test_lookup_and_merge() {
        let set = MunicipalitySet::from_collection(FeatureCollection::new(
            "municipalities",
            Crs::Utm34N,
            vec![
                boundary("Niš", unit_square(0.0)),
                boundary("Šabac", unit_square(5.0)),
                boundary("Niš", unit_square(2.0)),
                boundary("Stray", Geometry::Point(Point::new(0.0, 0.0))),
            ],
        ));
        assert_eq!(set.len(), 2);
        assert_eq!(set.crs(), Crs::Utm34N);
        let nis = set.get("Niš").unwrap();
        assert_eq!(nis.boundary.0.len(), 2);
        let bounds = nis.bounds().unwrap();
        assert!((bounds.max().x - 3.0).abs() < f64::EPSILON);
        assert_eq!(set.names().len(), 2);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let set = MunicipalitySet::from_collection(FeatureCollection::new(
            "municipalities",
            Crs::Utm34N,
            vec![boundary("Niš", unit_square(0.0))],
        ));
        assert!(matches!(
            set.get("Nis"),
            Err(InfraDashError::MunicipalityNotFound(name)) if name == "Nis"
        ));
    }
}
