//! Synthetic reference layers for tests and offline demos.
//!
//! Municipalities are 10 km squares laid out on a grid in UTM zone 34N so that
//! every expected length is a round number:
//!
//! ```text
//!  4 920 000 +-----------------+-----------------+
//!            |      Šabac      |    Novi Sad     |   + island 530-531 km E
//!  4 910 000 +-----------------+-----------------+
//!            | Veliko Gradište |       Niš       |       Kosjerić (empty)
//!  4 900 000 +-----------------+-----------------+     600-610 km E
//!         500 000           510 000           520 000
//! ```
//!
//! Hospitals are stored in EPSG:4326 to exercise reprojection; every other
//! layer declares EPSG:32634.

use bytes::Bytes;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::error::{DataError, Result};
use crate::Crs;
use crate::raw::BlobStore;
use crate::source::{BlobLocation, Layer, ObjectStoreLayout};

/// Municipality names in fixture order.
pub const TEST_MUNICIPALITIES: [&str; 5] =
    ["Veliko Gradište", "Niš", "Šabac", "Novi Sad", "Kosjerić"];

/// PNG signature followed by an empty IHDR stub.
pub const TEST_LOGO: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

const CELL: f64 = 10_000.0;
const ORIGIN_E: f64 = 500_000.0;
const ORIGIN_N: f64 = 4_900_000.0;

fn square(min_e: f64, min_n: f64, size: f64) -> Value {
    json!([[
        [min_e, min_n],
        [min_e + size, min_n],
        [min_e + size, min_n + size],
        [min_e, min_n + size],
        [min_e, min_n]
    ]])
}

fn feature(properties: Value, geometry: Value) -> Value {
    json!({"type": "Feature", "properties": properties, "geometry": geometry})
}

fn line(coords: &[(f64, f64)]) -> Value {
    let coords: Vec<[f64; 2]> = coords.iter().map(|&(e, n)| [e, n]).collect();
    json!({"type": "LineString", "coordinates": coords})
}

fn point(e: f64, n: f64) -> Value {
    json!({"type": "Point", "coordinates": [e, n]})
}

fn collection(crs: Crs, features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": format!("urn:ogc:def:crs:EPSG::{}", crs.epsg())}},
        "features": features,
    })
}

fn municipalities() -> Value {
    let cell = |col: f64, row: f64| square(ORIGIN_E + col * CELL, ORIGIN_N + row * CELL, CELL);
    let polygon = |coords: Value| json!({"type": "Polygon", "coordinates": coords});
    collection(
        Crs::Utm34N,
        vec![
            feature(json!({"Municipality": "Veliko Gradište"}), polygon(cell(0.0, 0.0))),
            feature(json!({"Municipality": "Niš"}), polygon(cell(1.0, 0.0))),
            feature(json!({"Municipality": "Šabac"}), polygon(cell(0.0, 1.0))),
            feature(
                json!({"Municipality": "Novi Sad"}),
                json!({"type": "MultiPolygon", "coordinates": [
                    cell(1.0, 1.0),
                    square(530_000.0, 4_910_000.0, 1_000.0)
                ]}),
            ),
            feature(
                json!({"Municipality": "Kosjerić"}),
                polygon(square(600_000.0, ORIGIN_N, CELL)),
            ),
            // Unnamed boundary, dropped while decoding
            feature(json!({"Municipality": null}), polygon(square(700_000.0, ORIGIN_N, CELL))),
        ],
    )
}

fn roads() -> Value {
    collection(
        Crs::Utm34N,
        vec![
            feature(
                json!({"fclass": "primary", "bridge": "T", "tunnel": "F", "name": "Dunavska"}),
                line(&[(501_000.0, 4_901_000.0), (504_000.0, 4_901_000.0)]),
            ),
            feature(
                json!({"fclass": "residential", "bridge": "F", "tunnel": "F"}),
                line(&[(501_000.0, 4_902_000.0), (505_500.0, 4_902_000.0)]),
            ),
            // Crosses from Veliko Gradište into Niš
            feature(
                json!({"fclass": "trunk", "bridge": "F", "tunnel": "T"}),
                line(&[(505_000.0, 4_905_000.0), (515_000.0, 4_905_000.0)]),
            ),
            feature(
                json!({"fclass": "footway"}),
                line(&[(512_000.0, 4_901_000.0), (512_000.0, 4_902_000.0), (512_000.0, 4_903_000.0)]),
            ),
            feature(
                json!({"fclass": "secondary_link", "bridge": "F", "tunnel": "F"}),
                line(&[(502_000.0, 4_915_000.0), (503_000.0, 4_915_000.0)]),
            ),
            feature(json!({"fclass": "service"}), Value::Null),
        ],
    )
}

fn rails() -> Value {
    collection(
        Crs::Utm34N,
        vec![
            feature(
                json!({"bridge": "T", "tunnel": "F", "name": "Pruga Beograd-Niš"}),
                line(&[(500_500.0, 4_908_000.0), (506_500.0, 4_908_000.0)]),
            ),
            feature(
                json!({"bridge": "F", "tunnel": "T"}),
                line(&[(511_000.0, 4_908_000.0), (513_000.0, 4_908_000.0)]),
            ),
        ],
    )
}

fn stations() -> Value {
    collection(
        Crs::Utm34N,
        vec![
            feature(json!({"name": "Veliko Gradište"}), point(503_000.0, 4_908_000.0)),
            feature(json!({}), point(512_500.0, 4_908_000.0)),
        ],
    )
}

fn schools() -> Value {
    collection(
        Crs::Utm34N,
        vec![
            feature(
                json!({"name": "OŠ Vuk Karadžić", "type": "school"}),
                point(502_500.0, 4_903_500.0),
            ),
            feature(
                json!({"name": "Univerzitet u Nišu", "type": "University"}),
                point(514_000.0, 4_906_000.0),
            ),
            feature(json!({"name": "Gimnazija"}), point(516_000.0, 4_904_000.0)),
        ],
    )
}

fn hospitals() -> Value {
    let wgs84 = |e: f64, n: f64| {
        let c = Crs::Utm34N.to_lon_lat(geo::Coord { x: e, y: n });
        json!({"type": "Point", "coordinates": [c.x, c.y]})
    };
    json!({
        "type": "FeatureCollection",
        "features": [
            feature(json!({"name": "Dom zdravlja"}), wgs84(504_000.0, 4_906_000.0)),
            feature(json!({"name": null}), wgs84(515_000.0, 4_902_000.0)),
        ],
    })
}

fn layer_document(layer: Layer) -> Value {
    match layer {
        Layer::Municipalities => municipalities(),
        Layer::Roads => roads(),
        Layer::Rails => rails(),
        Layer::Stations => stations(),
        Layer::Schools => schools(),
        Layer::Hospitals => hospitals(),
    }
}

/// Serialize every fixture layer plus the logo at the locations `layout` names.
pub fn create_test_data(layout: &ObjectStoreLayout) -> Result<HashMap<BlobLocation, Bytes>> {
    info!(bucket = %layout.bucket, "Creating synthetic test layers");
    let mut blobs = HashMap::with_capacity(Layer::ALL.len() + 1);
    for layer in Layer::ALL {
        let data = serde_json::to_vec(&layer_document(layer))?;
        debug!(%layer, bytes = data.len(), "Serialized fixture layer");
        blobs.insert(layout.location(layer), Bytes::from(data));
    }
    blobs.insert(layout.logo.clone(), Bytes::from_static(TEST_LOGO));
    Ok(blobs)
}

/// In-memory [`BlobStore`] serving the synthetic layers.
#[derive(Debug, Clone)]
pub struct TestObjectStore {
    blobs: HashMap<BlobLocation, Bytes>,
}

impl TestObjectStore {
    pub fn new() -> Result<Self> {
        Self::with_layout(&ObjectStoreLayout::default())
    }

    pub fn with_layout(layout: &ObjectStoreLayout) -> Result<Self> {
        Ok(Self {
            blobs: create_test_data(layout)?,
        })
    }

    /// Write every blob below `root` as `<root>/<bucket>/<object>`, the layout
    /// [`crate::LocalDirStore`] reads.
    pub fn write_to_dir(&self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        for (location, data) in &self.blobs {
            let path = root.join(&location.bucket).join(&location.object);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, data)?;
        }
        info!(root = ?root, blobs = self.blobs.len(), "Wrote test layers to disk");
        Ok(())
    }
}

impl BlobStore for TestObjectStore {
    fn fetch(&self, location: &BlobLocation) -> Result<Bytes> {
        self.blobs
            .get(location)
            .cloned()
            .ok_or_else(|| DataError::ObjectNotFound(location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processed::decode_feature_collection;
    use crate::{FacilityAttributes, MunicipalityAttributes, RoadAttributes};

    fn fetch_layer(store: &TestObjectStore, layer: Layer) -> Bytes {
        store
            .fetch(&ObjectStoreLayout::default().location(layer))
            .unwrap()
    }

    #[test]
    fn test_every_layer_is_served() {
        let store = TestObjectStore::new().unwrap();
        for layer in Layer::ALL {
            assert!(!fetch_layer(&store, layer).is_empty(), "{layer} missing");
        }
        let logo = store.fetch(&ObjectStoreLayout::default().logo).unwrap();
        assert!(logo.starts_with(b"\x89PNG"));
        assert!(store.fetch(&BlobLocation::new("nope", "nope")).is_err());
    }

    #[test]
    fn test_municipality_fixture_decodes() {
        let store = TestObjectStore::new().unwrap();
        let fc = decode_feature_collection::<MunicipalityAttributes>(
            "municipalities",
            &fetch_layer(&store, Layer::Municipalities),
        )
        .unwrap();
        assert_eq!(fc.crs, Crs::Utm34N);
        let names: Vec<_> = fc.iter().map(|f| f.attributes.name.as_str()).collect();
        assert_eq!(names, TEST_MUNICIPALITIES);
        assert_eq!(fc.rejected.len(), 1);
    }

    #[test]
    fn test_roads_and_hospitals_fixture_decode() {
        let store = TestObjectStore::new().unwrap();
        let roads = decode_feature_collection::<RoadAttributes>(
            "roads",
            &fetch_layer(&store, Layer::Roads),
        )
        .unwrap();
        assert_eq!(roads.len(), 5);
        assert_eq!(roads.rejected.len(), 1);

        let hospitals = decode_feature_collection::<FacilityAttributes>(
            "hospitals",
            &fetch_layer(&store, Layer::Hospitals),
        )
        .unwrap();
        assert_eq!(hospitals.crs, Crs::Wgs84);
        assert_eq!(hospitals.len(), 2);
    }

    #[test]
    fn test_write_to_dir_matches_local_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = TestObjectStore::new().unwrap();
        store.write_to_dir(dir.path()).unwrap();
        let local = crate::LocalDirStore::new(dir.path());
        let location = ObjectStoreLayout::default().location(Layer::Rails);
        assert_eq!(local.fetch(&location).unwrap(), store.fetch(&location).unwrap());
    }
}
