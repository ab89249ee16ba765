//! Render-ready map output: the view over the selected municipality and
//! styled GeoJSON layers in EPSG:4326.
//!
//! Styling lives in each feature's properties (`color`, `weight`, `popup`,
//! plus marker fields for points) so any map surface can draw the layers
//! without knowing the domain.

use geo::{BoundingRect, Coord, Geometry, Rect, Simplify};
use geojson::{Feature as GeoJsonFeature, FeatureCollection as GeoJsonCollection, Geometry as GeoJsonGeometry};
use serde_json::{Value, json};
use tracing::debug;

use infradash_data_processing::{
    Crs, FacilityAttributes, Feature, JsonObject, RailAttributes, RoadAttributes,
    StationAttributes,
};

use crate::aggregate::RoadCategory;
use crate::error::{InfraDashError, Result};
use crate::municipality::Municipality;

pub const BRIDGE_COLOR: &str = "#2a9d8f";
pub const TUNNEL_COLOR: &str = "#6c757d";
pub const BOUNDARY_COLOR: &str = "#333333";
pub const RAIL_COLOR: &str = "#e63946";
pub const STATION_FILL: &str = "#457b9d";
pub const STATION_BORDER: &str = "#1d3557";
pub const SCHOOL_FILL: &str = "#e63946";
pub const SCHOOL_BORDER: &str = "#1d3557";
pub const UNIVERSITY_FILL: &str = "#9b59b6";
pub const UNIVERSITY_BORDER: &str = "#6c3483";
pub const HOSPITAL_FILL: &str = "#d62828";
pub const HOSPITAL_BORDER: &str = "#6a040f";

/// Douglas-Peucker tolerance, in degrees, applied to exported road lines.
pub const ROAD_SIMPLIFY_TOLERANCE: f64 = 0.001;

/// Bridges draw teal and tunnels gray; anything else keeps `default`.
#[must_use]
pub fn flag_color(bridge: bool, tunnel: bool, default: &str) -> &str {
    if bridge {
        BRIDGE_COLOR
    } else if tunnel {
        TUNNEL_COLOR
    } else {
        default
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: &'static str,
    pub weight: f64,
}

impl RoadCategory {
    #[must_use]
    pub fn style(self) -> LineStyle {
        let (color, weight) = match self {
            Self::Local => ("brown", 1.0),
            Self::Link => ("pink", 1.5),
            Self::Tertiary => ("blue", 2.0),
            Self::Secondary => ("#f0c419", 2.5),
            Self::Primary => ("#f08a24", 3.5),
            Self::Trunk => ("#c43b3b", 4.0),
        };
        LineStyle { color, weight }
    }
}

/// Where the map opens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    /// Longitude (`x`) and latitude (`y`) of the bounds center
    pub center: Coord<f64>,
    /// Bounds in longitude/latitude degrees
    pub bounds: Rect<f64>,
    pub zoom: u8,
}

impl MapView {
    /// Frame `municipality`, whose boundary is in `crs`.
    ///
    /// An empty boundary or non-finite bounds is an error.
    pub fn for_municipality(municipality: &Municipality, crs: Crs, zoom: u8) -> Result<Self> {
        let boundary = crs.transform(Crs::Wgs84, &municipality.boundary);
        let bounds = boundary
            .bounding_rect()
            .filter(|r| {
                [r.min().x, r.min().y, r.max().x, r.max().y]
                    .iter()
                    .all(|v| v.is_finite())
            })
            .ok_or_else(|| InfraDashError::InvalidBounds(municipality.name.clone()))?;
        Ok(Self {
            center: bounds.center(),
            bounds,
            zoom,
        })
    }

    /// `[[south, west], [north, east]]`, the order most web maps take.
    #[must_use]
    pub fn lat_lon_bounds(&self) -> [[f64; 2]; 2] {
        [
            [self.bounds.min().y, self.bounds.min().x],
            [self.bounds.max().y, self.bounds.max().x],
        ]
    }
}

/// A named, toggleable group of styled features.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub name: String,
    pub features: GeoJsonCollection,
}

impl MapLayer {
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.features.is_empty()
    }

    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.features)?)
    }
}

/// Collects features, reprojecting each one from `crs` to EPSG:4326.
#[derive(Debug)]
struct LayerBuilder {
    name: String,
    crs: Crs,
    simplify: Option<f64>,
    features: Vec<GeoJsonFeature>,
}

impl LayerBuilder {
    fn new(name: impl Into<String>, crs: Crs) -> Self {
        Self {
            name: name.into(),
            crs,
            simplify: None,
            features: Vec::new(),
        }
    }

    /// Simplify lines after reprojection, with `tolerance` in degrees.
    fn simplified(mut self, tolerance: f64) -> Self {
        self.simplify = Some(tolerance);
        self
    }

    fn push(&mut self, geometry: &Geometry<f64>, properties: Value) {
        let mut geometry = self.crs.transform(Crs::Wgs84, geometry);
        if let Some(tolerance) = self.simplify {
            geometry = simplify_lines(geometry, tolerance);
        }
        let properties = match properties {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        self.features.push(GeoJsonFeature {
            bbox: None,
            geometry: Some(GeoJsonGeometry::new((&geometry).into())),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    fn build(self) -> MapLayer {
        debug!(layer = %self.name, features = self.features.len(), "Built map layer");
        MapLayer {
            name: self.name,
            features: GeoJsonCollection {
                bbox: None,
                features: self.features,
                foreign_members: None,
            },
        }
    }
}

/// Douglas-Peucker simplification of linear geometries. Endpoints are kept;
/// other geometry types pass through unchanged.
#[must_use]
pub fn simplify_lines(geometry: Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(tolerance)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
            gc.into_iter()
                .map(|g| simplify_lines(g, tolerance))
                .collect(),
        ),
        other => other,
    }
}

fn point_lat_lon(geometry: &Geometry<f64>, crs: Crs) -> Option<Coord<f64>> {
    match geometry {
        Geometry::Point(p) => Some(crs.transform_coord(Crs::Wgs84, p.0)),
        _ => None,
    }
}

/// Outline of the selected municipality.
#[must_use]
pub fn boundary_layer(municipality: &Municipality, crs: Crs) -> MapLayer {
    let mut layer = LayerBuilder::new("District Boundaries", crs);
    layer.push(
        &Geometry::MultiPolygon(municipality.boundary.clone()),
        json!({
            "Municipality": municipality.name,
            "color": BOUNDARY_COLOR,
            "weight": 1,
            "fill_opacity": 0,
        }),
    );
    layer.build()
}

/// One layer per road category, drawn from local roads up to trunk roads.
/// Empty categories and unclassified roads are left out.
#[must_use]
pub fn road_layers(roads: &[&Feature<RoadAttributes>], crs: Crs) -> Vec<MapLayer> {
    RoadCategory::ALL
        .iter()
        .rev()
        .filter_map(|&category| {
            let style = category.style();
            let mut layer = LayerBuilder::new(format!("{category} Roads"), crs)
                .simplified(ROAD_SIMPLIFY_TOLERANCE);
            for road in roads
                .iter()
                .filter(|r| RoadCategory::from_class(&r.attributes.fclass) == Some(category))
            {
                let a = &road.attributes;
                layer.push(
                    &road.geometry,
                    json!({
                        "fclass": a.fclass.as_str(),
                        "bridge": yes_no(a.bridge),
                        "tunnel": yes_no(a.tunnel),
                        "color": flag_color(a.bridge, a.tunnel, style.color),
                        "weight": style.weight,
                        "opacity": 0.85,
                        "popup": format!(
                            "<b>Class</b> {}<br><b>Bridge</b> {}<br><b>Tunnel</b> {}",
                            a.fclass,
                            yes_no(a.bridge),
                            yes_no(a.tunnel)
                        ),
                    }),
                );
            }
            let layer = layer.build();
            (!layer.is_empty()).then_some(layer)
        })
        .collect()
}

fn rail_popup(a: &RailAttributes) -> String {
    let mut parts = Vec::new();
    if a.bridge {
        parts.push("<b>Bridge</b>");
    }
    if a.tunnel {
        parts.push("<b>Tunnel</b>");
    }
    if parts.is_empty() {
        parts.push("Regular track");
    }
    parts.join("<br>")
}

#[must_use]
pub fn rail_layer(rails: &[&Feature<RailAttributes>], crs: Crs) -> MapLayer {
    let mut layer = LayerBuilder::new("Railways", crs);
    for rail in rails {
        let a = &rail.attributes;
        layer.push(
            &rail.geometry,
            json!({
                "bridge": yes_no(a.bridge),
                "tunnel": yes_no(a.tunnel),
                "color": flag_color(a.bridge, a.tunnel, RAIL_COLOR),
                "weight": 3,
                "opacity": 0.9,
                "popup": rail_popup(a),
            }),
        );
    }
    layer.build()
}

#[must_use]
pub fn station_layer(stations: &[&Feature<StationAttributes>], crs: Crs) -> MapLayer {
    let mut layer = LayerBuilder::new("Train Stations", crs);
    for station in stations {
        let name = station.attributes.name.as_deref().unwrap_or("Unknown Station");
        layer.push(
            &station.geometry,
            json!({
                "name": name,
                "radius": 3,
                "color": STATION_BORDER,
                "fill_color": STATION_FILL,
                "fill_opacity": 0.9,
                "popup": format!("<b>{name}</b>"),
                "tooltip": name,
            }),
        );
    }
    layer.build()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// Schools and universities as separate layers, schools first.
#[must_use]
pub fn school_layers(schools: &[&Feature<FacilityAttributes>], crs: Crs) -> Vec<MapLayer> {
    let mut school_layer = LayerBuilder::new("Schools", crs);
    let mut university_layer = LayerBuilder::new("Universities", crs);
    for school in schools {
        let a = &school.attributes;
        let name = a.name.as_deref().unwrap_or("Unknown");
        let kind = a.kind.as_deref().unwrap_or("Not specified");
        let location = point_lat_lon(&school.geometry, crs)
            .map(|c| format!("<br>{:.5}, {:.5}", c.y, c.x))
            .unwrap_or_default();
        let (target, fill, border) = if a.is_higher_education() {
            (&mut university_layer, UNIVERSITY_FILL, UNIVERSITY_BORDER)
        } else {
            (&mut school_layer, SCHOOL_FILL, SCHOOL_BORDER)
        };
        target.push(
            &school.geometry,
            json!({
                "name": name,
                "type": kind,
                "radius": 7,
                "color": border,
                "fill_color": fill,
                "fill_opacity": 0.8,
                "popup": format!("<b>{name}</b><br>{}{location}", capitalize(kind)),
                "tooltip": kind,
            }),
        );
    }
    vec![school_layer.build(), university_layer.build()]
}

#[must_use]
pub fn hospital_layer(hospitals: &[&Feature<FacilityAttributes>], crs: Crs) -> MapLayer {
    let mut layer = LayerBuilder::new("Hospitals", crs);
    for hospital in hospitals {
        let name = hospital.attributes.name.as_deref().unwrap_or("Unknown");
        layer.push(
            &hospital.geometry,
            json!({
                "name": name,
                "radius": 6,
                "color": HOSPITAL_BORDER,
                "fill_color": HOSPITAL_FILL,
                "fill_opacity": 0.9,
                "popup": format!("<b>{name}</b>"),
                "tooltip": name,
            }),
        );
    }
    layer.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPolygon, Point, line_string, polygon};
    use infradash_data_processing::RoadClass;

    fn municipality() -> Municipality {
        Municipality {
            name: "Niš".to_string(),
            boundary: MultiPolygon(vec![polygon![
                (x: 500_000.0, y: 4_800_000.0),
                (x: 510_000.0, y: 4_800_000.0),
                (x: 510_000.0, y: 4_810_000.0),
                (x: 500_000.0, y: 4_810_000.0),
                (x: 500_000.0, y: 4_800_000.0),
            ]]),
        }
    }

    #[test]
    fn test_flag_color_precedence() {
        assert_eq!(flag_color(true, true, "red"), BRIDGE_COLOR);
        assert_eq!(flag_color(false, true, "red"), TUNNEL_COLOR);
        assert_eq!(flag_color(false, false, "red"), "red");
    }

    #[test]
    fn test_map_view_centers_on_bounds() {
        let view = MapView::for_municipality(&municipality(), Crs::Utm34N, 12).unwrap();
        assert_eq!(view.zoom, 12);
        assert!(view.bounds.min().x < 21.0 && view.bounds.max().x > 21.0);
        assert!((view.center.y - (view.bounds.min().y + view.bounds.max().y) / 2.0).abs() < 1e-12);
        let [[south, _], [north, _]] = view.lat_lon_bounds();
        assert!(south < north);
    }

    #[test]
    fn test_map_view_rejects_empty_and_nan() {
        let empty = Municipality {
            name: "Empty".to_string(),
            boundary: MultiPolygon(Vec::new()),
        };
        assert!(matches!(
            MapView::for_municipality(&empty, Crs::Utm34N, 12),
            Err(InfraDashError::InvalidBounds(_))
        ));

        let nan = Municipality {
            name: "Broken".to_string(),
            boundary: MultiPolygon(vec![polygon![
                (x: f64::NAN, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: f64::NAN, y: 0.0)
            ]]),
        };
        assert!(MapView::for_municipality(&nan, Crs::Wgs84, 12).is_err());
    }

    #[test]
    fn test_road_layers_are_styled_and_ordered() {
        let road = |class: &str, bridge: bool| Feature {
            geometry: Geometry::LineString(line_string![
                (x: 501_000.0, y: 4_801_000.0), (x: 502_000.0, y: 4_801_000.0)
            ]),
            attributes: RoadAttributes {
                fclass: RoadClass::parse(class),
                bridge,
                tunnel: false,
                name: None,
            },
        };
        let roads = [road("trunk", true), road("residential", false), road("footway", false)];
        let refs: Vec<_> = roads.iter().collect();
        let layers = road_layers(&refs, Crs::Utm34N);
        let names: Vec<_> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Local Roads", "Trunk Roads"]);

        let trunk = &layers[1].features.features[0];
        let props = trunk.properties.as_ref().unwrap();
        assert_eq!(props["color"], BRIDGE_COLOR);
        assert_eq!(props["bridge"], "Yes");
        assert_eq!(props["weight"], 4.0);
        let exported = Geometry::<f64>::try_from(trunk.geometry.clone().unwrap()).unwrap();
        let Geometry::LineString(line) = exported else {
            panic!("expected a line");
        };
        assert!(line.0[0].x > 20.0 && line.0[0].x < 21.0);
    }

    #[test]
    fn test_road_lines_are_simplified_on_export() {
        // 201 vertices 50 m apart along a straight east-west line
        let dense = LineString::from(
            (0..=200)
                .map(|i| (501_000.0 + f64::from(i) * 50.0, 4_801_000.0))
                .collect::<Vec<_>>(),
        );
        let road = Feature {
            geometry: Geometry::LineString(dense.clone()),
            attributes: RoadAttributes {
                fclass: RoadClass::parse("secondary"),
                bridge: false,
                tunnel: false,
                name: None,
            },
        };
        let layers = road_layers(&[&road], Crs::Utm34N);
        let exported =
            Geometry::<f64>::try_from(layers[0].features.features[0].geometry.clone().unwrap())
                .unwrap();
        let Geometry::LineString(line) = exported else {
            panic!("expected a line");
        };
        assert!(line.0.len() < dense.0.len());
        assert!(line.0.len() >= 2);

        // Lengths are measured on the source geometry, not the exported one
        assert!((crate::aggregate::planar_length(&road.geometry) - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_simplify_lines_leaves_points_alone() {
        let point = Geometry::Point(Point::new(21.0, 44.0));
        assert_eq!(simplify_lines(point.clone(), 0.001), point);
    }

    #[test]
    fn test_point_layers_fall_back_on_missing_names() {
        let station = Feature {
            geometry: Geometry::Point(Point::new(21.0, 44.0)),
            attributes: StationAttributes { name: None },
        };
        let layer = station_layer(&[&station], Crs::Wgs84);
        let props = layer.features.features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Unknown Station");

        let uni = Feature {
            geometry: Geometry::Point(Point::new(21.0, 44.0)),
            attributes: FacilityAttributes {
                name: None,
                kind: Some("university".to_string()),
            },
        };
        let school = Feature {
            geometry: Geometry::Point(Point::new(21.5, 44.0)),
            attributes: FacilityAttributes::default(),
        };
        let layers = school_layers(&[&uni, &school], Crs::Wgs84);
        assert_eq!(layers[0].len(), 1);
        assert_eq!(layers[1].len(), 1);
        let school_props = layers[0].features.features[0].properties.as_ref().unwrap();
        assert_eq!(school_props["type"], "Not specified");
        assert_eq!(school_props["name"], "Unknown");
        let uni_props = layers[1].features.features[0].properties.as_ref().unwrap();
        assert_eq!(uni_props["fill_color"], UNIVERSITY_FILL);
        assert_eq!(
            uni_props["popup"],
            "<b>Unknown</b><br>University<br>44.00000, 21.00000"
        );
    }

    #[test]
    fn test_rail_popup() {
        let plain = RailAttributes::default();
        assert_eq!(rail_popup(&plain), "Regular track");
        let both = RailAttributes {
            bridge: true,
            tunnel: true,
            name: None,
        };
        assert_eq!(rail_popup(&both), "<b>Bridge</b><br><b>Tunnel</b>");
    }
}
