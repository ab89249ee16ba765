//! Render-ready dashboard pages.
//!
//! Each page takes a [`DashboardContext`] and a canonical municipality name
//! and returns statistics at national and municipality scope, the map view
//! framing the municipality, and the styled layers to draw. The national
//! figures always cover the full collection; the municipality figures cover
//! the spatially joined subset.

use std::fmt;

use serde_json::{Value, json};
use tracing::{info, instrument};

use infradash_data_processing::Crs;

use crate::aggregate::{
    FacilityStats, RailStats, RoadCategory, RoadStats, Scoped, join_municipality,
};
use crate::context::DashboardContext;
use crate::error::Result;
use crate::map::{
    MapLayer, MapView, boundary_layer, hospital_layer, rail_layer, road_layers, school_layers,
    station_layer,
};
use crate::municipality::Municipality;

/// The infrastructure domains the dashboard has a page for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Roads,
    Rails,
    Schools,
    Hospitals,
}

impl PageKind {
    pub const ALL: [Self; 4] = [Self::Roads, Self::Rails, Self::Schools, Self::Hospitals];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Roads => "Road Infrastructure",
            Self::Rails => "Rail Infrastructure",
            Self::Schools => "Schools",
            Self::Hospitals => "Hospitals",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Common surface of every page. `Display` renders the text report.
pub trait Page: fmt::Display {
    fn kind(&self) -> PageKind;

    /// Canonical name of the municipality the page is scoped to
    fn municipality(&self) -> &str;

    fn view(&self) -> &MapView;

    /// Layers in drawing order, the boundary first.
    fn layers(&self) -> &[MapLayer];

    /// View and layers as one JSON document, for handing to a map surface.
    fn to_map_document(&self) -> Result<String> {
        let view = self.view();
        let layers = self
            .layers()
            .iter()
            .map(|layer| {
                Ok(json!({
                    "name": layer.name,
                    "data": serde_json::to_value(&layer.features)?,
                }))
            })
            .collect::<Result<Vec<Value>>>()?;
        let document = json!({
            "page": self.kind().title(),
            "municipality": self.municipality(),
            "view": {
                "center": [view.center.y, view.center.x],
                "bounds": view.lat_lon_bounds(),
                "zoom": view.zoom,
            },
            "layers": layers,
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

/// The selected municipality, the CRS its boundary is in and the map view
/// framing it.
struct Selection<'a> {
    municipality: &'a Municipality,
    crs: Crs,
    view: MapView,
}

fn select<'a>(ctx: &'a DashboardContext, name: &str) -> Result<Selection<'a>> {
    let municipalities = ctx.municipalities()?;
    let municipality = municipalities.get(name)?;
    let crs = municipalities.crs();
    let view = MapView::for_municipality(municipality, crs, ctx.config().map_zoom)?;
    Ok(Selection {
        municipality,
        crs,
        view,
    })
}

fn write_map_summary(
    f: &mut fmt::Formatter<'_>,
    view: &MapView,
    layers: &[MapLayer],
) -> fmt::Result {
    writeln!(
        f,
        "Map: center {:.5}, {:.5} at zoom {}",
        view.center.y, view.center.x, view.zoom
    )?;
    for layer in layers {
        writeln!(f, "  {} ({} features)", layer.name, layer.len())?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadsPage {
    pub municipality: String,
    pub stats: Scoped<RoadStats>,
    pub view: MapView,
    pub layers: Vec<MapLayer>,
}

#[instrument(name = "Roads page", skip(ctx), level = "info")]
pub fn roads_page(ctx: &DashboardContext, municipality: &str) -> Result<RoadsPage> {
    let selection = select(ctx, municipality)?;
    let roads = ctx.roads()?;
    let joined = join_municipality(roads, ctx.municipalities()?, municipality)?;

    let stats = Scoped {
        national: RoadStats::from_features(roads),
        municipality: RoadStats::from_features(joined.iter().copied()),
    };
    let mut layers = vec![boundary_layer(selection.municipality, selection.crs)];
    layers.extend(road_layers(&joined, selection.crs));

    info!(
        segments = stats.municipality.linear.segments,
        total_km = stats.municipality.linear.total_km,
        "Roads page ready"
    );
    Ok(RoadsPage {
        municipality: selection.municipality.name.clone(),
        stats,
        view: selection.view,
        layers,
    })
}

fn write_road_stats(f: &mut fmt::Formatter<'_>, heading: &str, stats: &RoadStats) -> fmt::Result {
    writeln!(f, "{heading}")?;
    writeln!(f, "  Total road length: {:.2} km", stats.linear.total_km)?;
    for category in RoadCategory::ALL {
        writeln!(f, "  {category} roads: {:.2} km", stats.category_km(category))?;
    }
    writeln!(f, "  Bridges: {}", stats.linear.bridges)?;
    writeln!(f, "  Tunnels: {}", stats.linear.tunnels)
}

impl fmt::Display for RoadsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind())?;
        write_road_stats(f, "National overview", &self.stats.national)?;
        write_road_stats(
            f,
            &format!("{} overview", self.municipality),
            &self.stats.municipality,
        )?;
        write_map_summary(f, &self.view, &self.layers)
    }
}

impl Page for RoadsPage {
    fn kind(&self) -> PageKind {
        PageKind::Roads
    }

    fn municipality(&self) -> &str {
        &self.municipality
    }

    fn view(&self) -> &MapView {
        &self.view
    }

    fn layers(&self) -> &[MapLayer] {
        &self.layers
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RailsPage {
    pub municipality: String,
    pub stats: Scoped<RailStats>,
    pub view: MapView,
    pub layers: Vec<MapLayer>,
}

#[instrument(name = "Rails page", skip(ctx), level = "info")]
pub fn rails_page(ctx: &DashboardContext, municipality: &str) -> Result<RailsPage> {
    let selection = select(ctx, municipality)?;
    let municipalities = ctx.municipalities()?;
    let rails = ctx.rails()?;
    let stations = ctx.stations()?;
    let joined_rails = join_municipality(rails, municipalities, municipality)?;
    let joined_stations = join_municipality(stations, municipalities, municipality)?;

    let stats = Scoped {
        national: RailStats::from_features(rails, stations),
        municipality: RailStats::from_features(
            joined_rails.iter().copied(),
            joined_stations.iter().copied(),
        ),
    };
    let layers = vec![
        boundary_layer(selection.municipality, selection.crs),
        rail_layer(&joined_rails, selection.crs),
        station_layer(&joined_stations, selection.crs),
    ];

    info!(
        segments = stats.municipality.linear.segments,
        stations = stats.municipality.stations,
        "Rails page ready"
    );
    Ok(RailsPage {
        municipality: selection.municipality.name.clone(),
        stats,
        view: selection.view,
        layers,
    })
}

fn write_rail_stats(f: &mut fmt::Formatter<'_>, heading: &str, stats: &RailStats) -> fmt::Result {
    writeln!(f, "{heading}")?;
    writeln!(f, "  Total rail length: {:.2} km", stats.linear.total_km)?;
    writeln!(f, "  Bridges: {}", stats.linear.bridges)?;
    writeln!(f, "  Tunnels: {}", stats.linear.tunnels)?;
    writeln!(f, "  Stations: {}", stats.stations)
}

impl fmt::Display for RailsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind())?;
        write_rail_stats(f, "National overview", &self.stats.national)?;
        write_rail_stats(
            f,
            &format!("{} overview", self.municipality),
            &self.stats.municipality,
        )?;
        write_map_summary(f, &self.view, &self.layers)
    }
}

impl Page for RailsPage {
    fn kind(&self) -> PageKind {
        PageKind::Rails
    }

    fn municipality(&self) -> &str {
        &self.municipality
    }

    fn view(&self) -> &MapView {
        &self.view
    }

    fn layers(&self) -> &[MapLayer] {
        &self.layers
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolsPage {
    pub municipality: String,
    pub stats: Scoped<FacilityStats>,
    pub view: MapView,
    pub layers: Vec<MapLayer>,
}

#[instrument(name = "Schools page", skip(ctx), level = "info")]
pub fn schools_page(ctx: &DashboardContext, municipality: &str) -> Result<SchoolsPage> {
    let selection = select(ctx, municipality)?;
    let schools = ctx.schools()?;
    let joined = join_municipality(schools, ctx.municipalities()?, municipality)?;

    let stats = Scoped {
        national: FacilityStats::from_features(schools),
        municipality: FacilityStats::from_features(joined.iter().copied()),
    };
    let mut layers = vec![boundary_layer(selection.municipality, selection.crs)];
    layers.extend(school_layers(&joined, selection.crs));

    info!(
        schools = stats.municipality.other(),
        universities = stats.municipality.higher_education,
        "Schools page ready"
    );
    Ok(SchoolsPage {
        municipality: selection.municipality.name.clone(),
        stats,
        view: selection.view,
        layers,
    })
}

fn write_school_stats(
    f: &mut fmt::Formatter<'_>,
    heading: &str,
    stats: &FacilityStats,
) -> fmt::Result {
    writeln!(f, "{heading}")?;
    writeln!(f, "  Schools: {}", stats.other())?;
    writeln!(f, "  Universities: {}", stats.higher_education)
}

impl fmt::Display for SchoolsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind())?;
        write_school_stats(f, "National overview", &self.stats.national)?;
        write_school_stats(
            f,
            &format!("{} overview", self.municipality),
            &self.stats.municipality,
        )?;
        write_map_summary(f, &self.view, &self.layers)
    }
}

impl Page for SchoolsPage {
    fn kind(&self) -> PageKind {
        PageKind::Schools
    }

    fn municipality(&self) -> &str {
        &self.municipality
    }

    fn view(&self) -> &MapView {
        &self.view
    }

    fn layers(&self) -> &[MapLayer] {
        &self.layers
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HospitalsPage {
    pub municipality: String,
    pub stats: Scoped<FacilityStats>,
    pub view: MapView,
    pub layers: Vec<MapLayer>,
}

#[instrument(name = "Hospitals page", skip(ctx), level = "info")]
pub fn hospitals_page(ctx: &DashboardContext, municipality: &str) -> Result<HospitalsPage> {
    let selection = select(ctx, municipality)?;
    let hospitals = ctx.hospitals()?;
    let joined = join_municipality(hospitals, ctx.municipalities()?, municipality)?;

    let stats = Scoped {
        national: FacilityStats::from_features(hospitals),
        municipality: FacilityStats::from_features(joined.iter().copied()),
    };
    let layers = vec![
        boundary_layer(selection.municipality, selection.crs),
        hospital_layer(&joined, selection.crs),
    ];

    info!(hospitals = stats.municipality.total, "Hospitals page ready");
    Ok(HospitalsPage {
        municipality: selection.municipality.name.clone(),
        stats,
        view: selection.view,
        layers,
    })
}

impl fmt::Display for HospitalsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind())?;
        writeln!(f, "National overview")?;
        writeln!(f, "  Hospitals: {}", self.stats.national.total)?;
        writeln!(f, "{} overview", self.municipality)?;
        writeln!(f, "  Hospitals: {}", self.stats.municipality.total)?;
        write_map_summary(f, &self.view, &self.layers)
    }
}

impl Page for HospitalsPage {
    fn kind(&self) -> PageKind {
        PageKind::Hospitals
    }

    fn municipality(&self) -> &str {
        &self.municipality
    }

    fn view(&self) -> &MapView {
        &self.view
    }

    fn layers(&self) -> &[MapLayer] {
        &self.layers
    }
}

/// Build the page of `kind` for `municipality`.
pub fn render_page(
    ctx: &DashboardContext,
    kind: PageKind,
    municipality: &str,
) -> Result<Box<dyn Page>> {
    Ok(match kind {
        PageKind::Roads => Box::new(roads_page(ctx, municipality)?),
        PageKind::Rails => Box::new(rails_page(ctx, municipality)?),
        PageKind::Schools => Box::new(schools_page(ctx, municipality)?),
        PageKind::Hospitals => Box::new(hospitals_page(ctx, municipality)?),
    })
}
