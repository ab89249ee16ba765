//! infradash - municipality-scoped infrastructure validation
//!
//! infradash turns OpenStreetMap-derived infrastructure layers (roads, rail
//! lines, stations, schools, hospitals) into per-municipality statistics and
//! render-ready map layers, so digitized data can be sanity-checked against
//! what people know about their own municipality.
//!
//! # Quick Start
//!
//! ```rust
//! use infradash::{DashboardConfigBuilder, DashboardContext, DataSource, roads_page};
//!
//! // Synthetic fixtures, no network access
//! let config = DashboardConfigBuilder::no_cache().build();
//! let ctx = DashboardContext::new(&DataSource::Test, config)?;
//!
//! // Free text in, canonical municipality out
//! let mut selection = ctx.new_selection();
//! let names = ctx.municipalities()?.names();
//! let outcome = selection.apply("sabac", names, &ctx.config().resolver);
//! assert!(outcome.is_selected());
//!
//! let page = roads_page(&ctx, selection.current())?;
//! println!("{page}");
//! # Ok::<(), infradash::error::InfraDashError>(())
//! ```
//!
//! # Components
//!
//! - **Name resolution**: accent-insensitive exact, substring and fuzzy
//!   matching of free text against the municipality reference set
//! - **Spatial aggregation**: intersection joins of feature layers against
//!   municipality boundaries, with national and municipality-scoped length
//!   and count summaries computed in a projected metric CRS
//! - **Pages**: statistics, a map view and styled GeoJSON layers per
//!   infrastructure domain
//!
//! # Data
//!
//! Layers are GeoJSON blobs in a cloud object store, cached on disk with a
//! TTL. A local directory with the same layout, or the built-in synthetic
//! fixtures, can be used instead.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod aggregate;
pub mod config;
mod context;
pub mod error;
pub mod map;
mod municipality;
pub mod pages;
pub mod resolve;

pub use aggregate::{
    FacilityStats, JoinedFeature, LinearStats, RailStats, RoadCategory, RoadStats, Scoped,
    join_municipalities, join_municipality, spatial_join,
};
pub use config::{DashboardConfig, DashboardConfigBuilder, ResolverConfig};
pub use context::DashboardContext;
pub use infradash_data_processing as data_processing;
pub use infradash_data_processing::{Crs, DataSource};
pub use map::{MapLayer, MapView};
pub use municipality::{Municipality, MunicipalitySet};
pub use pages::{
    HospitalsPage, Page, PageKind, RailsPage, RoadsPage, SchoolsPage, hospitals_page, rails_page,
    render_page, roads_page, schools_page,
};
pub use resolve::{
    MatchTier, MunicipalityNames, Resolution, SelectionOutcome, SelectionState, normalize,
};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for infradash.
///
/// Installs a `tracing` fmt subscriber. `RUST_LOG` takes precedence over
/// `level`. Calling this more than once is a no-op.
///
/// # Examples
///
/// ```rust
/// use infradash::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), infradash::error::InfraDashError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::InfraDashError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
