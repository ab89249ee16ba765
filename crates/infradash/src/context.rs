//! Session-scoped reference data.
//!
//! A [`DashboardContext`] owns the blob store and the configuration, and loads
//! every layer at most once, on first use. Loaded layers are reprojected into
//! the configured metric CRS and never mutated afterwards.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use tracing::{info, instrument};

use infradash_data_processing::{
    BlobStore, DataSource, FacilityAttributes, FeatureCollection, FeatureSchema, Layer,
    MunicipalityAttributes, RailAttributes, RoadAttributes, StationAttributes,
    decode_feature_collection,
};

use crate::config::DashboardConfig;
use crate::error::Result;
use crate::municipality::MunicipalitySet;
use crate::resolve::SelectionState;

pub struct DashboardContext {
    config: DashboardConfig,
    store: Arc<dyn BlobStore>,
    municipalities: OnceCell<MunicipalitySet>,
    roads: OnceCell<FeatureCollection<RoadAttributes>>,
    rails: OnceCell<FeatureCollection<RailAttributes>>,
    stations: OnceCell<FeatureCollection<StationAttributes>>,
    schools: OnceCell<FeatureCollection<FacilityAttributes>>,
    hospitals: OnceCell<FeatureCollection<FacilityAttributes>>,
}

impl fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardContext")
            .field("store", &self.store)
            .field("metric_crs", &self.config.metric_crs)
            .field("municipalities_loaded", &self.municipalities.get().is_some())
            .finish_non_exhaustive()
    }
}

impl DashboardContext {
    /// Open `source` and prepare lazy layer loading.
    ///
    /// Fails with `ConfigError` when `config` does not validate, e.g. a
    /// geographic metric CRS.
    #[instrument(name = "Create DashboardContext", skip(config), level = "info")]
    pub fn new(source: &DataSource, config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        let store = source.open(&config.fetch)?;
        Self::with_store(store, config)
    }

    /// Use an already opened blob store.
    pub fn with_store(store: Arc<dyn BlobStore>, config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            municipalities: OnceCell::new(),
            roads: OnceCell::new(),
            rails: OnceCell::new(),
            stations: OnceCell::new(),
            schools: OnceCell::new(),
            hospitals: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// A fresh selection starting at the configured default municipality.
    #[must_use]
    pub fn new_selection(&self) -> SelectionState {
        SelectionState::new(self.config.default_municipality.clone())
    }

    fn load_layer<A: FeatureSchema>(&self, layer: Layer) -> Result<FeatureCollection<A>> {
        let t_load = std::time::Instant::now();
        let location = self.config.layout.location(layer);
        let bytes = self.store.fetch(&location)?;
        let collection =
            decode_feature_collection::<A>(layer.name(), &bytes)?.to_crs(self.config.metric_crs);
        info!(
            %layer,
            features = collection.len(),
            elapsed = ?t_load.elapsed(),
            "Layer ready"
        );
        Ok(collection)
    }

    pub fn municipalities(&self) -> Result<&MunicipalitySet> {
        self.municipalities.get_or_try_init(|| {
            self.load_layer::<MunicipalityAttributes>(Layer::Municipalities)
                .map(MunicipalitySet::from_collection)
        })
    }

    pub fn roads(&self) -> Result<&FeatureCollection<RoadAttributes>> {
        self.roads.get_or_try_init(|| self.load_layer(Layer::Roads))
    }

    pub fn rails(&self) -> Result<&FeatureCollection<RailAttributes>> {
        self.rails.get_or_try_init(|| self.load_layer(Layer::Rails))
    }

    pub fn stations(&self) -> Result<&FeatureCollection<StationAttributes>> {
        self.stations.get_or_try_init(|| self.load_layer(Layer::Stations))
    }

    pub fn schools(&self) -> Result<&FeatureCollection<FacilityAttributes>> {
        self.schools.get_or_try_init(|| self.load_layer(Layer::Schools))
    }

    pub fn hospitals(&self) -> Result<&FeatureCollection<FacilityAttributes>> {
        self.hospitals.get_or_try_init(|| self.load_layer(Layer::Hospitals))
    }

    /// Branding image, as raw bytes.
    pub fn logo(&self) -> Result<Bytes> {
        Ok(self.store.fetch(&self.config.layout.logo)?)
    }

    /// Fetch every layer and the logo in one batch, filling the blob cache.
    ///
    /// Returns the total number of bytes fetched.
    #[instrument(name = "Prefetch layers", skip(self), level = "info")]
    pub fn prefetch(&self) -> Result<usize> {
        let mut locations: Vec<_> = Layer::ALL
            .iter()
            .map(|&layer| self.config.layout.location(layer))
            .collect();
        locations.push(self.config.layout.logo.clone());
        let blobs = self.store.fetch_many(&locations)?;
        let total: usize = blobs.iter().map(Bytes::len).sum();
        info!(blobs = blobs.len(), bytes = total, "Prefetch complete");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfigBuilder;
    use infradash_data_processing::{Crs, TEST_MUNICIPALITIES};

    fn context() -> DashboardContext {
        DashboardContext::new(&DataSource::Test, DashboardConfigBuilder::no_cache().build()).unwrap()
    }

    #[test]
    fn test_layers_load_once_in_metric_crs() {
        let ctx = context();
        assert!(std::ptr::eq(ctx.roads().unwrap(), ctx.roads().unwrap()));
        assert_eq!(ctx.roads().unwrap().crs, Crs::Utm34N);
        assert_eq!(ctx.hospitals().unwrap().crs, Crs::Utm34N);
    }

    #[test]
    fn test_municipalities_and_selection() {
        let ctx = context();
        let set = ctx.municipalities().unwrap();
        assert_eq!(set.names().iter().collect::<Vec<_>>(), TEST_MUNICIPALITIES);
        assert_eq!(ctx.new_selection().current(), "Veliko Gradište");
    }

    #[test]
    fn test_prefetch_and_logo() {
        let ctx = context();
        assert!(ctx.prefetch().unwrap() > 0);
        assert!(ctx.logo().unwrap().starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_geographic_metric_crs_is_rejected() {
        let mut config = DashboardConfigBuilder::no_cache().build();
        config.metric_crs = Crs::Wgs84;
        assert!(matches!(
            DashboardContext::new(&DataSource::Test, config.clone()),
            Err(crate::error::InfraDashError::ConfigError(_))
        ));

        let store = Arc::new(infradash_data_processing::TestObjectStore::new().unwrap());
        assert!(DashboardContext::with_store(store, config).is_err());
    }

    #[test]
    fn test_missing_layer_surfaces_data_error() {
        let mut config = DashboardConfigBuilder::no_cache().build();
        config.layout.prefix = "elsewhere".to_string();
        let ctx = DashboardContext::new(&DataSource::Test, config).unwrap();
        assert!(matches!(
            ctx.rails(),
            Err(crate::error::InfraDashError::DataProcessing(_))
        ));
    }
}
