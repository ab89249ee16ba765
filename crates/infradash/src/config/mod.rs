use std::path::PathBuf;
use std::time::Duration;

use infradash_data_processing::{Crs, FetchOptions, ObjectStoreLayout, RetryPolicy};

use crate::error::{InfraDashError, Result};

pub const DEFAULT_MUNICIPALITY: &str = "Veliko Gradište";

/// Municipality resolution settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Minimum similarity in `[0, 1]` for a fuzzy candidate
    pub fuzzy_threshold: f64,
    pub max_fuzzy_candidates: usize,
    /// Select the best fuzzy candidate instead of listing all of them
    pub auto_apply_top_fuzzy: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.6,
            max_fuzzy_candidates: 3,
            auto_apply_top_fuzzy: false,
        }
    }
}

/// Everything a [`crate::DashboardContext`] needs besides the data source.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub resolver: ResolverConfig,
    /// Municipality shown before the user types anything
    pub default_municipality: String,
    /// Projected CRS used for lengths and spatial joins
    pub metric_crs: Crs,
    /// Initial zoom level of the map view
    pub map_zoom: u8,
    pub layout: ObjectStoreLayout,
    pub fetch: FetchOptions,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            default_municipality: DEFAULT_MUNICIPALITY.to_string(),
            metric_crs: Crs::Utm34N,
            map_zoom: 12,
            layout: ObjectStoreLayout::default(),
            fetch: FetchOptions::default(),
        }
    }
}

fn check_metric_crs(crs: Crs) -> Result<()> {
    if crs.is_projected() {
        Ok(())
    } else {
        Err(InfraDashError::ConfigError(format!(
            "{crs} is geographic; lengths need a projected CRS"
        )))
    }
}

fn check_fuzzy_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(InfraDashError::ConfigError(format!(
            "Fuzzy threshold must be within [0, 1], got {threshold}"
        )))
    }
}

impl DashboardConfig {
    /// Reject settings the builder would have refused. Fields are public, so
    /// a config edited in place is checked again before use.
    pub fn validate(&self) -> Result<()> {
        check_metric_crs(self.metric_crs)?;
        check_fuzzy_threshold(self.resolver.fuzzy_threshold)?;
        if self.resolver.max_fuzzy_candidates == 0 {
            return Err(InfraDashError::ConfigError(
                "At least one fuzzy candidate must be allowed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`DashboardConfig`].
#[derive(Debug, Clone, Default)]
pub struct DashboardConfigBuilder {
    config: DashboardConfig,
}

impl DashboardConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DashboardConfig::default(),
        }
    }

    /// Measure in EPSG:3857 so figures line up with tools that report Web
    /// Mercator lengths. These overstate true lengths by roughly 1/cos(lat),
    /// about 40% over Serbia.
    pub fn web_mercator_compat() -> Self {
        let mut builder = Self::new();
        builder.config.metric_crs = Crs::WebMercator;
        builder
    }

    /// Read straight from the source on every load, without the on-disk cache
    pub fn no_cache() -> Self {
        let mut builder = Self::new();
        builder.config.fetch.cache_dir = None;
        builder
    }

    pub fn fuzzy_threshold(mut self, threshold: f64) -> Result<Self> {
        check_fuzzy_threshold(threshold)?;
        self.config.resolver.fuzzy_threshold = threshold;
        Ok(self)
    }

    pub fn max_fuzzy_candidates(mut self, max: usize) -> Self {
        self.config.resolver.max_fuzzy_candidates = max.max(1);
        self
    }

    pub fn auto_apply_top_fuzzy(mut self, enabled: bool) -> Self {
        self.config.resolver.auto_apply_top_fuzzy = enabled;
        self
    }

    pub fn default_municipality(mut self, name: impl Into<String>) -> Self {
        self.config.default_municipality = name.into();
        self
    }

    /// Set the CRS used for measurements. Must be projected.
    pub fn metric_crs(mut self, crs: Crs) -> Result<Self> {
        check_metric_crs(crs)?;
        self.config.metric_crs = crs;
        Ok(self)
    }

    pub fn map_zoom(mut self, zoom: u8) -> Self {
        self.config.map_zoom = zoom.clamp(1, 20);
        self
    }

    pub fn layout(mut self, layout: ObjectStoreLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.fetch.cache_dir = dir;
        self
    }

    /// How long cached blobs stay fresh; `None` keeps them forever
    pub fn cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.config.fetch.cache_ttl = ttl;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.fetch.retry = retry;
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.config.fetch.token = token;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch.timeout = timeout;
        self
    }

    pub fn build(self) -> DashboardConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_catches_in_place_edits() {
        assert!(DashboardConfig::default().validate().is_ok());

        let mut geographic = DashboardConfig::default();
        geographic.metric_crs = Crs::Wgs84;
        assert!(matches!(geographic.validate(), Err(InfraDashError::ConfigError(_))));

        let mut threshold = DashboardConfig::default();
        threshold.resolver.fuzzy_threshold = 1.5;
        assert!(threshold.validate().is_err());

        let mut candidates = DashboardConfig::default();
        candidates.resolver.max_fuzzy_candidates = 0;
        assert!(candidates.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = DashboardConfigBuilder::new().build();
        assert_eq!(config.default_municipality, "Veliko Gradište");
        assert_eq!(config.metric_crs, Crs::Utm34N);
        assert!((config.resolver.fuzzy_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.resolver.max_fuzzy_candidates, 3);
        assert!(!config.resolver.auto_apply_top_fuzzy);
        assert_eq!(config.fetch.cache_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.map_zoom, 12);
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            DashboardConfigBuilder::web_mercator_compat().build().metric_crs,
            Crs::WebMercator
        );
        assert!(DashboardConfigBuilder::no_cache().build().fetch.cache_dir.is_none());
    }

    #[test]
    fn test_validation() {
        assert!(DashboardConfigBuilder::new().fuzzy_threshold(1.5).is_err());
        assert!(DashboardConfigBuilder::new().metric_crs(Crs::Wgs84).is_err());
        let config = DashboardConfigBuilder::new()
            .fuzzy_threshold(0.8)
            .unwrap()
            .max_fuzzy_candidates(0)
            .build();
        assert_eq!(config.resolver.max_fuzzy_candidates, 1);
    }
}
