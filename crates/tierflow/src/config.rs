//! Configuration types for Tierflow layouts.
//!
//! All types implement [`serde::Deserialize`] so they can be loaded from
//! TOML or JSON; every field falls back to its default when omitted.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining the sections below.
//! - [`LayoutConfig`] - Spacing, thresholds and engine behavior of the layout pipeline.
//! - [`CoordinateConfig`] - Caching and error budget of the coordinate system manager.
//!
//! # Example
//!
//! ```
//! # use tierflow::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.layout().base_height(), 200.0);
//! assert_eq!(config.coordinates().max_retries(), 3);
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Layout pipeline section.
    #[serde(default)]
    layout: LayoutConfig,

    /// Coordinate system manager section.
    #[serde(default)]
    coordinates: CoordinateConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(layout: LayoutConfig, coordinates: CoordinateConfig) -> Self {
        Self {
            layout,
            coordinates,
        }
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the coordinate system configuration.
    pub fn coordinates(&self) -> &CoordinateConfig {
        &self.coordinates
    }
}

/// Tunables of the hierarchical layout pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical distance between consecutive layers.
    base_height: f64,
    /// Horizontal spacing used when seeding the deepest layer.
    preferred_spacing: f64,
    /// Minimum center distance between nodes sharing a layer.
    min_spacing: f64,
    /// Largest parent re-centering move the aligner accepts.
    recenter_threshold: f64,
    /// Upper bound on the number of layers built by the sweep.
    max_layers: usize,
    /// Radius for matching an edge end to a branch anchor.
    match_distance: f64,
    /// Horizontal span above which centering falls back to a bounded shift.
    anomalous_span: f64,
    /// Coordinates beyond this magnitude are treated as corrupt.
    coordinate_limit: f64,
    /// Largest horizontal shift applied by the anomalous-span fallback.
    fallback_max_shift: f64,
    lock_timeout_ms: u64,
    debounce_delay_ms: u64,
    debounce_max_wait_ms: u64,
    enable_cache: bool,
    cache_capacity: usize,
    /// Reserved switch; the pipeline currently runs on the calling thread.
    enable_parallel_processing: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_height: 200.0,
            preferred_spacing: 200.0,
            min_spacing: 60.0,
            recenter_threshold: 50.0,
            max_layers: 20,
            match_distance: 50.0,
            anomalous_span: 1000.0,
            coordinate_limit: 10_000.0,
            fallback_max_shift: 200.0,
            lock_timeout_ms: 5000,
            debounce_delay_ms: 100,
            debounce_max_wait_ms: 1000,
            enable_cache: true,
            cache_capacity: 10,
            enable_parallel_processing: false,
        }
    }
}

impl LayoutConfig {
    pub fn base_height(&self) -> f64 {
        self.base_height
    }

    pub fn preferred_spacing(&self) -> f64 {
        self.preferred_spacing
    }

    pub fn min_spacing(&self) -> f64 {
        self.min_spacing
    }

    pub fn recenter_threshold(&self) -> f64 {
        self.recenter_threshold
    }

    pub fn max_layers(&self) -> usize {
        self.max_layers
    }

    pub fn match_distance(&self) -> f64 {
        self.match_distance
    }

    pub fn anomalous_span(&self) -> f64 {
        self.anomalous_span
    }

    pub fn coordinate_limit(&self) -> f64 {
        self.coordinate_limit
    }

    pub fn fallback_max_shift(&self) -> f64 {
        self.fallback_max_shift
    }

    /// Time after which a forgotten refresh lock releases itself
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Quiet period required before a debounced layout runs
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    /// Longest a debounced request can be postponed by newer requests
    pub fn debounce_max_wait(&self) -> Duration {
        Duration::from_millis(self.debounce_max_wait_ms)
    }

    pub fn enable_cache(&self) -> bool {
        self.enable_cache
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn enable_parallel_processing(&self) -> bool {
        self.enable_parallel_processing
    }

    /// Set the vertical distance between layers
    pub fn set_base_height(&mut self, base_height: f64) -> &mut Self {
        self.base_height = base_height;
        self
    }

    /// Set the spacing used to seed the deepest layer
    pub fn set_preferred_spacing(&mut self, spacing: f64) -> &mut Self {
        self.preferred_spacing = spacing;
        self
    }

    /// Set the minimum spacing between nodes of the same layer
    pub fn set_min_spacing(&mut self, spacing: f64) -> &mut Self {
        self.min_spacing = spacing;
        self
    }

    /// Set the layer cap
    pub fn set_max_layers(&mut self, max_layers: usize) -> &mut Self {
        self.max_layers = max_layers;
        self
    }

    /// Set the refresh lock timeout
    pub fn set_lock_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.lock_timeout_ms = duration_millis(timeout);
        self
    }

    /// Set the debounce quiet period and maximum wait
    pub fn set_debounce(&mut self, delay: Duration, max_wait: Duration) -> &mut Self {
        self.debounce_delay_ms = duration_millis(delay);
        self.debounce_max_wait_ms = duration_millis(max_wait);
        self
    }

    /// Enable or disable the layout result cache
    pub fn set_enable_cache(&mut self, enable: bool) -> &mut Self {
        self.enable_cache = enable;
        self
    }

    /// Set the number of cached layout results
    pub fn set_cache_capacity(&mut self, capacity: usize) -> &mut Self {
        self.cache_capacity = capacity;
        self
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Tunables of the coordinate system manager.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoordinateConfig {
    transform_cache_ms: u64,
    conversion_cache_capacity: usize,
    max_retries: usize,
    error_threshold: usize,
    abnormal_offset: f64,
}

impl Default for CoordinateConfig {
    fn default() -> Self {
        Self {
            transform_cache_ms: 100,
            conversion_cache_capacity: 1000,
            max_retries: 3,
            error_threshold: 10,
            abnormal_offset: 10_000.0,
        }
    }
}

impl CoordinateConfig {
    /// How long a fetched canvas transform is reused
    pub fn transform_cache_window(&self) -> Duration {
        Duration::from_millis(self.transform_cache_ms)
    }

    /// Number of conversions cached before caching stops
    pub fn conversion_cache_capacity(&self) -> usize {
        self.conversion_cache_capacity
    }

    /// Attempts made by a safe transform before it fails
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Errors tolerated before caches and error state are reset
    pub fn error_threshold(&self) -> usize {
        self.error_threshold
    }

    /// Offsets beyond this magnitude are discarded as abnormal
    pub fn abnormal_offset(&self) -> f64 {
        self.abnormal_offset
    }

    /// Set the transform cache window
    pub fn set_transform_cache_window(&mut self, window: Duration) -> &mut Self {
        self.transform_cache_ms = duration_millis(window);
        self
    }

    /// Set the conversion cache capacity
    pub fn set_conversion_cache_capacity(&mut self, capacity: usize) -> &mut Self {
        self.conversion_cache_capacity = capacity;
        self
    }

    /// Set the error threshold
    pub fn set_error_threshold(&mut self, threshold: usize) -> &mut Self {
        self.error_threshold = threshold;
        self
    }
}
