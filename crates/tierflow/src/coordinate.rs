//! Conversion between logical graph coordinates and screen coordinates.
//!
//! The [`CoordinateSystemManager`] reads the pan/zoom state of a
//! [`ViewSource`] and maps points both ways. It also measures how far a
//! node's rendered position drifted from where the transform says it should
//! be, and compensates drag hints, preview paths and layout positions for
//! that drift.
//!
//! # Caching
//!
//! The view transform is reused for a short window. Individual conversions
//! are cached by exact input until the cache reaches its capacity; after that
//! nothing new is cached. Both caches are dropped wholesale when the graph
//! changes, on [`CoordinateSystemManager::clear_cache`], and when the error
//! threshold is exceeded. Conversions are also dropped whenever a refreshed
//! view transform differs from the cached one.
//!
//! # Example
//!
//! ```
//! # use std::sync::Arc;
//! # use tierflow::collaborator::MemoryCanvas;
//! # use tierflow::config::CoordinateConfig;
//! # use tierflow::coordinate::CoordinateSystemManager;
//! # use tierflow::geometry::{Point, ViewTransform};
//! let mut canvas = MemoryCanvas::default();
//! canvas.set_view_transform(ViewTransform::new(Point::new(50.0, 20.0), 1.5, 1.5));
//!
//! let mut manager = CoordinateSystemManager::new(CoordinateConfig::default());
//! manager.set_graph(Arc::new(canvas));
//!
//! let dom = manager.logical_to_dom(Point::new(100.0, 100.0))?;
//! assert_eq!(dom, Point::new(200.0, 170.0));
//! # Ok::<(), tierflow::LayoutError>(())
//! ```

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};
use serde::Serialize;

use tierflow_core::geometry::{Point, Size, ViewTransform};

use crate::{LayoutError, collaborator::ViewSource, config::CoordinateConfig};

/// Size assumed for a drag hint's source node when none is known.
const DEFAULT_HINT_NODE_SIZE: Size = Size::new(120.0, 40.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConversionKey {
    Logical(u64, u64),
    Dom(u64, u64),
}

impl ConversionKey {
    fn logical(point: Point) -> Self {
        Self::Logical(point.x().to_bits(), point.y().to_bits())
    }

    fn dom(point: Point) -> Self {
        Self::Dom(point.x().to_bits(), point.y().to_bits())
    }
}

/// Conversion cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_calculations: u64,
    /// Hits as a percentage of lookups
    pub hit_rate: f64,
    pub cache_size: usize,
}

/// Error budget state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub error_count: usize,
    /// Time since the most recent error
    pub last_error_age: Option<Duration>,
    pub error_threshold: usize,
    pub max_retries: usize,
}

/// Cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatus {
    pub conversions: usize,
    pub has_transform: bool,
    pub transform_window: Duration,
}

/// Snapshot of the manager's state for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateStatus {
    pub has_graph: bool,
    pub transform: ViewTransform,
    pub cache: CacheStatus,
    pub performance: PerformanceStats,
    pub errors: ErrorStats,
}

/// A preview line path in screen space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewPath {
    pub start: Point,
    pub end: Point,
    pub control_points: Vec<Point>,
}

impl PreviewPath {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            control_points: Vec::new(),
        }
    }

    pub fn with_control_points(mut self, points: Vec<Point>) -> Self {
        self.control_points = points;
        self
    }

    fn shifted(&self, delta: Point) -> Self {
        Self {
            start: self.start.sub_point(delta),
            end: self.end.sub_point(delta),
            control_points: self.control_points.iter().map(|p| p.sub_point(delta)).collect(),
        }
    }
}

/// Outcome of comparing a node's computed and rendered screen placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformValidation {
    pub node_id: String,
    pub logical_position: Point,
    pub calculated_dom_position: Point,
    pub actual_dom_center: Option<Point>,
    /// `actual_dom_center - calculated_dom_position`
    pub difference: Option<Point>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    cache_hits: u64,
    cache_misses: u64,
    total_calculations: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ErrorState {
    count: usize,
    last_error: Option<Instant>,
}

/// Maps points between logical and screen space for one graph.
pub struct CoordinateSystemManager {
    config: CoordinateConfig,
    graph: Option<Arc<dyn ViewSource + Send + Sync>>,
    transform_cache: Option<(ViewTransform, Instant)>,
    conversions: HashMap<ConversionKey, Point>,
    counters: Counters,
    errors: ErrorState,
}

impl std::fmt::Debug for CoordinateSystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateSystemManager")
            .field("config", &self.config)
            .field("has_graph", &self.graph.is_some())
            .field("conversions", &self.conversions.len())
            .field("errors", &self.errors.count)
            .finish_non_exhaustive()
    }
}

impl Default for CoordinateSystemManager {
    fn default() -> Self {
        Self::new(CoordinateConfig::default())
    }
}

impl CoordinateSystemManager {
    pub fn new(config: CoordinateConfig) -> Self {
        Self {
            config,
            graph: None,
            transform_cache: None,
            conversions: HashMap::new(),
            counters: Counters::default(),
            errors: ErrorState::default(),
        }
    }

    /// Binds the manager to a graph and drops every cached value.
    pub fn set_graph(&mut self, graph: Arc<dyn ViewSource + Send + Sync>) {
        self.graph = Some(graph);
        self.clear_cache();
        debug!("Coordinate manager bound to graph");
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    /// Current view transform, sanitized so it is always invertible.
    ///
    /// Without a graph this is the identity.
    pub fn canvas_transform(&mut self) -> ViewTransform {
        let Some(graph) = &self.graph else {
            return ViewTransform::identity();
        };

        let now = Instant::now();
        if let Some((transform, fetched)) = self.transform_cache {
            if now.saturating_duration_since(fetched) < self.config.transform_cache_window() {
                return transform;
            }
        }

        let transform = graph.view_transform().sanitized();
        if let Some((previous, _)) = self.transform_cache {
            if previous != transform {
                let dropped = self.conversions.len();
                debug!(dropped; "View transform changed, clearing conversion cache");
                self.conversions.clear();
            }
        }
        self.transform_cache = Some((transform, now));
        trace!(transform:?; "Canvas transform refreshed");
        transform
    }

    /// Maps a logical point to screen space.
    ///
    /// Without a graph the point is returned unchanged. A non-finite input is
    /// recorded as an error and maps to the origin.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TransformFailed`] when every retry produced an
    /// unusable value or the error threshold was exceeded.
    pub fn logical_to_dom(&mut self, point: Point) -> Result<Point, LayoutError> {
        self.convert(point, ConversionKey::logical(point), "logical_to_dom", ViewTransform::apply)
    }

    /// Maps a screen point to logical space. Mirrors [`Self::logical_to_dom`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::logical_to_dom`].
    pub fn dom_to_logical(&mut self, point: Point) -> Result<Point, LayoutError> {
        self.convert(point, ConversionKey::dom(point), "dom_to_logical", ViewTransform::invert)
    }

    fn convert(
        &mut self,
        point: Point,
        key: ConversionKey,
        method: &str,
        map: fn(ViewTransform, Point) -> Point,
    ) -> Result<Point, LayoutError> {
        if self.graph.is_none() {
            return Ok(point);
        }
        if !point.is_finite() {
            self.record_error(method, "input coordinates are not finite")?;
            return Ok(Point::default());
        }

        // Refresh first so a pan or zoom drops conversions made under the old view
        self.canvas_transform();
        self.counters.total_calculations += 1;
        if let Some(cached) = self.conversions.get(&key) {
            self.counters.cache_hits += 1;
            return Ok(*cached);
        }
        self.counters.cache_misses += 1;

        let result = self.safe_coordinate_transform(point, map)?;
        if self.conversions.len() < self.config.conversion_cache_capacity() {
            self.conversions.insert(key, result);
        }
        Ok(result)
    }

    /// Applies `map` with the current transform, retrying with a freshly
    /// fetched transform while the result is not finite.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TransformFailed`] after the configured number
    /// of attempts, or as soon as the error threshold is exceeded.
    pub fn safe_coordinate_transform(
        &mut self,
        point: Point,
        map: impl Fn(ViewTransform, Point) -> Point,
    ) -> Result<Point, LayoutError> {
        let attempts = self.config.max_retries().max(1);
        for attempt in 1..=attempts {
            let transform = self.canvas_transform();
            let result = map(transform, point);
            if result.is_finite() {
                return Ok(result);
            }
            self.record_error(
                "safe_coordinate_transform",
                &format!("transform attempt {attempt} produced a non-finite result"),
            )?;
            self.transform_cache = None;
        }

        warn!(attempts; "Coordinate transform failed");
        Err(LayoutError::TransformFailed {
            attempts,
            reason: "result was not finite".to_string(),
        })
    }

    /// Screen top-left of a rendered node
    pub fn node_dom_position(&self, node_id: &str) -> Option<Point> {
        let bounds = self.graph.as_ref()?.rendered_bounds(node_id)?;
        bounds.is_valid().then(|| bounds.min_point())
    }

    /// Screen center of a rendered node
    pub fn node_dom_center(&self, node_id: &str) -> Option<Point> {
        let bounds = self.graph.as_ref()?.rendered_bounds(node_id)?;
        bounds.is_valid().then(|| bounds.center())
    }

    /// Difference between where a node is drawn and where the transform
    /// places its logical position.
    ///
    /// Missing data and abnormally large offsets are recorded as errors and
    /// yield a zero offset.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TransformFailed`] only when the error threshold
    /// is exceeded.
    pub fn calculate_coordinate_offset(&mut self, node_id: &str) -> Result<Point, LayoutError> {
        const METHOD: &str = "calculate_coordinate_offset";

        let Some(graph) = self.graph.clone() else {
            self.record_error(METHOD, "graph not initialized")?;
            return Ok(Point::default());
        };
        let Some(logical) = graph.node_position(node_id).filter(|p| p.is_finite()) else {
            self.record_error(METHOD, &format!("no valid position for node `{node_id}`"))?;
            return Ok(Point::default());
        };
        let Some(rendered) = self.node_dom_position(node_id) else {
            self.record_error(METHOD, &format!("screen position unavailable for node `{node_id}`"))?;
            return Ok(Point::default());
        };

        let expected = match self.logical_to_dom(logical) {
            Ok(expected) => expected,
            Err(err) => {
                self.record_error(METHOD, &err.to_string())?;
                return Ok(Point::default());
            }
        };

        let offset = rendered.sub_point(expected);
        let limit = self.config.abnormal_offset();
        if !offset.is_within(limit) {
            self.record_error(
                METHOD,
                &format!("abnormal offset ({}, {})", offset.x(), offset.y()),
            )?;
            return Ok(Point::default());
        }
        Ok(offset)
    }

    /// Compensates a computed layout position for the node's screen drift.
    ///
    /// # Errors
    ///
    /// See [`Self::calculate_coordinate_offset`].
    pub fn correct_layout_position(&mut self, node_id: &str, position: Point) -> Result<Point, LayoutError> {
        if self.graph.is_none() {
            return Ok(position);
        }
        let offset = self.calculate_coordinate_offset(node_id)?;
        Ok(position.sub_point(offset))
    }

    /// Position of the drag hint at the right-middle of a source node,
    /// compensated for the node's screen drift.
    ///
    /// A missing or zero size falls back to the default node size.
    ///
    /// # Errors
    ///
    /// See [`Self::calculate_coordinate_offset`].
    pub fn correct_drag_hint_position(
        &mut self,
        source_id: &str,
        node_position: Point,
        node_size: Option<Size>,
    ) -> Result<Point, LayoutError> {
        if self.graph.is_none() {
            return Ok(node_position);
        }
        let offset = self.calculate_coordinate_offset(source_id)?;

        let size = node_size.unwrap_or(DEFAULT_HINT_NODE_SIZE);
        let width = positive_or(size.width(), DEFAULT_HINT_NODE_SIZE.width());
        let height = positive_or(size.height(), DEFAULT_HINT_NODE_SIZE.height());
        let base = node_position.add_point(Point::new(width, height / 2.0));
        Ok(base.sub_point(offset))
    }

    /// Compensates every point of a preview line for its source's drift.
    ///
    /// # Errors
    ///
    /// See [`Self::calculate_coordinate_offset`].
    pub fn correct_preview_path(&mut self, source_id: &str, path: &PreviewPath) -> Result<PreviewPath, LayoutError> {
        if self.graph.is_none() {
            return Ok(path.clone());
        }
        let offset = self.calculate_coordinate_offset(source_id)?;
        Ok(path.shifted(offset))
    }

    /// Compares the transform's prediction for a node with its rendered center.
    ///
    /// Returns `None` without a graph or when the node has no valid position.
    ///
    /// # Errors
    ///
    /// See [`Self::logical_to_dom`].
    pub fn validate_coordinate_transform(
        &mut self,
        node_id: &str,
    ) -> Result<Option<TransformValidation>, LayoutError> {
        let Some(graph) = self.graph.clone() else {
            return Ok(None);
        };
        let Some(logical) = graph.node_position(node_id).filter(|p| p.is_finite()) else {
            debug!(node_id; "No valid logical position to validate");
            return Ok(None);
        };

        let calculated = self.logical_to_dom(logical)?;
        let actual = self.node_dom_center(node_id);
        Ok(Some(TransformValidation {
            node_id: node_id.to_string(),
            logical_position: logical,
            calculated_dom_position: calculated,
            actual_dom_center: actual,
            difference: actual.map(|center| center.sub_point(calculated)),
        }))
    }

    /// Drops the cached transform and all cached conversions
    pub fn clear_cache(&mut self) {
        self.transform_cache = None;
        self.conversions.clear();
        trace!("Coordinate caches cleared");
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let lookups = self.counters.cache_hits + self.counters.cache_misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.counters.cache_hits as f64 / lookups as f64 * 100.0
        };
        PerformanceStats {
            cache_hits: self.counters.cache_hits,
            cache_misses: self.counters.cache_misses,
            total_calculations: self.counters.total_calculations,
            hit_rate,
            cache_size: self.conversions.len(),
        }
    }

    pub fn reset_performance_stats(&mut self) {
        self.counters = Counters::default();
    }

    pub fn error_stats(&self) -> ErrorStats {
        ErrorStats {
            error_count: self.errors.count,
            last_error_age: self.errors.last_error.map(|at| at.elapsed()),
            error_threshold: self.config.error_threshold(),
            max_retries: self.config.max_retries(),
        }
    }

    pub fn status(&mut self) -> CoordinateStatus {
        let transform = self.canvas_transform();
        CoordinateStatus {
            has_graph: self.graph.is_some(),
            transform,
            cache: CacheStatus {
                conversions: self.conversions.len(),
                has_transform: self.transform_cache.is_some(),
                transform_window: self.config.transform_cache_window(),
            },
            performance: self.performance_stats(),
            errors: self.error_stats(),
        }
    }

    /// Counts an error. Exceeding the threshold resets caches and the error
    /// count and fails.
    fn record_error(&mut self, method: &str, message: &str) -> Result<(), LayoutError> {
        self.errors.count += 1;
        self.errors.last_error = Some(Instant::now());
        debug!(method, message, count = self.errors.count; "Coordinate error recorded");

        if self.errors.count > self.config.error_threshold() {
            let count = self.errors.count;
            warn!(count; "Coordinate error threshold exceeded, resetting state");
            self.reset_error_state();
            return Err(LayoutError::TransformFailed {
                attempts: count,
                reason: format!("error threshold exceeded in {method}: {message}"),
            });
        }
        Ok(())
    }

    fn reset_error_state(&mut self) {
        self.errors = ErrorState::default();
        self.clear_cache();
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
