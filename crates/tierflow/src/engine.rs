//! The layout engine.
//!
//! [`LayoutEngine`] owns the collaborators of one editor session and drives a
//! layout run through its phases:
//!
//! ```text
//! Idle -> Computing -> Locked -> Applying -> Idle
//! ```
//!
//! While `Locked` and `Applying`, the preview refresh lock is held so nothing
//! else can move branch endpoints. The lock is released by a guard on every
//! exit path and expires on its own after the configured timeout.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::{
    LayoutError,
    cache::{GraphFingerprint, LayoutCache},
    collaborator::{BranchPreview, Canvas},
    config::LayoutConfig,
    layout::{
        ApplyStats, EndpointExtractor, LayoutReport, LayoutResult, apply_positions, compute_layout,
        preprocess,
    },
    lock::RefreshLock,
};

/// Reason recorded on the refresh lock while a layout runs.
const LOCK_REASON: &str = "layout in progress";

/// Where the engine is within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnginePhase {
    #[default]
    Idle,
    Computing,
    Locked,
    Applying,
}

/// Counters over the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutMetrics {
    /// Runs that produced a layout, cached or computed
    pub layout_count: u64,
    pub total_duration: Duration,
    pub last_duration: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl LayoutMetrics {
    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.layout_count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_duration / count,
            Err(_) => Duration::ZERO,
        }
    }

    /// Fraction of cache lookups that hit, in `[0, 1]`
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// Hierarchical layout engine bound to one canvas.
pub struct LayoutEngine {
    config: LayoutConfig,
    canvas: Option<Box<dyn Canvas + Send>>,
    preview: Option<Box<dyn BranchPreview + Send>>,
    extractor: EndpointExtractor,
    refresh_lock: RefreshLock,
    phase: EnginePhase,
    cache: LayoutCache,
    metrics: LayoutMetrics,
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("config", &self.config)
            .field("has_canvas", &self.canvas.is_some())
            .field("has_preview", &self.preview.is_some())
            .field("phase", &self.phase)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl LayoutEngine {
    /// Creates an engine without a branch/preview collaborator.
    ///
    /// Until [`LayoutEngine::update_preview`] is called, every run uses the
    /// generic single-endpoint-per-leaf mode.
    pub fn new(config: LayoutConfig, canvas: impl Canvas + Send + 'static) -> Self {
        debug!(
            parallel = config.enable_parallel_processing(),
            cache = config.enable_cache();
            "Creating layout engine"
        );
        Self {
            extractor: EndpointExtractor::new(&config),
            refresh_lock: RefreshLock::new(config.lock_timeout()),
            cache: LayoutCache::new(config.cache_capacity()),
            canvas: Some(Box::new(canvas)),
            preview: None,
            phase: EnginePhase::Idle,
            metrics: LayoutMetrics::default(),
            config,
        }
    }

    /// Builder form of [`LayoutEngine::update_preview`]
    pub fn with_preview(mut self, preview: impl BranchPreview + Send + 'static) -> Self {
        self.update_preview(preview);
        self
    }

    /// Replaces the graph collaborator and drops every cached layout.
    pub fn update_graph(&mut self, canvas: impl Canvas + Send + 'static) {
        self.canvas = Some(Box::new(canvas));
        self.cache.clear();
        debug!("Graph collaborator replaced");
    }

    /// Replaces the branch/preview collaborator and hands it the refresh lock.
    pub fn update_preview(&mut self, mut preview: impl BranchPreview + Send + 'static) {
        preview.attach_refresh_lock(self.refresh_lock.clone());
        self.preview = Some(Box::new(preview));
        debug!("Branch/preview collaborator replaced");
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Handle to the preview refresh lock shared with collaborators
    pub fn refresh_lock(&self) -> &RefreshLock {
        &self.refresh_lock
    }

    pub fn metrics(&self) -> LayoutMetrics {
        LayoutMetrics {
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            ..self.metrics
        }
    }

    /// The current graph collaborator
    pub fn canvas(&self) -> Option<&dyn Canvas> {
        self.canvas.as_deref().map(|canvas| canvas as &dyn Canvas)
    }

    /// Releases the refresh lock, clears caches and drops both collaborators.
    pub fn dispose(&mut self) {
        if self.refresh_lock.is_locked() {
            self.refresh_lock.unlock("engine disposed");
        }
        self.cache.clear();
        self.canvas = None;
        self.preview = None;
        self.phase = EnginePhase::Idle;
        info!("Layout engine disposed");
    }

    /// Runs a complete layout and writes the result back.
    ///
    /// Never fails: empty input yields a skipped report and every error is
    /// turned into a failed one.
    pub fn execute_layout(&mut self) -> LayoutReport {
        info!("Starting layout");
        let started = Instant::now();

        let report = match self.run(started) {
            Ok(report) => report,
            Err(LayoutError::EmptyInput(reason)) => {
                info!(reason; "Layout skipped");
                LayoutReport::skipped(reason)
            }
            Err(err) => {
                error!(kind = err.kind(), reason = err.to_string(); "Layout failed");
                LayoutReport::failed(&err)
            }
        };
        self.phase = EnginePhase::Idle;

        info!(
            success = report.success,
            skipped = report.skipped,
            from_cache = report.from_cache,
            elapsed:? = started.elapsed();
            "Layout finished"
        );
        report
    }

    fn run(&mut self, started: Instant) -> Result<LayoutReport, LayoutError> {
        let canvas = self
            .canvas
            .as_deref()
            .ok_or_else(|| LayoutError::CollaboratorUnavailable("graph canvas".to_string()))?;

        self.phase = EnginePhase::Computing;
        let input = preprocess(canvas.nodes(), canvas.edges());
        if input.is_empty() {
            return Err(LayoutError::EmptyInput("graph has no layoutable nodes".to_string()));
        }

        let preview = self
            .preview
            .as_deref()
            .map(|preview| preview as &dyn BranchPreview);
        let endpoints = self.extractor.extract(&input.nodes, &input.edges, preview);
        if input.nodes.len() == 1 && endpoints.is_empty() {
            return Err(LayoutError::EmptyInput(
                "single node without open branches".to_string(),
            ));
        }

        let fingerprint = GraphFingerprint::compute(&input.nodes, &input.edges, &endpoints);
        if self.config.enable_cache() {
            if let Some(cached) = self.cache.get(fingerprint).cloned() {
                debug!("Reusing cached layout");
                let _guard = self.refresh_lock.guard(LOCK_REASON);
                self.phase = EnginePhase::Applying;
                self.apply(&cached);
                self.record(started);
                return Ok(LayoutReport::completed(cached, true));
            }
        }

        let guard = self.refresh_lock.guard(LOCK_REASON);
        if !guard.is_owned() {
            warn!("Refresh lock already held elsewhere, continuing");
        }
        self.phase = EnginePhase::Locked;

        let mut result = compute_layout(&input.nodes, &input.edges, &endpoints, &self.config);
        result.statistics.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.phase = EnginePhase::Applying;
        let stats = self.apply(&result);
        drop(guard);

        if stats.skipped > 0 {
            warn!(skipped = stats.skipped; "Some positions were not applied");
        }
        if self.config.enable_cache() {
            self.cache.insert(fingerprint, result.clone());
        }
        self.record(started);

        Ok(LayoutReport::completed(result, false))
    }

    fn apply(&mut self, result: &LayoutResult) -> ApplyStats {
        let Some(canvas) = self.canvas.as_deref_mut() else {
            return ApplyStats::default();
        };
        let preview: Option<&mut (dyn BranchPreview + Send)> = match self.preview.as_mut() {
            Some(preview) => Some(preview.as_mut()),
            None => None,
        };
        apply_positions(result, canvas, preview)
    }

    fn record(&mut self, started: Instant) {
        let elapsed = started.elapsed();
        self.metrics.layout_count += 1;
        self.metrics.total_duration += elapsed;
        self.metrics.last_duration = elapsed;
    }
}
