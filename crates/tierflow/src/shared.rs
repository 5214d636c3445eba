//! Thread-safe access to one [`LayoutEngine`].
//!
//! Layout runs never overlap. A caller arriving while a run is in flight
//! waits for it and receives its report instead of starting another.
//! Debounced callers additionally coalesce bursts of requests into one
//! trailing run.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use log::{debug, trace};

use crate::{debounce::Debouncer, engine::LayoutEngine, layout::LayoutReport, lock::RefreshLock};

#[derive(Debug)]
struct RunState {
    running: bool,
    /// Number of runs started so far
    started: u64,
    /// Number of the most recently finished run
    completed: u64,
    last_report: Option<LayoutReport>,
    debouncer: Debouncer,
}

#[derive(Debug)]
struct Shared {
    engine: Mutex<LayoutEngine>,
    state: Mutex<RunState>,
    finished: Condvar,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, LayoutEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a run as finished when dropped, even if the run panicked.
struct RunSlot<'a> {
    shared: &'a Shared,
    run: u64,
    report: Option<LayoutReport>,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state();
        state.running = false;
        state.completed = self.run;
        if let Some(report) = self.report.take() {
            state.last_report = Some(report);
        }
        self.shared.finished.notify_all();
    }
}

/// Cloneable handle serializing layout runs of one engine.
#[derive(Debug, Clone)]
pub struct SharedLayoutEngine {
    inner: Arc<Shared>,
}

impl SharedLayoutEngine {
    pub fn new(engine: LayoutEngine) -> Self {
        let config = engine.config();
        let debouncer = Debouncer::new(config.debounce_delay(), config.debounce_max_wait());
        Self {
            inner: Arc::new(Shared {
                engine: Mutex::new(engine),
                state: Mutex::new(RunState {
                    running: false,
                    started: 0,
                    completed: 0,
                    last_report: None,
                    debouncer,
                }),
                finished: Condvar::new(),
            }),
        }
    }

    /// Runs `f` with exclusive access to the engine, e.g. to swap collaborators.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut LayoutEngine) -> R) -> R {
        f(&mut self.inner.engine())
    }

    /// Handle to the engine's refresh lock
    pub fn refresh_lock(&self) -> RefreshLock {
        self.inner.engine().refresh_lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Number of runs that have finished
    pub fn runs_completed(&self) -> u64 {
        self.inner.state().completed
    }

    /// Debounced requests absorbed into another request's run
    pub fn coalesced_requests(&self) -> u64 {
        self.inner.state().debouncer.coalesced()
    }

    /// Runs a layout now, or joins the run already in flight.
    pub fn execute_layout(&self) -> LayoutReport {
        let mut state = self.inner.state();
        if state.running {
            let target = state.started;
            debug!(run = target; "Layout in flight, waiting for its result");
            while state.completed < target {
                state = self
                    .inner
                    .finished
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            return state.last_report.clone().unwrap_or_default();
        }
        self.start_run(state)
    }

    /// Requests a layout and returns the report of the first run started
    /// after the request.
    ///
    /// The run starts once no request arrived for the debounce delay, or once
    /// the maximum wait since the first request of the burst has passed.
    pub fn execute_layout_debounced(&self) -> LayoutReport {
        let mut state = self.inner.state();
        state.debouncer.request(Instant::now());
        let target = state.started + 1;

        loop {
            if state.completed >= target {
                return state.last_report.clone().unwrap_or_default();
            }

            let now = Instant::now();
            if !state.running && state.debouncer.is_due(now) {
                return self.start_run(state);
            }

            state = if state.running {
                self.inner
                    .finished
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner)
            } else {
                let remaining = state
                    .debouncer
                    .remaining(now)
                    .unwrap_or(Duration::ZERO)
                    .max(Duration::from_millis(1));
                trace!(remaining:?; "Waiting for debounce deadline");
                self.inner
                    .finished
                    .wait_timeout(state, remaining)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            };
        }
    }

    fn start_run(&self, mut state: MutexGuard<'_, RunState>) -> LayoutReport {
        state.running = true;
        state.started += 1;
        // Any run started now serves every request made so far
        state.debouncer.take();
        let run = state.started;
        drop(state);

        let mut slot = RunSlot {
            shared: &self.inner,
            run,
            report: None,
        };
        let report = self.inner.engine().execute_layout();
        slot.report = Some(report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use tierflow_core::{
        geometry::{Point, Size, ViewTransform},
        model::{Edge, GraphNode},
        node::NodeKind,
    };

    use super::*;
    use crate::{
        collaborator::{Canvas, MemoryCanvas, ViewSource},
        config::LayoutConfig,
    };

    /// Canvas that takes a while to enumerate its nodes.
    struct SlowCanvas {
        inner: MemoryCanvas,
        delay: Duration,
    }

    impl ViewSource for SlowCanvas {
        fn view_transform(&self) -> ViewTransform {
            self.inner.view_transform()
        }

        fn node_position(&self, id: &str) -> Option<Point> {
            self.inner.node_position(id)
        }
    }

    impl Canvas for SlowCanvas {
        fn nodes(&self) -> Vec<GraphNode> {
            thread::sleep(self.delay);
            self.inner.nodes()
        }

        fn edges(&self) -> Vec<Edge> {
            self.inner.edges()
        }

        fn set_node_position(&mut self, id: &str, position: Point) -> bool {
            self.inner.set_node_position(id, position)
        }
    }

    fn chain() -> MemoryCanvas {
        let node = |id: &str, kind| GraphNode::new(id, kind, Point::default(), Size::new(120.0, 40.0));
        MemoryCanvas::new(
            [
                node("start", NodeKind::Start),
                node("a", NodeKind::Action),
                node("end", NodeKind::End),
            ],
            vec![Edge::new("e1", "start", "a"), Edge::new("e2", "a", "end")],
        )
    }

    #[test]
    fn test_sequential_runs() {
        let shared = SharedLayoutEngine::new(LayoutEngine::new(LayoutConfig::default(), chain()));
        assert!(shared.execute_layout().success);
        assert!(shared.execute_layout().success);
        assert_eq!(shared.runs_completed(), 2);
        assert!(!shared.is_running());
    }

    #[test]
    fn test_concurrent_call_joins_in_flight_run() {
        let canvas = SlowCanvas {
            inner: chain(),
            delay: Duration::from_millis(200),
        };
        let shared = SharedLayoutEngine::new(LayoutEngine::new(LayoutConfig::default(), canvas));

        let first = {
            let shared = shared.clone();
            thread::spawn(move || shared.execute_layout())
        };
        thread::sleep(Duration::from_millis(50));
        let second = shared.execute_layout();
        let first = first.join().unwrap();

        assert!(first.success);
        assert_eq!(first, second);
        assert_eq!(shared.runs_completed(), 1);
        assert_eq!(shared.with_engine(|engine| engine.metrics().layout_count), 1);
    }

    #[test]
    fn test_debounced_burst_coalesces() {
        let mut config = LayoutConfig::default();
        config.set_debounce(Duration::from_millis(50), Duration::from_millis(500));
        let shared = SharedLayoutEngine::new(LayoutEngine::new(config, chain()));

        let callers = 5;
        let barrier = Arc::new(Barrier::new(callers));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let shared = shared.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    shared.execute_layout_debounced()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().success);
        }
        let runs = shared.with_engine(|engine| engine.metrics().layout_count);
        assert!(runs >= 1);
        assert!(runs < callers as u64);
        assert!(shared.coalesced_requests() >= 1);
    }

    #[test]
    fn test_debounced_single_request_waits_for_delay() {
        let mut config = LayoutConfig::default();
        config.set_debounce(Duration::from_millis(30), Duration::from_millis(300));
        let shared = SharedLayoutEngine::new(LayoutEngine::new(config, chain()));

        let started = Instant::now();
        let report = shared.execute_layout_debounced();
        assert!(report.success);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
