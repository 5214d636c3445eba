//! Tierflow - hierarchical auto-layout for node-based workflow editors.
//!
//! The engine arranges a directed workflow graph into horizontal tiers:
//! parents sit above their children, siblings are spread symmetrically and the
//! whole drawing is centered on the logical origin. Branches that have no
//! outgoing connection yet are represented by virtual endpoints so the editor
//! can show where the next node would go.
//!
//! # Overview
//!
//! - [`engine`] - [`engine::LayoutEngine`], the entry point for one graph.
//! - [`shared`] - Thread-safe handle that serializes and debounces runs.
//! - [`layout`] - The pure pipeline stages and the report types.
//! - [`coordinate`] - Conversion between logical and rendered coordinates.
//! - [`validate`] - Cycle detection for editor-side validation.
//! - [`collaborator`] - Traits the host editor implements.
//! - [`config`] - Tunables for the engine and the coordinate manager.
//!
//! # Example
//!
//! ```rust
//! use tierflow::{
//!     collaborator::MemoryCanvas,
//!     config::LayoutConfig,
//!     engine::LayoutEngine,
//!     geometry::{Point, Size},
//!     model::{Edge, GraphNode},
//!     node::NodeKind,
//! };
//!
//! let node = |id: &str, kind| GraphNode::new(id, kind, Point::default(), Size::new(120.0, 40.0));
//! let canvas = MemoryCanvas::new(
//!     [node("start", NodeKind::Start), node("end", NodeKind::End)],
//!     vec![Edge::new("e1", "start", "end")],
//! );
//!
//! let mut engine = LayoutEngine::new(LayoutConfig::default(), canvas);
//! let report = engine.execute_layout();
//! assert!(report.success);
//! ```

pub mod cache;
pub mod collaborator;
pub mod config;
pub mod coordinate;
pub mod debounce;
pub mod engine;
pub mod layout;
pub mod lock;
pub mod shared;
pub mod validate;

mod error;

pub use tierflow_core::{geometry, model, node};

pub use error::LayoutError;
