//! Contracts with the host editor.
//!
//! The engine never owns the rendered graph. It reads a snapshot through
//! [`Canvas`], writes final node positions back through it, and reports the
//! resting place of every open branch to a [`BranchPreview`]. The
//! [`ViewSource`] subset is all the coordinate system manager needs.
//!
//! [`MemoryCanvas`] and [`PreviewRegistry`] are plain in-memory
//! implementations used by the CLI and by tests.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use log::{debug, warn};

use tierflow_core::{
    geometry::{Bounds, Point, ViewTransform},
    model::{Edge, GraphNode, OpenBranch},
    node::NodeLike,
};

use crate::{error::LayoutError, lock::RefreshLock};

/// Read access to the view state of the rendering surface.
pub trait ViewSource {
    /// Current pan/zoom of the surface
    fn view_transform(&self) -> ViewTransform;

    /// Logical top-left position of a node
    fn node_position(&self, id: &str) -> Option<Point>;

    /// Where the node is actually drawn, in screen coordinates relative to the surface
    fn rendered_bounds(&self, _id: &str) -> Option<Bounds> {
        None
    }
}

/// The graph collaborator.
pub trait Canvas: ViewSource {
    /// Snapshot of every node, including transient artifacts
    fn nodes(&self) -> Vec<GraphNode>;

    /// Snapshot of every edge, including preview lines
    fn edges(&self) -> Vec<Edge>;

    /// Resolves a node by id
    fn node(&self, id: &str) -> Option<GraphNode> {
        self.nodes().into_iter().find(|node| node.id() == id)
    }

    /// Moves a node's top-left corner. Returns false if the node does not exist.
    fn set_node_position(&mut self, id: &str, position: Point) -> bool;
}

/// The branch/preview collaborator.
pub trait BranchPreview {
    /// Every branch declared on `node`, in declaration order
    fn open_branches(&self, node: &GraphNode) -> Vec<OpenBranch>;

    /// Receives the laid-out position of a branch's dangling end
    fn update_anchor(&mut self, source_id: &str, branch_id: &str, position: Point);

    /// Hands over the engine's refresh lock for lock-aware operations
    fn attach_refresh_lock(&mut self, _lock: RefreshLock) {}
}

impl<T: BranchPreview + ?Sized> BranchPreview for Arc<Mutex<T>> {
    fn open_branches(&self, node: &GraphNode) -> Vec<OpenBranch> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .open_branches(node)
    }

    fn update_anchor(&mut self, source_id: &str, branch_id: &str, position: Point) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_anchor(source_id, branch_id, position);
    }

    fn attach_refresh_lock(&mut self, lock: RefreshLock) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .attach_refresh_lock(lock);
    }
}

// ============================================================================
// In-memory canvas
// ============================================================================

/// Graph collaborator backed by plain vectors.
#[derive(Debug, Clone, Default)]
pub struct MemoryCanvas {
    nodes: IndexMap<String, GraphNode>,
    edges: Vec<Edge>,
    transform: ViewTransform,
    rendered: IndexMap<String, Bounds>,
}

impl MemoryCanvas {
    /// Creates a canvas from node and edge lists. Later duplicates of a node id replace earlier ones.
    pub fn new(nodes: impl IntoIterator<Item = GraphNode>, edges: Vec<Edge>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|node| (node.id().to_string(), node))
                .collect(),
            edges,
            transform: ViewTransform::identity(),
            rendered: IndexMap::new(),
        }
    }

    /// Adds or replaces a node
    pub fn add_node(&mut self, node: GraphNode) -> &mut Self {
        self.nodes.insert(node.id().to_string(), node);
        self
    }

    /// Adds an edge
    pub fn add_edge(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Sets the view transform reported to consumers
    pub fn set_view_transform(&mut self, transform: ViewTransform) -> &mut Self {
        self.transform = transform;
        self
    }

    /// Records where a node is drawn on screen
    pub fn set_rendered_bounds(&mut self, id: impl Into<String>, bounds: Bounds) -> &mut Self {
        self.rendered.insert(id.into(), bounds);
        self
    }

    /// Records screen bounds for every node exactly where the view transform puts them
    pub fn render_all(&mut self) -> &mut Self {
        let transform = self.transform;
        self.rendered = self
            .nodes
            .values()
            .map(|node| {
                let size = node.size();
                let top_left = transform.apply(node.position());
                let bottom_right = transform.apply(
                    node.position()
                        .add_point(Point::new(size.width(), size.height())),
                );
                let bounds = Bounds::from_points([top_left, bottom_right]).unwrap_or_default();
                (node.id().to_string(), bounds)
            })
            .collect();
        self
    }
}

impl ViewSource for MemoryCanvas {
    fn view_transform(&self) -> ViewTransform {
        self.transform
    }

    fn node_position(&self, id: &str) -> Option<Point> {
        self.nodes.get(id).map(|node| node.position())
    }

    fn rendered_bounds(&self, id: &str) -> Option<Bounds> {
        self.rendered.get(id).copied()
    }
}

impl Canvas for MemoryCanvas {
    fn nodes(&self) -> Vec<GraphNode> {
        self.nodes.values().cloned().collect()
    }

    fn edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    fn node(&self, id: &str) -> Option<GraphNode> {
        self.nodes.get(id).cloned()
    }

    fn set_node_position(&mut self, id: &str, position: Point) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.set_position(position);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// In-memory branch registry
// ============================================================================

/// Branch/preview collaborator that keeps declared branches in a map.
///
/// Anchor updates coming from the engine are always accepted. Updates
/// requested by anything else go through [`PreviewRegistry::request_anchor_move`]
/// and are refused while a layout holds the refresh lock.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    branches: IndexMap<String, Vec<OpenBranch>>,
    refresh_lock: Option<RefreshLock>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a branch on `source_id`, replacing any branch with the same id
    pub fn declare(&mut self, source_id: impl Into<String>, branch: OpenBranch) -> &mut Self {
        let branches = self.branches.entry(source_id.into()).or_default();
        match branches.iter_mut().find(|b| b.id() == branch.id()) {
            Some(existing) => *existing = branch,
            None => branches.push(branch),
        }
        self
    }

    /// Declares every branch of a node at once
    pub fn declare_all(
        &mut self,
        source_id: impl Into<String>,
        branches: impl IntoIterator<Item = OpenBranch>,
    ) -> &mut Self {
        let source_id = source_id.into();
        for branch in branches {
            self.declare(source_id.clone(), branch);
        }
        self
    }

    /// Last known anchor of a branch
    pub fn anchor(&self, source_id: &str, branch_id: &str) -> Option<Point> {
        self.branches
            .get(source_id)?
            .iter()
            .find(|b| b.id() == branch_id)?
            .anchor()
    }

    /// Externally triggered anchor move, e.g. a user dragging a branch end.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RefreshLocked`] while a layout is running and
    /// [`LayoutError::CollaboratorUnavailable`] for an unknown branch.
    pub fn request_anchor_move(
        &mut self,
        source_id: &str,
        branch_id: &str,
        position: Point,
    ) -> Result<(), LayoutError> {
        if let Some(lock) = &self.refresh_lock {
            lock.check_mutation()?;
        }

        let branch = self
            .branches
            .get_mut(source_id)
            .and_then(|branches| branches.iter_mut().find(|b| b.id() == branch_id))
            .ok_or_else(|| {
                LayoutError::CollaboratorUnavailable(format!(
                    "no branch `{branch_id}` on node `{source_id}`"
                ))
            })?;
        branch.set_anchor(position);
        Ok(())
    }
}

impl BranchPreview for PreviewRegistry {
    fn open_branches(&self, node: &GraphNode) -> Vec<OpenBranch> {
        self.branches.get(node.id()).cloned().unwrap_or_default()
    }

    fn update_anchor(&mut self, source_id: &str, branch_id: &str, position: Point) {
        let Some(branch) = self
            .branches
            .get_mut(source_id)
            .and_then(|branches| branches.iter_mut().find(|b| b.id() == branch_id))
        else {
            // Degraded-mode endpoints have no declared branch.
            debug!(source_id, branch_id; "Anchor update for undeclared branch");
            return;
        };
        branch.set_anchor(position);
    }

    fn attach_refresh_lock(&mut self, lock: RefreshLock) {
        if self.refresh_lock.is_some() {
            warn!("Replacing previously attached refresh lock");
        }
        self.refresh_lock = Some(lock);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tierflow_core::{geometry::Size, node::NodeKind};

    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode::new(id, NodeKind::Action, Point::new(0.0, 0.0), Size::new(100.0, 40.0))
    }

    #[test]
    fn test_memory_canvas_set_position() {
        let mut canvas = MemoryCanvas::new([node("a"), node("b")], vec![Edge::new("e", "a", "b")]);

        assert!(canvas.set_node_position("a", Point::new(10.0, 20.0)));
        assert!(!canvas.set_node_position("missing", Point::new(0.0, 0.0)));
        assert_eq!(canvas.node_position("a"), Some(Point::new(10.0, 20.0)));
        assert_eq!(canvas.nodes().len(), 2);
        assert_eq!(canvas.edges().len(), 1);
    }

    #[test]
    fn test_render_all_follows_transform() {
        let mut canvas = MemoryCanvas::new([node("a")], Vec::new());
        canvas
            .set_view_transform(ViewTransform::new(Point::new(10.0, 5.0), 2.0, 2.0))
            .render_all();

        let bounds = canvas.rendered_bounds("a").unwrap();
        assert_eq!(bounds.min_point(), Point::new(10.0, 5.0));
        assert_eq!(bounds.to_size(), Size::new(200.0, 80.0));
    }

    #[test]
    fn test_registry_declare_replaces() {
        let mut registry = PreviewRegistry::new();
        registry
            .declare("s", OpenBranch::new("b1"))
            .declare("s", OpenBranch::new("b1").with_label("Yes"));

        let branches = registry.open_branches(&node("s"));
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].label(), Some("Yes"));
        assert!(registry.open_branches(&node("other")).is_empty());
    }

    #[test]
    fn test_engine_anchor_update_ignores_lock() {
        let lock = RefreshLock::new(Duration::from_secs(5));
        let mut registry = PreviewRegistry::new();
        registry.declare("s", OpenBranch::new("b1"));
        registry.attach_refresh_lock(lock.clone());

        assert!(lock.lock("layout"));
        registry.update_anchor("s", "b1", Point::new(1.0, 2.0));
        assert_eq!(registry.anchor("s", "b1"), Some(Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_external_move_rejected_while_locked() {
        let lock = RefreshLock::new(Duration::from_secs(5));
        let mut registry = PreviewRegistry::new();
        registry.declare("s", OpenBranch::new("b1"));
        registry.attach_refresh_lock(lock.clone());

        assert!(lock.lock("layout"));
        let err = registry
            .request_anchor_move("s", "b1", Point::new(5.0, 5.0))
            .unwrap_err();
        assert!(matches!(err, LayoutError::RefreshLocked { .. }));
        assert_eq!(registry.anchor("s", "b1"), None);

        assert!(lock.unlock("done"));
        registry
            .request_anchor_move("s", "b1", Point::new(5.0, 5.0))
            .unwrap();
        assert_eq!(registry.anchor("s", "b1"), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_shared_registry_forwards() {
        let registry = Arc::new(Mutex::new(PreviewRegistry::new()));
        registry.lock().unwrap().declare("s", OpenBranch::new("b1"));

        let mut handle: Box<dyn BranchPreview> = Box::new(Arc::clone(&registry));
        handle.update_anchor("s", "b1", Point::new(3.0, 4.0));

        assert_eq!(
            registry.lock().unwrap().anchor("s", "b1"),
            Some(Point::new(3.0, 4.0))
        );
    }
}
