//! What the evaluator needs from a graph and from its nodes.

use std::collections::HashSet;
use std::rc::Rc;

use super::executor::Executor;
use crate::error::EvalError;
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;

/// One node of a traversal with each input slot resolved to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversedNode {
    pub id: NodeId,
    /// `None` for unconnected slots.
    pub inputs: Vec<Option<NodeId>>,
}

/// Edits recorded by a graph since the last time the context looked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphChanges {
    pub dirty: HashSet<NodeId>,
    pub topology_changed: bool,
}

impl GraphChanges {
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty() && !self.topology_changed
    }
}

/// Graph side of the evaluator.
///
/// Both traversals return nodes in dependency order (every node after all of
/// its sources and extra dependencies) and fail with
/// [`EvalError::MalformedGraph`] on cycles or dangling dependencies.
pub trait GraphQuery {
    /// The targets and everything they depend on.
    fn traverse_upstream(&self, targets: &[NodeId]) -> Result<Vec<TraversedNode>, EvalError>;

    /// The sources and everything that depends on them.
    fn traverse_downstream(&self, sources: &[NodeId]) -> Result<Vec<TraversedNode>, EvalError>;

    fn resolve(&self, id: NodeId) -> Option<&dyn EvalNode>;

    fn resolve_mut(&mut self, id: NodeId) -> Option<&mut dyn EvalNode>;

    fn set_read_only(&mut self, read_only: bool);

    fn is_read_only(&self) -> bool;

    /// Drain the edit journal.
    fn take_changes(&mut self) -> GraphChanges {
        GraphChanges::default()
    }
}

/// Node side of the evaluator.
pub trait EvalNode {
    fn id(&self) -> NodeId;

    fn name(&self) -> &str;

    /// Executor handle, built lazily and rebuilt after parameter changes.
    fn executor(&mut self) -> Rc<dyn Executor>;

    fn parameters_changed(&self) -> bool;

    /// Current parameters without clearing the changed flag.
    fn parameter_snapshot(&self) -> ParameterMap;

    /// Current parameters; clears the changed flag.
    fn freeze_parameters(&mut self) -> ParameterMap;

    /// Called once per prepare pass. `true` means the node must recompute.
    fn prepare(&mut self) -> bool;

    /// Nodes this one depends on without a wired input.
    fn extra_dependencies(&self) -> Vec<NodeId>;
}
