//! Generic graph node for the data-flow graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use super::parameter::ParameterMap;
use super::value::Value;
use crate::evaluation::executor::Executor;
use crate::evaluation::query::EvalNode;
use crate::plugin::behavior::NodeBehavior;

/// Stable handle of a node inside its graph; the key of every evaluation cache.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node instance. All node kinds share this structure; what a node does
/// comes from its `behavior`, usually supplied by a
/// [`NodeTypeDefinition`](crate::plugin::node_types::NodeTypeDefinition).
pub struct GraphNode {
    pub id: NodeId,
    pub name: String,
    /// Examples: "math.add", "logic.switch", "function.invoke"
    pub type_id: String,
    input_count: usize,
    parameters: ParameterMap,
    parameters_dirty: bool,
    extra_dependencies: Vec<NodeId>,
    behavior: Rc<dyn NodeBehavior>,
    executor: Option<Rc<dyn Executor>>,
}

impl GraphNode {
    pub fn new(
        name: &str,
        type_id: &str,
        input_count: usize,
        parameters: ParameterMap,
        behavior: Rc<dyn NodeBehavior>,
    ) -> Self {
        Self::new_with_id(NodeId::new(), name, type_id, input_count, parameters, behavior)
    }

    pub fn new_with_id(
        id: NodeId,
        name: &str,
        type_id: &str,
        input_count: usize,
        parameters: ParameterMap,
        behavior: Rc<dyn NodeBehavior>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            type_id: type_id.to_string(),
            input_count,
            parameters,
            parameters_dirty: true,
            extra_dependencies: Vec::new(),
            behavior,
            executor: None,
        }
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    /// Change one parameter. Marks the parameters changed and drops the
    /// cached executor so the next prepare rebuilds it.
    pub fn set_parameter(&mut self, key: &str, value: Value) {
        self.parameters.set(key.to_string(), value);
        self.parameters_dirty = true;
        self.executor = None;
    }

    pub(crate) fn set_extra_dependencies(&mut self, dependencies: Vec<NodeId>) {
        self.extra_dependencies = dependencies;
    }
}

impl EvalNode for GraphNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn executor(&mut self) -> Rc<dyn Executor> {
        if let Some(executor) = &self.executor {
            return executor.clone();
        }
        let executor = self.behavior.build_executor(self.id, &self.parameters);
        self.executor = Some(executor.clone());
        executor
    }

    fn parameters_changed(&self) -> bool {
        self.parameters_dirty
    }

    fn parameter_snapshot(&self) -> ParameterMap {
        self.parameters.clone()
    }

    fn freeze_parameters(&mut self) -> ParameterMap {
        self.parameters_dirty = false;
        self.parameters.clone()
    }

    fn prepare(&mut self) -> bool {
        self.behavior.prepare(self.id, &self.parameters)
    }

    fn extra_dependencies(&self) -> Vec<NodeId> {
        let mut dependencies = self.extra_dependencies.clone();
        for dependency in self.behavior.extra_dependencies(self.id, &self.parameters) {
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }
        dependencies
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("input_count", &self.input_count)
            .field("parameters", &self.parameters)
            .field("extra_dependencies", &self.extra_dependencies)
            .finish_non_exhaustive()
    }
}
