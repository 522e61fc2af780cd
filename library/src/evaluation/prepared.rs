//! Ready-to-execute snapshot of one upstream traversal.

use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::executor::Executor;
use super::query::GraphQuery;
use crate::error::EvalError;
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;
use crate::util::timing::ScopedTimer;

/// A node's executor and frozen parameters, plus where its inputs come from.
/// Evaluation only ever looks at these, never at the live node.
#[derive(Clone)]
pub struct PreparedNode {
    pub id: NodeId,
    pub name: String,
    pub executor: Rc<dyn Executor>,
    pub parameters: Rc<ParameterMap>,
    /// Position of each input's source inside the same snapshot.
    pub inputs: Vec<Option<usize>>,
}

impl fmt::Debug for PreparedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PreparedGraph {
    nodes: Vec<PreparedNode>,
    lut: HashMap<NodeId, usize>,
}

impl PreparedGraph {
    /// Traverse upstream of `destinies` and resolve every link to a position.
    ///
    /// Destinies that no longer exist are skipped. A traversal failure or a
    /// link whose source is not part of the traversal fails the whole build.
    pub fn build(graph: &mut dyn GraphQuery, destinies: &[NodeId]) -> Result<Self, EvalError> {
        let _timer = ScopedTimer::debug("prepared graph rebuild");

        let mut targets = Vec::with_capacity(destinies.len());
        for destiny in destinies {
            if graph.resolve(*destiny).is_some() {
                targets.push(*destiny);
            } else {
                warn!("Destiny {} no longer exists, skipping it", destiny);
            }
        }

        let traversal = graph.traverse_upstream(&targets)?;
        let lut: HashMap<NodeId, usize> = traversal
            .iter()
            .enumerate()
            .map(|(position, traversed)| (traversed.id, position))
            .collect();

        let mut nodes = Vec::with_capacity(traversal.len());
        for traversed in &traversal {
            let mut inputs = Vec::with_capacity(traversed.inputs.len());
            for source in &traversed.inputs {
                match source {
                    Some(source) => {
                        let position = lut.get(source).copied().ok_or_else(|| {
                            EvalError::malformed(format!(
                                "input of {} comes from {} which is not part of the traversal",
                                traversed.id, source
                            ))
                        })?;
                        inputs.push(Some(position));
                    }
                    None => inputs.push(None),
                }
            }

            let node = graph.resolve_mut(traversed.id).ok_or_else(|| {
                EvalError::malformed(format!("traversal returned unknown node {}", traversed.id))
            })?;
            nodes.push(PreparedNode {
                id: traversed.id,
                name: node.name().to_string(),
                executor: node.executor(),
                parameters: Rc::new(node.parameter_snapshot()),
                inputs,
            });
        }

        debug!(
            "Prepared {} nodes for {} destinies",
            nodes.len(),
            targets.len()
        );
        Ok(Self { nodes, lut })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.lut.contains_key(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.lut.get(&id).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&PreparedNode> {
        self.position(id).map(|position| &self.nodes[position])
    }

    pub fn node_at(&self, position: usize) -> Option<&PreparedNode> {
        self.nodes.get(position)
    }

    pub(crate) fn node_at_mut(&mut self, position: usize) -> Option<&mut PreparedNode> {
        self.nodes.get_mut(position)
    }

    /// Nodes in dependency order.
    pub fn nodes(&self) -> &[PreparedNode] {
        &self.nodes
    }

    /// Source of `slot` on `id`. `None` for unconnected or unknown slots.
    pub fn input_source(&self, id: NodeId, slot: usize) -> Option<&PreparedNode> {
        let node = self.node(id)?;
        let position = (*node.inputs.get(slot)?)?;
        self.nodes.get(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::Graph;
    use crate::model::node::GraphNode;
    use crate::model::parameter::ParameterMap;
    use crate::model::value::Value;
    use crate::plugin::behavior::immediate;

    fn passthrough(graph: &mut Graph, name: &str, inputs: usize) -> NodeId {
        let behavior = immediate(|inputs: &[Value], _: &ParameterMap| {
            Ok(inputs.first().cloned().unwrap_or_default())
        });
        graph
            .add_node(GraphNode::new(name, "test.pass", inputs, ParameterMap::new(), behavior))
            .unwrap()
    }

    #[test]
    fn test_inputs_resolve_to_positions() {
        let mut graph = Graph::new("test");
        let a = passthrough(&mut graph, "a", 0);
        let b = passthrough(&mut graph, "b", 2);
        graph.connect(a, b, 0).unwrap();

        let prepared = PreparedGraph::build(&mut graph, &[b]).unwrap();
        assert_eq!(prepared.len(), 2);
        let a_pos = prepared.position(a).unwrap();
        let b_node = prepared.node(b).unwrap();
        assert_eq!(b_node.inputs, vec![Some(a_pos), None]);
        assert_eq!(prepared.input_source(b, 0).map(|n| n.id), Some(a));
        assert!(prepared.input_source(b, 1).is_none());
    }

    #[test]
    fn test_missing_destiny_is_skipped() {
        let mut graph = Graph::new("test");
        let a = passthrough(&mut graph, "a", 0);

        let prepared = PreparedGraph::build(&mut graph, &[a, NodeId::new()]).unwrap();
        assert_eq!(prepared.len(), 1);
        assert!(prepared.contains(a));
    }
}
