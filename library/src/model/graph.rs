//! In-memory node graph with an edit journal.

use log::debug;
use std::collections::HashMap;

use super::connection::{Connection, InputSlot};
use super::graph_analysis;
use super::node::{GraphNode, NodeId};
use super::parameter::ParameterMap;
use super::value::Value;
use crate::error::EvalError;
use crate::evaluation::query::{EvalNode, GraphChanges, GraphQuery, TraversedNode};
use crate::plugin::node_definitions::graph::{output_behavior, portal_behavior, proxy_behavior};

/// Nodes making up one subgraph.
///
/// The container evaluates to the output node's result; each input proxy
/// evaluates to whatever flows into the matching container slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphPorts {
    pub container: NodeId,
    pub inputs: Vec<NodeId>,
    pub output: NodeId,
}

/// A flat graph of nodes where every input slot takes at most one link.
///
/// Edits are refused while the graph is read-only (during evaluation) and are
/// journaled so the next prepare knows what went stale.
#[derive(Debug)]
pub struct Graph {
    name: String,
    nodes: HashMap<NodeId, GraphNode>,
    order: Vec<NodeId>,
    connections: Vec<Connection>,
    subgraphs: Vec<SubgraphPorts>,
    read_only: bool,
    changes: GraphChanges,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: HashMap::new(),
            order: Vec::new(),
            connections: Vec::new(),
            subgraphs: Vec::new(),
            read_only: false,
            changes: GraphChanges::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Node name for messages; empty for unknown ids.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.nodes.get(&id).map(|n| n.name.as_str()).unwrap_or("")
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.node_name(*id) == name)
    }

    /// Node ids in insertion order.
    pub fn node_order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn subgraphs(&self) -> &[SubgraphPorts] {
        &self.subgraphs
    }

    pub fn subgraph(&self, container: NodeId) -> Option<&SubgraphPorts> {
        self.subgraphs.iter().find(|s| s.container == container)
    }

    pub fn source_of(&self, slot: InputSlot) -> Option<NodeId> {
        self.connections
            .iter()
            .find(|c| c.to == slot)
            .map(|c| c.from)
    }

    /// The input proxy reading `slot`, if `slot` belongs to a subgraph container.
    pub fn subgraph_proxy(&self, slot: InputSlot) -> Option<NodeId> {
        self.subgraph(slot.node)
            .and_then(|ports| ports.inputs.get(slot.slot).copied())
    }

    /// Wired sources (by slot) followed by extra dependencies.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut dependencies: Vec<NodeId> = (0..node.input_count())
            .filter_map(|slot| self.source_of(InputSlot::new(id, slot)))
            .collect();
        dependencies.extend(node.extra_dependencies());
        dependencies
    }

    // --- Edits ---

    pub fn add_node(&mut self, node: GraphNode) -> Result<NodeId, EvalError> {
        self.ensure_writable()?;
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(EvalError::invalid(format!("node {} already exists", id)));
        }
        debug!("Adding node {} ({}) to {}", node.name, node.type_id, self.name);
        self.nodes.insert(id, node);
        self.order.push(id);
        self.changes.dirty.insert(id);
        Ok(id)
    }

    /// Remove a node and every link touching it. Removing a subgraph
    /// container removes its proxies and output node as well.
    pub fn remove_node(&mut self, id: NodeId) -> Result<GraphNode, EvalError> {
        self.ensure_writable()?;
        if !self.nodes.contains_key(&id) {
            return Err(EvalError::NodeNotFound(id));
        }
        if self
            .subgraphs
            .iter()
            .any(|s| s.output == id || s.inputs.contains(&id))
        {
            return Err(EvalError::invalid(
                "subgraph ports are removed together with their container",
            ));
        }

        if let Some(position) = self.subgraphs.iter().position(|s| s.container == id) {
            let ports = self.subgraphs.remove(position);
            for port in ports.inputs.iter().chain(std::iter::once(&ports.output)) {
                self.detach(*port);
            }
        }
        self.detach(id)
            .ok_or(EvalError::NodeNotFound(id))
    }

    /// Link `from` into `slot` of `to`, replacing any existing link there.
    pub fn connect(&mut self, from: NodeId, to: NodeId, slot: usize) -> Result<(), EvalError> {
        self.ensure_writable()?;
        let target = InputSlot::new(to, slot);
        graph_analysis::validate_connection(self, from, target).map_err(EvalError::invalid)?;

        self.connections.retain(|c| c.to != target);
        self.connections.push(Connection::new(from, target));
        self.link_changed(target);
        Ok(())
    }

    /// Remove the link into `slot` of `to`. Returns whether one existed.
    pub fn disconnect(&mut self, to: NodeId, slot: usize) -> Result<bool, EvalError> {
        self.ensure_writable()?;
        let target = InputSlot::new(to, slot);
        let before = self.connections.len();
        self.connections.retain(|c| c.to != target);
        if self.connections.len() == before {
            return Ok(false);
        }
        self.link_changed(target);
        Ok(true)
    }

    pub fn set_parameter(&mut self, id: NodeId, key: &str, value: Value) -> Result<(), EvalError> {
        self.ensure_writable()?;
        let node = self.nodes.get_mut(&id).ok_or(EvalError::NodeNotFound(id))?;
        node.set_parameter(key, value);
        self.changes.dirty.insert(id);
        Ok(())
    }

    pub fn set_parameters(&mut self, id: NodeId, parameters: &ParameterMap) -> Result<(), EvalError> {
        for (key, value) in parameters.iter() {
            self.set_parameter(id, key, value.clone())?;
        }
        Ok(())
    }

    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<(), EvalError> {
        self.ensure_writable()?;
        let node = self.nodes.get_mut(&id).ok_or(EvalError::NodeNotFound(id))?;
        node.name = name.to_string();
        // Names are copied into the prepared snapshot.
        self.changes.topology_changed = true;
        Ok(())
    }

    /// Create a subgraph with `input_count` inputs.
    pub fn add_subgraph(&mut self, name: &str, input_count: usize) -> Result<SubgraphPorts, EvalError> {
        self.ensure_writable()?;
        let output = GraphNode::new(
            &format!("{}/output", name),
            "graph.output",
            1,
            ParameterMap::new(),
            output_behavior(),
        );
        let output_id = output.id;

        let container_id = NodeId::new();
        let mut container = GraphNode::new_with_id(
            container_id,
            name,
            "graph.subgraph",
            input_count,
            ParameterMap::new(),
            portal_behavior(output_id),
        );
        container.set_extra_dependencies(vec![output_id]);

        let inputs: Vec<GraphNode> = (0..input_count)
            .map(|slot| {
                GraphNode::new(
                    &format!("{}/input{}", name, slot),
                    "graph.input",
                    0,
                    ParameterMap::new(),
                    proxy_behavior(container_id, slot),
                )
            })
            .collect();
        let input_ids: Vec<NodeId> = inputs.iter().map(|n| n.id).collect();

        for node in inputs {
            self.add_node(node)?;
        }
        self.add_node(output)?;
        self.add_node(container)?;

        let ports = SubgraphPorts {
            container: container_id,
            inputs: input_ids,
            output: output_id,
        };
        self.subgraphs.push(ports.clone());
        self.changes.topology_changed = true;
        Ok(ports)
    }

    // --- Internals ---

    fn ensure_writable(&self) -> Result<(), EvalError> {
        if self.read_only {
            Err(EvalError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Journal a relinked slot and keep a subgraph proxy's dependency in sync.
    fn link_changed(&mut self, target: InputSlot) {
        self.changes.topology_changed = true;
        self.changes.dirty.insert(target.node);
        if let Some(proxy) = self.subgraph_proxy(target) {
            let source = self.source_of(target);
            if let Some(node) = self.nodes.get_mut(&proxy) {
                node.set_extra_dependencies(source.into_iter().collect());
            }
            self.changes.dirty.insert(proxy);
        }
    }

    /// Remove one node and its links without any subgraph bookkeeping.
    fn detach(&mut self, id: NodeId) -> Option<GraphNode> {
        let node = self.nodes.remove(&id)?;
        self.order.retain(|n| *n != id);

        let outgoing: Vec<InputSlot> = self
            .connections
            .iter()
            .filter(|c| c.from == id)
            .map(|c| c.to)
            .collect();
        self.connections.retain(|c| c.from != id && c.to.node != id);
        for target in outgoing {
            if self.nodes.contains_key(&target.node) {
                self.link_changed(target);
            }
        }

        self.changes.dirty.remove(&id);
        self.changes.topology_changed = true;
        debug!("Removed node {} from {}", node.name, self.name);
        Some(node)
    }

    fn traversed(&self, ids: Vec<NodeId>) -> Vec<TraversedNode> {
        ids.into_iter()
            .map(|id| {
                let count = self.nodes.get(&id).map(|n| n.input_count()).unwrap_or(0);
                TraversedNode {
                    id,
                    inputs: (0..count)
                        .map(|slot| self.source_of(InputSlot::new(id, slot)))
                        .collect(),
                }
            })
            .collect()
    }
}

impl GraphQuery for Graph {
    fn traverse_upstream(&self, targets: &[NodeId]) -> Result<Vec<TraversedNode>, EvalError> {
        let order = graph_analysis::upstream_order(self, targets).map_err(EvalError::malformed)?;
        Ok(self.traversed(order))
    }

    fn traverse_downstream(&self, sources: &[NodeId]) -> Result<Vec<TraversedNode>, EvalError> {
        let order = graph_analysis::downstream_order(self, sources).map_err(EvalError::malformed)?;
        Ok(self.traversed(order))
    }

    fn resolve(&self, id: NodeId) -> Option<&dyn EvalNode> {
        self.nodes.get(&id).map(|n| n as &dyn EvalNode)
    }

    fn resolve_mut(&mut self, id: NodeId) -> Option<&mut dyn EvalNode> {
        self.nodes.get_mut(&id).map(|n| n as &mut dyn EvalNode)
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn take_changes(&mut self) -> GraphChanges {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::behavior::immediate;

    fn add(graph: &mut Graph, name: &str, inputs: usize) -> NodeId {
        let behavior = immediate(|_: &[Value], _: &ParameterMap| Ok(Value::None));
        graph
            .add_node(GraphNode::new(name, "test.node", inputs, ParameterMap::new(), behavior))
            .unwrap()
    }

    #[test]
    fn test_connect_replaces_existing_link() {
        let mut graph = Graph::new("g");
        let a = add(&mut graph, "a", 0);
        let b = add(&mut graph, "b", 0);
        let c = add(&mut graph, "c", 1);
        graph.connect(a, c, 0).unwrap();
        graph.connect(b, c, 0).unwrap();

        assert_eq!(graph.connections().len(), 1);
        assert_eq!(graph.source_of(InputSlot::new(c, 0)), Some(b));
    }

    #[test]
    fn test_journal_records_edits() {
        let mut graph = Graph::new("g");
        let a = add(&mut graph, "a", 0);
        let b = add(&mut graph, "b", 1);
        graph.take_changes();

        graph.connect(a, b, 0).unwrap();
        let changes = graph.take_changes();
        assert!(changes.topology_changed);
        assert!(changes.dirty.contains(&b));

        graph.set_parameter(a, "value", Value::Integer(1)).unwrap();
        let changes = graph.take_changes();
        assert!(!changes.topology_changed);
        assert!(changes.dirty.contains(&a));
        assert!(graph.take_changes().is_empty());
    }

    #[test]
    fn test_remove_node_dirties_dependents() {
        let mut graph = Graph::new("g");
        let a = add(&mut graph, "a", 0);
        let b = add(&mut graph, "b", 1);
        graph.connect(a, b, 0).unwrap();
        graph.take_changes();

        graph.remove_node(a).unwrap();
        let changes = graph.take_changes();
        assert!(changes.dirty.contains(&b));
        assert!(graph.connections().is_empty());
        assert!(graph.node(a).is_none());
    }

    #[test]
    fn test_subgraph_proxy_follows_container_input() {
        let mut graph = Graph::new("g");
        let source = add(&mut graph, "source", 0);
        let ports = graph.add_subgraph("sub", 1).unwrap();
        graph.take_changes();

        graph.connect(source, ports.container, 0).unwrap();
        assert_eq!(graph.dependencies(ports.inputs[0]), vec![source]);
        assert!(graph.take_changes().dirty.contains(&ports.inputs[0]));

        graph.disconnect(ports.container, 0).unwrap();
        assert!(graph.dependencies(ports.inputs[0]).is_empty());
    }

    #[test]
    fn test_subgraph_ports_removed_with_container() {
        let mut graph = Graph::new("g");
        let ports = graph.add_subgraph("sub", 2).unwrap();
        assert!(graph.remove_node(ports.output).is_err());

        graph.remove_node(ports.container).unwrap();
        assert!(graph.is_empty());
        assert!(graph.subgraphs().is_empty());
    }
}
