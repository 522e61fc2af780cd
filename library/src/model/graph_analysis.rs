//! Ordering and validation for the data-flow graph.
//!
//! A node depends on the sources wired into its input slots and on its extra
//! dependencies. Every ordering here lists dependencies before dependents.

use std::collections::{HashMap, HashSet, VecDeque};

use super::connection::InputSlot;
use super::graph::Graph;
use super::node::NodeId;

/// Everything `targets` depend on (targets included), in dependency order.
///
/// Fails if a target or a dependency does not exist, or on a cycle.
pub fn upstream_order(graph: &Graph, targets: &[NodeId]) -> Result<Vec<NodeId>, String> {
    let mut members = HashSet::new();
    let mut queue: VecDeque<NodeId> = targets.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        if !members.insert(current) {
            continue;
        }
        if graph.node(current).is_none() {
            return Err(format!("Node {} not found", current));
        }
        for dependency in graph.dependencies(current) {
            if graph.node(dependency).is_none() {
                return Err(format!(
                    "{} depends on missing node {}",
                    graph.node_name(current),
                    dependency
                ));
            }
            queue.push_back(dependency);
        }
    }

    topological_sort(graph, &members)
}

/// `sources` and everything depending on them, in dependency order.
/// Sources that no longer exist are ignored.
pub fn downstream_order(graph: &Graph, sources: &[NodeId]) -> Result<Vec<NodeId>, String> {
    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &id in graph.node_order() {
        for dependency in graph.dependencies(id) {
            dependents.entry(dependency).or_default().push(id);
        }
    }

    let mut members = HashSet::new();
    let mut queue: VecDeque<NodeId> = sources
        .iter()
        .copied()
        .filter(|id| graph.node(*id).is_some())
        .collect();

    while let Some(current) = queue.pop_front() {
        if !members.insert(current) {
            continue;
        }
        if let Some(next) = dependents.get(&current) {
            queue.extend(next.iter().copied());
        }
    }

    topological_sort(graph, &members)
}

/// Kahn's algorithm over `members`; ties keep graph insertion order.
pub fn topological_sort(graph: &Graph, members: &HashSet<NodeId>) -> Result<Vec<NodeId>, String> {
    let ordered: Vec<NodeId> = graph
        .node_order()
        .iter()
        .copied()
        .filter(|id| members.contains(id))
        .collect();

    let mut in_degree: HashMap<NodeId, usize> = ordered.iter().map(|id| (*id, 0)).collect();
    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &id in &ordered {
        for dependency in graph.dependencies(id) {
            if members.contains(&dependency) {
                *in_degree.entry(id).or_insert(0) += 1;
                dependents.entry(dependency).or_default().push(id);
            }
        }
    }

    let mut queue: VecDeque<NodeId> = ordered
        .iter()
        .copied()
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut result = Vec::with_capacity(ordered.len());

    while let Some(id) = queue.pop_front() {
        result.push(id);
        if let Some(next) = dependents.get(&id) {
            for &dependent in next {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if result.len() != ordered.len() {
        let stuck: Vec<&str> = ordered
            .iter()
            .filter(|id| !result.contains(id))
            .map(|id| graph.node_name(*id))
            .collect();
        return Err(format!("Cycle detected among nodes: {}", stuck.join(", ")));
    }

    Ok(result)
}

/// Validate a link before adding it.
///
/// Checks:
/// - Both nodes exist
/// - No self-connections
/// - The slot exists
/// - No cycles, including the implicit dependency of a subgraph input proxy
///   on whatever feeds the matching container slot
pub fn validate_connection(graph: &Graph, from: NodeId, to: InputSlot) -> Result<(), String> {
    if graph.node(from).is_none() {
        return Err(format!("Source node {} not found", from));
    }
    let Some(target) = graph.node(to.node) else {
        return Err(format!("Destination node {} not found", to.node));
    };

    if from == to.node {
        return Err("Cannot connect a node to itself".to_string());
    }

    if to.slot >= target.input_count() {
        return Err(format!(
            "{} has {} inputs, slot {} does not exist",
            target.name,
            target.input_count(),
            to.slot
        ));
    }

    if would_create_cycle(graph, from, to.node) {
        return Err("Connection would create a cycle".to_string());
    }
    if let Some(proxy) = graph.subgraph_proxy(to) {
        if would_create_cycle(graph, from, proxy) {
            return Err("Connection would create a cycle through a subgraph input".to_string());
        }
    }

    Ok(())
}

/// True if `to_node` already is (transitively) a dependency of `from_node`,
/// so making `from_node` a dependency of `to_node` would close a loop.
pub fn would_create_cycle(graph: &Graph, from_node: NodeId, to_node: NodeId) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(from_node);

    while let Some(current) = queue.pop_front() {
        if current == to_node {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        queue.extend(graph.dependencies(current));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::GraphNode;
    use crate::model::parameter::ParameterMap;
    use crate::model::value::Value;
    use crate::plugin::behavior::immediate;

    fn add(graph: &mut Graph, name: &str, inputs: usize) -> NodeId {
        let behavior = immediate(|_: &[Value], _: &ParameterMap| Ok(Value::None));
        graph
            .add_node(GraphNode::new(name, "test.node", inputs, ParameterMap::new(), behavior))
            .unwrap()
    }

    fn setup_chain() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new("chain");
        let a = add(&mut graph, "a", 0);
        let b = add(&mut graph, "b", 1);
        let c = add(&mut graph, "c", 2);
        graph.connect(a, b, 0).unwrap();
        graph.connect(b, c, 0).unwrap();
        (graph, a, b, c)
    }

    #[test]
    fn test_upstream_order_lists_dependencies_first() {
        let (graph, a, b, c) = setup_chain();
        assert_eq!(upstream_order(&graph, &[c]).unwrap(), vec![a, b, c]);
        assert_eq!(upstream_order(&graph, &[b]).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_downstream_order() {
        let (graph, a, b, c) = setup_chain();
        assert_eq!(downstream_order(&graph, &[b]).unwrap(), vec![b, c]);
        assert_eq!(downstream_order(&graph, &[a, NodeId::new()]).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let (graph, a, b, c) = setup_chain();
        assert!(would_create_cycle(&graph, c, a));
        assert!(validate_connection(&graph, c, InputSlot::new(b, 0)).is_err());
        assert!(validate_connection(&graph, a, InputSlot::new(c, 1)).is_ok());
    }

    #[test]
    fn test_invalid_slot_is_rejected() {
        let (graph, a, b, _) = setup_chain();
        let err = validate_connection(&graph, a, InputSlot::new(b, 3)).unwrap_err();
        assert!(err.contains("slot 3"));
    }

    #[test]
    fn test_subgraph_proxy_cycle_is_rejected() {
        let mut graph = Graph::new("sub");
        let ports = graph.add_subgraph("inner", 1).unwrap();
        let inner = add(&mut graph, "inner_node", 1);
        graph.connect(ports.inputs[0], inner, 0).unwrap();
        graph.connect(inner, ports.output, 0).unwrap();

        // inner reads the proxy, so it cannot also feed the container slot
        let err = validate_connection(&graph, inner, InputSlot::new(ports.container, 0)).unwrap_err();
        assert!(err.contains("cycle"));
    }
}
