//! Subgraph plumbing. Containers and input proxies are created by
//! [`Graph::add_subgraph`](crate::model::graph::Graph::add_subgraph), only
//! the output node is a registered type.

use std::rc::Rc;

use super::{inp, node};
use crate::error::ExecError;
use crate::evaluation::executor::{Executor, FetchInput, Portal};
use crate::model::connection::PinDataType;
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;
use crate::plugin::behavior::{NodeBehavior, behavior_fn, immediate};
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

pub(super) fn graph_nodes() -> Vec<NodeTypeDefinition> {
    vec![
        node("graph.output", "Output", NodeCategory::Graph, output_behavior)
            .with_description("Result of a subgraph or function body")
            .with_inputs(vec![inp("value", "Value", PinDataType::Any)]),
    ]
}

fn passthrough(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    Ok(inputs.first().cloned().unwrap_or_default())
}

pub(crate) fn output_behavior() -> Rc<dyn NodeBehavior> {
    immediate(passthrough)
}

/// Container: evaluates to the result of `output`.
pub(crate) fn portal_behavior(output: NodeId) -> Rc<dyn NodeBehavior> {
    behavior_fn(move |_, _| -> Rc<dyn Executor> { Rc::new(Portal::new(output)) })
}

/// Input proxy: evaluates to what flows into `slot` of `container`.
pub(crate) fn proxy_behavior(container: NodeId, slot: usize) -> Rc<dyn NodeBehavior> {
    behavior_fn(move |_, _| -> Rc<dyn Executor> { Rc::new(FetchInput::new(container, slot)) })
}
