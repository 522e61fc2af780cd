//! What a node does: how it builds its executor and how it takes part in prepare.

use std::rc::Rc;

use crate::error::ExecError;
use crate::evaluation::context::EvalContext;
use crate::evaluation::executor::{
    Advanced, AdvancedFn, Deferred, DeferredFn, Executor, Immediate, ImmediateFn, InputFetcher,
};
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;

pub trait NodeBehavior {
    /// Build the executor for a node with the given parameters. Called again
    /// after every parameter change.
    fn build_executor(&self, node: NodeId, parameters: &ParameterMap) -> Rc<dyn Executor>;

    /// Per-prepare hook; return `true` if the node must recompute.
    fn prepare(&self, _node: NodeId, _parameters: &ParameterMap) -> bool {
        false
    }

    /// Dependencies beyond the wired inputs.
    fn extra_dependencies(&self, _node: NodeId, _parameters: &ParameterMap) -> Vec<NodeId> {
        Vec::new()
    }
}

/// A behavior that is nothing but an executor factory.
pub struct FnBehavior<F> {
    build: F,
}

impl<F> NodeBehavior for FnBehavior<F>
where
    F: Fn(NodeId, &ParameterMap) -> Rc<dyn Executor>,
{
    fn build_executor(&self, node: NodeId, parameters: &ParameterMap) -> Rc<dyn Executor> {
        (self.build)(node, parameters)
    }
}

pub fn behavior_fn<F>(build: F) -> Rc<dyn NodeBehavior>
where
    F: Fn(NodeId, &ParameterMap) -> Rc<dyn Executor> + 'static,
{
    Rc::new(FnBehavior { build })
}

/// Node logic over all inputs, pulled eagerly in slot order.
pub fn immediate<F>(logic: F) -> Rc<dyn NodeBehavior>
where
    F: Fn(&[Value], &ParameterMap) -> Result<Value, ExecError> + 'static,
{
    let logic: ImmediateFn = Rc::new(logic);
    behavior_fn(move |node, _| -> Rc<dyn Executor> {
        Rc::new(Immediate::new(node, logic.clone()))
    })
}

/// Node logic that pulls inputs on demand.
pub fn deferred<F>(logic: F) -> Rc<dyn NodeBehavior>
where
    F: Fn(&mut InputFetcher<'_>, &ParameterMap) -> Result<Value, ExecError> + 'static,
{
    let logic: DeferredFn = Rc::new(logic);
    behavior_fn(move |node, _| -> Rc<dyn Executor> {
        Rc::new(Deferred::new(node, logic.clone()))
    })
}

/// Node logic with direct access to the context.
pub fn advanced<F>(logic: F) -> Rc<dyn NodeBehavior>
where
    F: Fn(NodeId, &ParameterMap, &mut EvalContext) -> Result<Value, ExecError> + 'static,
{
    let logic: AdvancedFn = Rc::new(logic);
    behavior_fn(move |node, _| -> Rc<dyn Executor> {
        Rc::new(Advanced::new(node, logic.clone()))
    })
}
