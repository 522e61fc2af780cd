//! Executor variants: how one node turns inputs and parameters into a value.

use std::rc::{Rc, Weak};

use super::context::EvalContext;
use crate::error::ExecError;
use crate::model::function::FunctionLibrary;
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;

/// Computes one node's output. Executors pull their inputs through the
/// context, which caches the results.
pub trait Executor {
    fn execute(&self, parameters: &ParameterMap, context: &mut EvalContext)
    -> Result<Value, ExecError>;
}

pub type ImmediateFn = Rc<dyn Fn(&[Value], &ParameterMap) -> Result<Value, ExecError>>;
pub type DeferredFn = Rc<dyn Fn(&mut InputFetcher<'_>, &ParameterMap) -> Result<Value, ExecError>>;
pub type AdvancedFn = Rc<dyn Fn(NodeId, &ParameterMap, &mut EvalContext) -> Result<Value, ExecError>>;

/// Pulls every input in slot order, then runs the node logic.
/// Unconnected inputs arrive as `Value::None`.
pub struct Immediate {
    node: NodeId,
    logic: ImmediateFn,
}

impl Immediate {
    pub fn new(node: NodeId, logic: ImmediateFn) -> Self {
        Self { node, logic }
    }
}

impl Executor for Immediate {
    fn execute(
        &self,
        parameters: &ParameterMap,
        context: &mut EvalContext,
    ) -> Result<Value, ExecError> {
        let count = context.input_count(self.node);
        let mut inputs = Vec::with_capacity(count);
        for slot in 0..count {
            inputs.push(context.fetch_input(self.node, slot)?);
        }
        (self.logic)(&inputs, parameters)
    }
}

/// Lets node logic decide which inputs to pull.
pub struct InputFetcher<'a> {
    node: NodeId,
    context: &'a mut EvalContext,
}

impl<'a> InputFetcher<'a> {
    pub fn new(node: NodeId, context: &'a mut EvalContext) -> Self {
        Self { node, context }
    }

    pub fn len(&self) -> usize {
        self.context.input_count(self.node)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_connected(&self, slot: usize) -> bool {
        self.context.is_input_connected(self.node, slot)
    }

    pub fn fetch(&mut self, slot: usize) -> Result<Value, ExecError> {
        self.context.fetch_input(self.node, slot)
    }

    /// Record that `slot` was deliberately not pulled, so changes upstream of
    /// it do not dirty this node.
    pub fn ignore(&mut self, slot: usize) {
        self.context.ignore_input(self.node, slot);
    }
}

pub struct Deferred {
    node: NodeId,
    logic: DeferredFn,
}

impl Deferred {
    pub fn new(node: NodeId, logic: DeferredFn) -> Self {
        Self { node, logic }
    }
}

impl Executor for Deferred {
    fn execute(
        &self,
        parameters: &ParameterMap,
        context: &mut EvalContext,
    ) -> Result<Value, ExecError> {
        let mut fetcher = InputFetcher::new(self.node, context);
        (self.logic)(&mut fetcher, parameters)
    }
}

/// Full access to the context.
pub struct Advanced {
    node: NodeId,
    logic: AdvancedFn,
}

impl Advanced {
    pub fn new(node: NodeId, logic: AdvancedFn) -> Self {
        Self { node, logic }
    }
}

impl Executor for Advanced {
    fn execute(
        &self,
        parameters: &ParameterMap,
        context: &mut EvalContext,
    ) -> Result<Value, ExecError> {
        (self.logic)(self.node, parameters, context)
    }
}

/// Returns another node's result verbatim.
pub struct Portal {
    source: NodeId,
}

impl Portal {
    pub fn new(source: NodeId) -> Self {
        Self { source }
    }
}

impl Executor for Portal {
    fn execute(&self, _: &ParameterMap, context: &mut EvalContext) -> Result<Value, ExecError> {
        context.get_result(self.source)
    }
}

/// Returns the value flowing into `slot` of `node`.
pub struct FetchInput {
    node: NodeId,
    slot: usize,
}

impl FetchInput {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

impl Executor for FetchInput {
    fn execute(&self, _: &ParameterMap, context: &mut EvalContext) -> Result<Value, ExecError> {
        context.fetch_input(self.node, self.slot)
    }
}

/// Returns a fixed value. Function parameter placeholders use this; calls
/// seed the placeholder's cache entry directly, so the stored value is only
/// seen when a body is evaluated on its own.
pub struct ValueCache {
    value: Value,
}

impl ValueCache {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Executor for ValueCache {
    fn execute(&self, _: &ParameterMap, _: &mut EvalContext) -> Result<Value, ExecError> {
        Ok(self.value.clone())
    }
}

/// Calls a function from the library: pulls the arguments, seeds the
/// callee's placeholders in a fresh frame and pulls the callee's output.
pub struct FunctionCall {
    node: NodeId,
    function: String,
    library: Weak<FunctionLibrary>,
}

impl FunctionCall {
    pub fn new(node: NodeId, function: &str, library: Weak<FunctionLibrary>) -> Self {
        Self {
            node,
            function: function.to_string(),
            library,
        }
    }
}

impl Executor for FunctionCall {
    fn execute(&self, _: &ParameterMap, context: &mut EvalContext) -> Result<Value, ExecError> {
        let library = self
            .library
            .upgrade()
            .ok_or_else(|| ExecError::failure("function library is gone"))?;
        let function = library.get(&self.function).ok_or_else(|| {
            ExecError::source(format!("function '{}' is not defined", self.function))
        })?;

        let count = function.arity().min(context.input_count(self.node));
        let mut arguments = Vec::with_capacity(count);
        for slot in 0..count {
            // Unconnected arguments fall back to the placeholder's default.
            if !context.is_input_connected(self.node, slot) {
                continue;
            }
            let value = context.fetch_input(self.node, slot)?;
            if let Some(placeholder) = function.parameter(slot) {
                arguments.push((placeholder, value));
            }
        }

        let body = function.snapshot()?;
        context.invoke(body, &arguments, function.output())
    }
}
