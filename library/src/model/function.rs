//! Reusable function bodies, each with its own graph and evaluation context.

use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::graph::Graph;
use super::node::{GraphNode, NodeId};
use super::parameter::ParameterMap;
use super::value::Value;
use crate::config::EvalConfig;
use crate::error::{EvalError, ExecError};
use crate::evaluation::context::EvalContext;
use crate::evaluation::prepared::PreparedGraph;
use crate::plugin::node_definitions::function::placeholder_behavior;
use crate::plugin::node_definitions::graph::output_behavior;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Result of [`FunctionDef::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStatus {
    Unchanged,
    Changed,
    /// The body is already being prepared further up the stack (recursion).
    Reentrant,
}

/// A named function: a body graph with parameter placeholders and an output.
pub struct FunctionDef {
    name: String,
    graph: RefCell<Graph>,
    context: RefCell<EvalContext>,
    snapshot: RefCell<Option<Rc<PreparedGraph>>>,
    parameters: Vec<NodeId>,
    output: NodeId,
    revision: Cell<u64>,
}

impl FunctionDef {
    fn new(name: &str, arity: usize, config: EvalConfig) -> Result<Self, EvalError> {
        let mut graph = Graph::new(name);
        let mut parameters = Vec::with_capacity(arity);
        for index in 0..arity {
            let placeholder = GraphNode::new(
                &format!("input{}", index),
                "function.input",
                0,
                ParameterMap::new().with("default", Value::None),
                placeholder_behavior(),
            );
            parameters.push(graph.add_node(placeholder)?);
        }
        let output = graph.add_node(GraphNode::new(
            "output",
            "graph.output",
            1,
            ParameterMap::new(),
            output_behavior(),
        ))?;

        let mut context = EvalContext::new(config);
        context.add_destiny(output);

        Ok(Self {
            name: name.to_string(),
            graph: RefCell::new(graph),
            context: RefCell::new(context),
            snapshot: RefCell::new(None),
            parameters,
            output,
            revision: Cell::new(next_revision()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Placeholder node of parameter `index`.
    pub fn parameter(&self, index: usize) -> Option<NodeId> {
        self.parameters.get(index).copied()
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Changes whenever the body changes; invoke nodes compare it to decide
    /// whether their cached result is stale.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Edit the body graph.
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut Graph) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        let mut graph = self
            .graph
            .try_borrow_mut()
            .map_err(|_| EvalError::busy(format!("function {} is in use", self.name)))?;
        f(&mut graph)
    }

    /// Read the body graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> Result<R, EvalError> {
        let graph = self
            .graph
            .try_borrow()
            .map_err(|_| EvalError::busy(format!("function {} is being edited", self.name)))?;
        Ok(f(&graph))
    }

    /// Value a placeholder yields when the body is evaluated on its own.
    pub fn set_default(&self, index: usize, value: Value) -> Result<(), EvalError> {
        let placeholder = self.parameter(index).ok_or_else(|| {
            EvalError::invalid(format!("{} has no parameter {}", self.name, index))
        })?;
        self.edit(|graph| graph.set_parameter(placeholder, "default", value))
    }

    /// Prepare the body in its own context and refresh the snapshot handed
    /// to callers. Bumps the revision when anything in the body changed.
    pub fn prepare(&self) -> Result<BodyStatus, EvalError> {
        let Ok(mut context) = self.context.try_borrow_mut() else {
            return Ok(BodyStatus::Reentrant);
        };
        let mut graph = self
            .graph
            .try_borrow_mut()
            .map_err(|_| EvalError::busy(format!("function {} is being edited", self.name)))?;

        let changed = context.prepare(&mut *graph)?;
        *self.snapshot.borrow_mut() = context.prepared_graph();
        if changed {
            self.revision.set(next_revision());
            debug!("Function {} changed, revision {}", self.name, self.revision.get());
            Ok(BodyStatus::Changed)
        } else {
            Ok(BodyStatus::Unchanged)
        }
    }

    /// Prepared body for running in a caller's frame.
    pub fn snapshot(&self) -> Result<Rc<PreparedGraph>, EvalError> {
        if let Some(snapshot) = self.snapshot.borrow().as_ref() {
            return Ok(snapshot.clone());
        }
        self.prepare()?;
        self.snapshot
            .borrow()
            .clone()
            .ok_or_else(|| EvalError::malformed(format!("function {} could not be prepared", self.name)))
    }

    /// Evaluate the body in its own context, placeholders yielding their defaults.
    pub fn evaluate_standalone(&self) -> Result<Value, EvalError> {
        // Recursive bodies read the snapshot while the context is borrowed.
        self.prepare()?;
        let mut context = self
            .context
            .try_borrow_mut()
            .map_err(|_| EvalError::busy(format!("function {} is in use", self.name)))?;
        let mut graph = self
            .graph
            .try_borrow_mut()
            .map_err(|_| EvalError::busy(format!("function {} is being edited", self.name)))?;

        let report = context.evaluate(&mut *graph)?;
        *self.snapshot.borrow_mut() = context.prepared_graph();
        if let Some(failure) = report.failure {
            return Err(EvalError::Execution(failure.error));
        }
        if let Some(message) = context.message_of(self.output) {
            return Err(EvalError::Execution(ExecError::source(message)));
        }
        Ok(context.cached_value(self.output).cloned().unwrap_or_default())
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("arity", &self.parameters.len())
            .field("output", &self.output)
            .field("revision", &self.revision.get())
            .finish_non_exhaustive()
    }
}

/// All functions known to one document.
#[derive(Default)]
pub struct FunctionLibrary {
    config: EvalConfig,
    functions: RefCell<HashMap<String, Rc<FunctionDef>>>,
}

impl FunctionLibrary {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            functions: RefCell::new(HashMap::new()),
        }
    }

    /// Create a function with `arity` parameters. The name is made unique by
    /// bumping a numeric suffix (`f`, `f1`, `f2`, ...).
    pub fn define(&self, name: &str, arity: usize) -> Result<Rc<FunctionDef>, EvalError> {
        if name.is_empty() {
            return Err(EvalError::invalid("function name must not be empty"));
        }
        let unique = {
            let functions = self.functions.borrow();
            let mut candidate = name.to_string();
            while functions.contains_key(&candidate) {
                candidate = increase_suffix(&candidate);
            }
            candidate
        };
        if unique != name {
            warn!("Function {} already exists, defining {} instead", name, unique);
        }

        let function = Rc::new(FunctionDef::new(&unique, arity, self.config.clone())?);
        self.functions
            .borrow_mut()
            .insert(unique, function.clone());
        Ok(function)
    }

    pub fn get(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.borrow().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.borrow_mut().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

/// `f` -> `f1`, `f1` -> `f2`, `f9` -> `f10`.
fn increase_suffix(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &name[stem.len()..];
    let next = digits.parse::<u64>().map(|n| n + 1).unwrap_or(1);
    format!("{}{}", stem, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_suffix() {
        assert_eq!(increase_suffix("f"), "f1");
        assert_eq!(increase_suffix("f1"), "f2");
        assert_eq!(increase_suffix("add9"), "add10");
    }

    #[test]
    fn test_define_makes_names_unique() {
        let library = FunctionLibrary::default();
        let first = library.define("square", 1).unwrap();
        let second = library.define("square", 1).unwrap();

        assert_eq!(first.name(), "square");
        assert_eq!(second.name(), "square1");
        assert_eq!(library.names(), vec!["square", "square1"]);
    }

    #[test]
    fn test_body_has_placeholders_and_output() {
        let library = FunctionLibrary::default();
        let function = library.define("f", 2).unwrap();
        assert_eq!(function.arity(), 2);

        let names = function
            .with_graph(|graph| {
                graph
                    .node_order()
                    .iter()
                    .map(|id| graph.node_name(*id).to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap();
        assert_eq!(names, vec!["input0", "input1", "output"]);
    }

    #[test]
    fn test_prepare_bumps_revision_only_on_change() {
        let library = FunctionLibrary::default();
        let function = library.define("f", 1).unwrap();
        let initial = function.revision();

        assert_eq!(function.prepare().unwrap(), BodyStatus::Changed);
        let prepared = function.revision();
        assert_ne!(prepared, initial);

        assert_eq!(function.prepare().unwrap(), BodyStatus::Unchanged);
        assert_eq!(function.revision(), prepared);

        function.set_default(0, Value::Integer(3)).unwrap();
        assert_eq!(function.prepare().unwrap(), BodyStatus::Changed);
    }
}
