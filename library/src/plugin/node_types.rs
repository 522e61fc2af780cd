//! Node type definitions for the data-flow graph.

use std::fmt;
use std::rc::Rc;

use super::behavior::NodeBehavior;
use crate::model::connection::PinDefinition;
use crate::model::parameter::ParameterMap;

/// Category of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Constants, lists and conversions
    Data,
    /// Arithmetic (add, multiply, sum, etc.)
    Math,
    /// Logic/control flow (switch, compare, etc.)
    Logic,
    /// String manipulation
    Text,
    /// Subgraph plumbing (output, input proxies)
    Graph,
    /// Function parameters and calls
    Function,
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeCategory::Data => "Data",
            NodeCategory::Math => "Math",
            NodeCategory::Logic => "Logic",
            NodeCategory::Text => "Text",
            NodeCategory::Graph => "Graph",
            NodeCategory::Function => "Function",
        };
        write!(f, "{}", s)
    }
}

pub type BehaviorFactory = Rc<dyn Fn() -> Rc<dyn NodeBehavior>>;

/// Definition of a node type, registered in the [`NodeRegistry`](super::registry::NodeRegistry).
///
/// Node instances are `GraphNode`s created from this: the input pins give
/// the input count, the default parameters seed the parameter map and the
/// factory supplies a fresh behavior per instance.
#[derive(Clone)]
pub struct NodeTypeDefinition {
    /// Unique type identifier (e.g. "math.add", "logic.switch")
    pub type_id: String,
    /// Human-readable name (e.g. "Add")
    pub display_name: String,
    pub category: NodeCategory,
    pub description: String,
    pub inputs: Vec<PinDefinition>,
    pub default_parameters: ParameterMap,
    pub behavior: BehaviorFactory,
}

impl NodeTypeDefinition {
    pub fn new(
        type_id: &str,
        display_name: &str,
        category: NodeCategory,
        behavior: impl Fn() -> Rc<dyn NodeBehavior> + 'static,
    ) -> Self {
        Self {
            type_id: type_id.to_string(),
            display_name: display_name.to_string(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            default_parameters: ParameterMap::new(),
            behavior: Rc::new(behavior),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<PinDefinition>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterMap) -> Self {
        self.default_parameters = parameters;
        self
    }

    pub fn create_behavior(&self) -> Rc<dyn NodeBehavior> {
        (self.behavior)()
    }
}

impl fmt::Debug for NodeTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDefinition")
            .field("type_id", &self.type_id)
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("inputs", &self.inputs)
            .field("default_parameters", &self.default_parameters)
            .finish_non_exhaustive()
    }
}
