//! Registry of node types.

use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

use super::node_definitions;
use super::node_types::NodeTypeDefinition;
use crate::config::EvalConfig;
use crate::error::EvalError;
use crate::model::function::FunctionLibrary;
use crate::model::node::GraphNode;
use crate::model::parameter::ParameterMap;

/// Node types by id, plus the function library `function.invoke` nodes call into.
pub struct NodeRegistry {
    definitions: HashMap<String, NodeTypeDefinition>,
    functions: Rc<FunctionLibrary>,
}

impl NodeRegistry {
    /// Empty registry with an empty function library.
    pub fn new(config: EvalConfig) -> Self {
        Self {
            definitions: HashMap::new(),
            functions: Rc::new(FunctionLibrary::new(config)),
        }
    }

    pub fn with_builtin_nodes(config: EvalConfig) -> Self {
        let mut registry = Self::new(config);
        for definition in node_definitions::all_node_definitions(&registry.functions) {
            registry.register(definition);
        }
        debug!("Registered {} built-in node types", registry.definitions.len());
        registry
    }

    /// Add or replace a node type.
    pub fn register(&mut self, definition: NodeTypeDefinition) {
        self.definitions
            .insert(definition.type_id.clone(), definition);
    }

    pub fn get(&self, type_id: &str) -> Option<&NodeTypeDefinition> {
        self.definitions.get(type_id)
    }

    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    pub fn functions(&self) -> &Rc<FunctionLibrary> {
        &self.functions
    }

    /// Instantiate a node; `parameters` override the type's defaults.
    pub fn create_node(
        &self,
        type_id: &str,
        name: &str,
        parameters: ParameterMap,
    ) -> Result<GraphNode, EvalError> {
        let definition = self
            .get(type_id)
            .ok_or_else(|| EvalError::UnknownNodeType(type_id.to_string()))?;
        let mut parameters = parameters;
        parameters.merge_defaults(&definition.default_parameters);
        Ok(GraphNode::new(
            name,
            type_id,
            definition.inputs.len(),
            parameters,
            definition.create_behavior(),
        ))
    }
}
