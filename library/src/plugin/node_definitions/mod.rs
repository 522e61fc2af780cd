//! Built-in node types.

mod data;
pub(crate) mod function;
pub(crate) mod graph;
mod logic;
mod math;
mod text;

use std::rc::Rc;

use crate::error::ExecError;
use crate::model::connection::{PinDataType, PinDefinition};
use crate::model::function::FunctionLibrary;
use crate::model::value::Value;
use crate::plugin::behavior::NodeBehavior;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn inp(name: &str, display: &str, dt: PinDataType) -> PinDefinition {
    PinDefinition::input(name, display, dt)
}

fn node(
    type_id: &str,
    name: &str,
    cat: NodeCategory,
    behavior: impl Fn() -> Rc<dyn NodeBehavior> + 'static,
) -> NodeTypeDefinition {
    NodeTypeDefinition::new(type_id, name, cat, behavior)
}

/// `count` generic inputs named `{prefix}0`, `{prefix}1`, ...
fn numbered_inputs(prefix: &str, display: &str, count: usize) -> Vec<PinDefinition> {
    (0..count)
        .map(|i| {
            inp(
                &format!("{}{}", prefix, i),
                &format!("{} {}", display, i + 1),
                PinDataType::Any,
            )
        })
        .collect()
}

fn expect_list<'a>(value: &'a Value, what: &str) -> Result<&'a [Value], ExecError> {
    value
        .as_list()
        .ok_or_else(|| ExecError::source(format!("{} expects a list, got {}", what, value.type_name())))
}

fn expect_number(value: &Value, what: &str) -> Result<f64, ExecError> {
    value
        .as_f64()
        .ok_or_else(|| ExecError::source(format!("{} expects a number, got {}", what, value.type_name())))
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

pub(crate) fn all_node_definitions(functions: &Rc<FunctionLibrary>) -> Vec<NodeTypeDefinition> {
    [
        data::data_nodes(),
        math::math_nodes(),
        logic::logic_nodes(),
        text::text_nodes(),
        graph::graph_nodes(),
        function::function_nodes(functions),
    ]
    .concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definitions() -> Vec<NodeTypeDefinition> {
        all_node_definitions(&Rc::new(FunctionLibrary::default()))
    }

    #[test]
    fn test_all_node_definitions_count() {
        assert_eq!(definitions().len(), 22, "Expected 22 node definitions");
    }

    #[test]
    fn test_no_duplicate_type_ids() {
        let defs = definitions();
        let mut seen = std::collections::HashSet::new();
        for def in &defs {
            assert!(
                seen.insert(&def.type_id),
                "Duplicate type_id: {}",
                def.type_id
            );
        }
    }

    #[test]
    fn test_type_ids_match_categories() {
        for def in definitions() {
            let prefix = def.type_id.split('.').next().unwrap_or_default();
            assert_eq!(
                prefix,
                def.category.to_string().to_lowercase(),
                "{} is filed under {}",
                def.type_id,
                def.category
            );
        }
    }
}
