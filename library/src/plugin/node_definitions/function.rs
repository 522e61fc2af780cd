use log::warn;
use std::cell::Cell;
use std::rc::{Rc, Weak};

use super::{node, numbered_inputs};
use crate::evaluation::executor::{Executor, FunctionCall, ValueCache};
use crate::model::function::{BodyStatus, FunctionLibrary};
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;
use crate::plugin::behavior::{NodeBehavior, behavior_fn};
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

/// Arguments an invoke node accepts.
pub const MAX_ARGUMENTS: usize = 4;

pub(super) fn function_nodes(functions: &Rc<FunctionLibrary>) -> Vec<NodeTypeDefinition> {
    let library = Rc::downgrade(functions);
    vec![
        node("function.invoke", "Invoke Function", NodeCategory::Function, move || {
            Rc::new(InvokeBehavior::new(library.clone())) as Rc<dyn NodeBehavior>
        })
        .with_description("Call the function named by `function` with up to four arguments")
        .with_inputs(numbered_inputs("arg", "Argument", MAX_ARGUMENTS))
        .with_parameters(ParameterMap::new().with("function", "")),
    ]
}

/// Parameter placeholder inside a function body; yields its `default`
/// parameter unless a call seeded it.
pub(crate) fn placeholder_behavior() -> Rc<dyn NodeBehavior> {
    behavior_fn(|_, parameters| -> Rc<dyn Executor> {
        Rc::new(ValueCache::new(
            parameters.get("default").cloned().unwrap_or_default(),
        ))
    })
}

/// Calls into the function library and notices when the callee's body changed.
struct InvokeBehavior {
    library: Weak<FunctionLibrary>,
    /// Callee revision seen by the last prepare; 0 when the callee was missing.
    seen_revision: Cell<u64>,
}

impl InvokeBehavior {
    fn new(library: Weak<FunctionLibrary>) -> Self {
        Self {
            library,
            seen_revision: Cell::new(0),
        }
    }
}

fn function_name(parameters: &ParameterMap) -> String {
    parameters.get_string("function").unwrap_or_default()
}

impl NodeBehavior for InvokeBehavior {
    fn build_executor(&self, node: NodeId, parameters: &ParameterMap) -> Rc<dyn Executor> {
        Rc::new(FunctionCall::new(
            node,
            &function_name(parameters),
            self.library.clone(),
        ))
    }

    fn prepare(&self, _node: NodeId, parameters: &ParameterMap) -> bool {
        let Some(library) = self.library.upgrade() else {
            return false;
        };
        let name = function_name(parameters);
        let Some(function) = library.get(&name) else {
            return self.seen_revision.replace(0) != 0;
        };

        match function.prepare() {
            // Recursive call: the outer prepare of the same body decides.
            Ok(BodyStatus::Reentrant) => return false,
            Ok(_) => {}
            Err(err) => warn!("Failed to prepare function {}: {}", name, err),
        }
        let revision = function.revision();
        self.seen_revision.replace(revision) != revision
    }
}
