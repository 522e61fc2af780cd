use serde::Serialize;

use crate::error::ExecError;
use crate::model::node::NodeId;

/// Outcome of one [`EvalContext::evaluate`](super::context::EvalContext::evaluate) call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Dirty destinies that were pulled successfully, in pull order.
    pub pulled: Vec<NodeId>,
    /// The failure that stopped the pull, if any.
    pub failure: Option<EvaluationFailure>,
    /// Nodes found still busy after the pull and demoted to error.
    pub demoted: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationFailure {
    pub destiny: NodeId,
    pub error: ExecError,
}

impl EvaluationReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}
