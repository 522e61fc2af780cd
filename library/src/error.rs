use serde::Serialize;
use thiserror::Error;

use crate::model::node::NodeId;

/// Failure raised while executing a single node.
///
/// `Source` is the intentional, data-level failure (bad input, a deliberate
/// assertion). It travels through pulling nodes unchanged. `Failure` is any
/// other problem inside executor code; the context wraps it into a `Source`
/// naming the node that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ExecError {
    #[error("{0}")]
    Source(String),
    #[error("{0}")]
    Failure(String),
}

impl ExecError {
    pub fn source(message: impl Into<String>) -> Self {
        ExecError::Source(message.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ExecError::Failure(message.into())
    }

    pub fn is_source(&self) -> bool {
        matches!(self, ExecError::Source(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ExecError::Source(message) | ExecError::Failure(message) => message,
        }
    }
}

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Malformed graph: {0}")]
    MalformedGraph(String),
    #[error("Evaluation conflict: {0}")]
    Busy(String),
    #[error("Graph is read-only while an evaluation is running")]
    ReadOnly,
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Cannot pop the base evaluation frame")]
    FrameUnderflow,
    #[error("Execution error: {0}")]
    Execution(#[from] ExecError),
}

impl EvalError {
    pub fn malformed(message: impl Into<String>) -> Self {
        EvalError::MalformedGraph(message.into())
    }

    pub fn busy(message: impl Into<String>) -> Self {
        EvalError::Busy(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        EvalError::InvalidArgument(message.into())
    }
}

impl From<EvalError> for ExecError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Execution(inner) => inner,
            other => ExecError::Failure(other.to_string()),
        }
    }
}
