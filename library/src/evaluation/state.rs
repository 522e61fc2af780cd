use serde::{Deserialize, Serialize};
use std::fmt;

/// Evaluation state of one node in one frame.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Cached value is valid.
    Normal,
    /// Must be recomputed before its value is used.
    Dirty,
    /// Being computed right now.
    Busy,
    /// Last computation failed unexpectedly.
    Error,
    /// Last computation raised an intentional failure.
    SourceError,
}

impl NodeState {
    pub fn is_failure(self) -> bool {
        matches!(self, NodeState::Error | NodeState::SourceError)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Normal => "normal",
            NodeState::Dirty => "dirty",
            NodeState::Busy => "busy",
            NodeState::Error => "error",
            NodeState::SourceError => "source_error",
        };
        write!(f, "{}", s)
    }
}
