//! Pins and links of the data-flow graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::NodeId;

/// Data type advertised by an input pin. Informational only; values are
/// dynamically typed and nodes check what they receive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PinDataType {
    Boolean,
    Integer,
    Number,
    String,
    List,
    /// Accepts any type (generic)
    Any,
}

/// Definition of an input pin on a node type.
#[derive(Clone, Debug)]
pub struct PinDefinition {
    /// Internal name (e.g. "condition", "a")
    pub name: String,
    /// Display name shown to users
    pub display_name: String,
    pub data_type: PinDataType,
}

impl PinDefinition {
    pub fn input(name: &str, display_name: &str, data_type: PinDataType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            data_type,
        }
    }
}

/// One input slot of one node.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputSlot {
    pub node: NodeId,
    pub slot: usize,
}

impl InputSlot {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

/// A link from a node's output into another node's input slot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: Uuid,
    /// Source node (every node has exactly one output)
    pub from: NodeId,
    /// Destination slot
    pub to: InputSlot,
}

impl Connection {
    pub fn new(from: NodeId, to: InputSlot) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
        }
    }
}
