//! Node behaviors, node type definitions and the built-in node library.

pub mod behavior;
pub mod node_definitions;
pub mod node_types;
pub mod registry;

pub use behavior::{NodeBehavior, advanced, deferred, immediate};
pub use node_types::{NodeCategory, NodeTypeDefinition};
pub use registry::NodeRegistry;
