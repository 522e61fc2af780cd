//! Incremental, pull-based evaluation of node graphs.
//!
//! A [`Graph`] holds nodes and links; an [`EvalContext`] owns the caches for
//! one graph and recomputes only what edits made stale. Functions and
//! subgraphs are built on the same pull machinery.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod plugin;
pub mod util;

pub use config::EvalConfig;
pub use error::{EvalError, ExecError};
pub use evaluation::context::EvalContext;
pub use evaluation::executor::{Executor, InputFetcher};
pub use evaluation::prepared::{PreparedGraph, PreparedNode};
pub use evaluation::query::{EvalNode, GraphChanges, GraphQuery, TraversedNode};
pub use evaluation::report::{EvaluationFailure, EvaluationReport};
pub use evaluation::state::NodeState;
pub use model::function::{FunctionDef, FunctionLibrary};
pub use model::graph::{Graph, SubgraphPorts};
pub use model::node::{GraphNode, NodeId};
pub use model::parameter::ParameterMap;
pub use model::value::Value;
pub use plugin::registry::NodeRegistry;
