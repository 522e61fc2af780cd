//! Incremental pull-based evaluation.
//!
//! `prepare` turns the graph into a [`prepared::PreparedGraph`] snapshot and
//! marks stale nodes dirty; `evaluate` then pulls the dirty destinies, and
//! every executor pulls its own inputs back through the context. Results are
//! cached per frame, so clean nodes are never executed twice.

pub mod context;
pub mod executor;
pub mod prepared;
pub mod query;
pub mod report;
pub mod state;
