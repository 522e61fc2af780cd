pub mod connection;
pub mod function;
pub mod graph;
pub mod graph_analysis;
pub mod node;
pub mod parameter;
pub mod value;
