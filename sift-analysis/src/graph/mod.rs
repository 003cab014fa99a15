//! Graph construction layer (Stage 2).

pub mod builder;
pub mod framework;
pub mod ids;

pub use builder::{build_graphs, GraphAccumulator};
